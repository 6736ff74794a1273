//! Event emitters: fan events out to observability sinks.
//!
//! [`EventEmitter`] implementations are fault-tolerant by contract — a
//! failing sink is logged and never propagated to the caller, so the
//! orchestrator can emit events without wrapping every call in its own
//! error handling.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use super::types::{EventType, PipelineEvent};

/// Shared reference to an emitter, for constructor injection.
pub type SharedEventEmitter = Arc<dyn EventEmitter>;

/// A sink for [`PipelineEvent`]s.
///
/// `emit` must never panic or block the caller on a failing sink; swallow
/// and log instead. `close` defaults to a no-op.
#[async_trait]
pub trait EventEmitter: Send + Sync {
    async fn emit(&self, event: &PipelineEvent);

    async fn close(&self) {}
}

/// Emits events as structured tracing records.
///
/// Level is chosen from the event type: `state_transition`/`completion` at
/// info, `error` at error, `timeout` at warn.
#[derive(Debug, Default)]
pub struct LoggingEventEmitter;

impl LoggingEventEmitter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventEmitter for LoggingEventEmitter {
    async fn emit(&self, event: &PipelineEvent) {
        match event.event_type {
            EventType::StateTransition | EventType::Completion => {
                info!(
                    event_type = event.event_type.as_str(),
                    issue_id = %event.issue_id,
                    repository = %event.repository,
                    details = ?event.details,
                    "pipeline event"
                );
            }
            EventType::Timeout => {
                warn!(
                    event_type = event.event_type.as_str(),
                    issue_id = %event.issue_id,
                    repository = %event.repository,
                    details = ?event.details,
                    "pipeline event"
                );
            }
            EventType::Error => {
                error!(
                    event_type = event.event_type.as_str(),
                    issue_id = %event.issue_id,
                    repository = %event.repository,
                    details = ?event.details,
                    "pipeline event"
                );
            }
        }
    }
}

/// Discards every event. Used in tests and to disable emission.
#[derive(Debug, Default)]
pub struct NullEventEmitter;

impl NullEventEmitter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventEmitter for NullEventEmitter {
    async fn emit(&self, _event: &PipelineEvent) {}
}

/// Fans an event out to every child emitter. A child that fails does not
/// block or skip the remaining children.
pub struct CompositeEventEmitter {
    emitters: Vec<SharedEventEmitter>,
}

impl CompositeEventEmitter {
    pub fn new(emitters: Vec<SharedEventEmitter>) -> Self {
        Self { emitters }
    }

    pub fn add_emitter(&mut self, emitter: SharedEventEmitter) {
        self.emitters.push(emitter);
    }

    pub fn emitters(&self) -> &[SharedEventEmitter] {
        &self.emitters
    }
}

#[async_trait]
impl EventEmitter for CompositeEventEmitter {
    async fn emit(&self, event: &PipelineEvent) {
        for emitter in &self.emitters {
            emitter.emit(event).await;
        }
    }

    async fn close(&self) {
        for emitter in &self.emitters {
            emitter.close().await;
        }
    }
}

/// Which sinks a deployment wants events routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSinkType {
    Logging,
    Metrics,
}

/// Builds an emitter for the requested sinks. Empty or absent `sink_types`
/// defaults to logging only; a single sink returns that emitter directly
/// rather than wrapping it in a composite of one.
pub fn create_event_emitter(sink_types: &[EventSinkType]) -> SharedEventEmitter {
    if sink_types.is_empty() {
        return Arc::new(LoggingEventEmitter::new());
    }

    let mut emitters: Vec<SharedEventEmitter> = Vec::new();
    for sink in sink_types {
        match sink {
            EventSinkType::Logging => emitters.push(Arc::new(LoggingEventEmitter::new())),
            EventSinkType::Metrics => {
                emitters.push(Arc::new(super::metrics::MetricsEventEmitter::new()))
            }
        }
    }

    match emitters.len() {
        0 => Arc::new(LoggingEventEmitter::new()),
        1 => emitters.remove(0),
        _ => Arc::new(CompositeEventEmitter::new(emitters)),
    }
}
