//! Observability events for the issue pipeline.
//!
//! [`types`] defines the event shape; [`emitter`] fans events out to
//! fault-tolerant sinks (logging, composite); [`metrics`] is the Prometheus
//! sink. Events are emitted per side effect and never persisted.

pub mod emitter;
pub mod metrics;
pub mod types;

pub use emitter::{
    create_event_emitter, CompositeEventEmitter, EventEmitter, EventSinkType,
    LoggingEventEmitter, NullEventEmitter, SharedEventEmitter,
};
pub use metrics::{MetricsEventEmitter, PipelineMetrics};
pub use types::{EventType, PipelineEvent};
