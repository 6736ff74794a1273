//! Prometheus metrics fed by pipeline events.
//!
//! Mirrors the four counters/gauge the event stream drives: issues
//! processed, issues failed (by stage), processing duration, and current
//! issues per stage.

use async_trait::async_trait;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use tracing::error;

use super::emitter::EventEmitter;
use super::types::{EventType, PipelineEvent};

const STAGES: &[&str] = &[
    "pending",
    "intake",
    "clarification",
    "provisioning",
    "implementation",
    "pr_creation",
    "completed",
    "failed",
];

const DURATION_BUCKETS: &[f64] = &[
    1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0,
];

/// Container for the pipeline's Prometheus metrics, backed by its own
/// registry so tests don't collide with a process-global one.
pub struct PipelineMetrics {
    registry: Registry,
    issues_processed_total: IntCounterVec,
    issues_failed_total: IntCounterVec,
    processing_duration_seconds: HistogramVec,
    issues_by_stage: IntGaugeVec,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::with_registry(Registry::new())
    }

    pub fn with_registry(registry: Registry) -> Self {
        let issues_processed_total = IntCounterVec::new(
            Opts::new(
                "pipeline_issues_processed_total",
                "Total number of issues processed by the pipeline",
            ),
            &["repository", "result"],
        )
        .expect("static metric options are valid");

        let issues_failed_total = IntCounterVec::new(
            Opts::new(
                "pipeline_issues_failed_total",
                "Total number of issues that failed during processing",
            ),
            &["repository", "stage"],
        )
        .expect("static metric options are valid");

        let processing_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "pipeline_processing_duration_seconds",
                "Time spent processing issues in seconds",
            )
            .buckets(DURATION_BUCKETS.to_vec()),
            &["repository"],
        )
        .expect("static metric options are valid");

        let issues_by_stage = IntGaugeVec::new(
            Opts::new(
                "pipeline_issues_by_stage",
                "Current number of issues in each pipeline stage",
            ),
            &["stage"],
        )
        .expect("static metric options are valid");

        registry
            .register(Box::new(issues_processed_total.clone()))
            .expect("metric not already registered");
        registry
            .register(Box::new(issues_failed_total.clone()))
            .expect("metric not already registered");
        registry
            .register(Box::new(processing_duration_seconds.clone()))
            .expect("metric not already registered");
        registry
            .register(Box::new(issues_by_stage.clone()))
            .expect("metric not already registered");

        for stage in STAGES {
            issues_by_stage.with_label_values(&[stage]).set(0);
        }

        Self {
            registry,
            issues_processed_total,
            issues_failed_total,
            processing_duration_seconds,
            issues_by_stage,
        }
    }

    pub fn record_issue_processed(&self, repository: &str, success: bool) {
        let result = if success { "success" } else { "failure" };
        self.issues_processed_total
            .with_label_values(&[repository, result])
            .inc();
    }

    pub fn record_issue_failed(&self, repository: &str, stage: &str) {
        self.issues_failed_total
            .with_label_values(&[repository, stage])
            .inc();
    }

    pub fn record_processing_duration(&self, repository: &str, duration_seconds: f64) {
        self.processing_duration_seconds
            .with_label_values(&[repository])
            .observe(duration_seconds);
    }

    /// Adjust the stage gauge by `delta`, clamped at zero.
    pub fn update_stage_count(&self, stage: &str, delta: i64) {
        if !STAGES.contains(&stage) {
            return;
        }
        let gauge = self.issues_by_stage.with_label_values(&[stage]);
        let next = (gauge.get() + delta).max(0);
        gauge.set(next);
    }

    /// Render the registry in Prometheus text exposition format, for the
    /// `/metrics` endpoint.
    pub fn render(&self) -> Result<Vec<u8>, prometheus::Error> {
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        Ok(buffer)
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Updates [`PipelineMetrics`] from the event stream.
pub struct MetricsEventEmitter {
    metrics: PipelineMetrics,
}

impl MetricsEventEmitter {
    pub fn new() -> Self {
        Self {
            metrics: PipelineMetrics::new(),
        }
    }

    pub fn with_metrics(metrics: PipelineMetrics) -> Self {
        Self { metrics }
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }
}

impl Default for MetricsEventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventEmitter for MetricsEventEmitter {
    async fn emit(&self, event: &PipelineEvent) {
        match event.event_type {
            EventType::StateTransition => {
                if let Some(from) = event.details.get("from_stage").and_then(|v| v.as_str()) {
                    self.metrics.update_stage_count(from, -1);
                }
                if let Some(to) = event.details.get("to_stage").and_then(|v| v.as_str()) {
                    self.metrics.update_stage_count(to, 1);
                }
            }
            EventType::Error => {
                let stage = event
                    .details
                    .get("stage")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown");
                self.metrics.record_issue_failed(&event.repository, stage);
            }
            EventType::Completion => {
                self.metrics.record_issue_processed(&event.repository, true);
                if let Some(duration) = event.details.get("duration_seconds").and_then(|v| v.as_f64()) {
                    self.metrics
                        .record_processing_duration(&event.repository, duration);
                }
            }
            EventType::Timeout => {
                let stage = event
                    .details
                    .get("stage")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown");
                self.metrics.record_issue_failed(&event.repository, stage);
            }
        }
    }
}
