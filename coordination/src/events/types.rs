//! Pipeline event model: the four event types emitted per side effect.
//!
//! Events are never persisted in the state store; they exist only to feed
//! emitters (logging, metrics). See [`super::emitter`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Category of a [`PipelineEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    StateTransition,
    Error,
    Completion,
    Timeout,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StateTransition => "state_transition",
            Self::Error => "error",
            Self::Completion => "completion",
            Self::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single observability event emitted by the orchestrator.
///
/// `details` carries event-type-specific context: `from_stage`/`to_stage`
/// (and optionally `classification`) for `state_transition`; `error_message`,
/// `error_type`, `stage` for `error`; `pr_number`, `pr_url`,
/// `duration_seconds` for `completion`; `operation`, `timeout_seconds`,
/// `stage` for `timeout`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    pub event_type: EventType,
    pub issue_id: String,
    pub repository: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub details: HashMap<String, serde_json::Value>,
}

impl PipelineEvent {
    pub fn new(
        event_type: EventType,
        issue_id: impl Into<String>,
        repository: impl Into<String>,
        details: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            event_type,
            issue_id: issue_id.into(),
            repository: repository.into(),
            timestamp: Utc::now(),
            details,
        }
    }

    pub fn state_transition(
        issue_id: impl Into<String>,
        repository: impl Into<String>,
        from_stage: &str,
        to_stage: &str,
    ) -> Self {
        let mut details = HashMap::new();
        details.insert("from_stage".to_string(), serde_json::json!(from_stage));
        details.insert("to_stage".to_string(), serde_json::json!(to_stage));
        Self::new(EventType::StateTransition, issue_id, repository, details)
    }

    pub fn error(
        issue_id: impl Into<String>,
        repository: impl Into<String>,
        stage: &str,
        error_message: &str,
    ) -> Self {
        let mut details = HashMap::new();
        details.insert("stage".to_string(), serde_json::json!(stage));
        details.insert(
            "error_message".to_string(),
            serde_json::json!(error_message),
        );
        Self::new(EventType::Error, issue_id, repository, details)
    }

    pub fn completion(
        issue_id: impl Into<String>,
        repository: impl Into<String>,
        pr_number: i64,
        duration_seconds: f64,
    ) -> Self {
        let mut details = HashMap::new();
        details.insert("pr_number".to_string(), serde_json::json!(pr_number));
        details.insert(
            "duration_seconds".to_string(),
            serde_json::json!(duration_seconds),
        );
        Self::new(EventType::Completion, issue_id, repository, details)
    }

    pub fn timeout(
        issue_id: impl Into<String>,
        repository: impl Into<String>,
        stage: &str,
        operation: &str,
        timeout_seconds: u64,
    ) -> Self {
        let mut details = HashMap::new();
        details.insert("stage".to_string(), serde_json::json!(stage));
        details.insert("operation".to_string(), serde_json::json!(operation));
        details.insert(
            "timeout_seconds".to_string(),
            serde_json::json!(timeout_seconds),
        );
        Self::new(EventType::Timeout, issue_id, repository, details)
    }

    /// Flattened view suitable for a structured log record: fixed fields
    /// plus every entry in `details`.
    pub fn to_log_fields(&self) -> HashMap<String, serde_json::Value> {
        let mut fields = self.details.clone();
        fields.insert("event_type".to_string(), serde_json::json!(self.event_type.as_str()));
        fields.insert("issue_id".to_string(), serde_json::json!(self.issue_id));
        fields.insert("repository".to_string(), serde_json::json!(self.repository));
        fields.insert(
            "timestamp".to_string(),
            serde_json::json!(self.timestamp.to_rfc3339()),
        );
        fields
    }
}
