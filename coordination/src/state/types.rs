//! Pipeline stage enumeration, transition records, and the valid-transition map.
//!
//! The map in [`VALID_TRANSITIONS`] is the single source of truth for which
//! stage changes are legal; nothing else in the crate special-cases a stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A closed set of stages an issue progresses through.
///
/// Flow: `pending -> intake -> [clarification <-> intake] -> provisioning
/// -> implementation -> pr_creation -> completed`. Any stage may transition
/// to `failed`; `failed` may only recover to `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Pending,
    Intake,
    Clarification,
    Provisioning,
    Implementation,
    PrCreation,
    Completed,
    Failed,
}

impl PipelineStage {
    /// Stable wire/storage representation, matching the `snake_case` serde form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Intake => "intake",
            Self::Clarification => "clarification",
            Self::Provisioning => "provisioning",
            Self::Implementation => "implementation",
            Self::PrCreation => "pr_creation",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "pending" => Self::Pending,
            "intake" => Self::Intake,
            "clarification" => Self::Clarification,
            "provisioning" => Self::Provisioning,
            "implementation" => Self::Implementation,
            "pr_creation" => Self::PrCreation,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => return None,
        })
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Legal targets for each stage. `completed` has none (terminal); `failed`
/// only recovers to `pending`.
pub fn valid_targets(from: PipelineStage) -> &'static [PipelineStage] {
    use PipelineStage::*;
    match from {
        Pending => &[Intake, Failed],
        Intake => &[Clarification, Provisioning, Failed],
        Clarification => &[Intake, Provisioning, Failed],
        Provisioning => &[Implementation, Failed],
        Implementation => &[PrCreation, Failed],
        PrCreation => &[Completed, Failed],
        Completed => &[],
        Failed => &[Pending],
    }
}

pub fn is_valid_transition(from: PipelineStage, to: PipelineStage) -> bool {
    valid_targets(from).contains(&to)
}

pub fn is_terminal_stage(stage: PipelineStage) -> bool {
    valid_targets(stage).is_empty()
}

/// Immutable record of one stage change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from_stage: PipelineStage,
    pub to_stage: PipelineStage,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub details: HashMap<String, serde_json::Value>,
}

/// Full persisted state of one issue's journey through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    /// Canonical identifier, `"{owner}/{repo}#{number}"`.
    pub issue_id: String,
    /// `"{owner}/{repo}"`.
    pub repository: String,
    pub current_stage: PipelineStage,
    pub state_history: Vec<StateTransition>,
    pub classification: Option<serde_json::Value>,
    pub workspace_path: Option<String>,
    pub pr_number: Option<i64>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic-locking version; starts at 1, increments on every update.
    pub version: i64,
}

impl PipelineState {
    /// A freshly created state in `PENDING`, not yet persisted.
    pub fn new(issue_id: impl Into<String>, repository: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            issue_id: issue_id.into(),
            repository: repository.into(),
            current_stage: PipelineStage::Pending,
            state_history: Vec::new(),
            classification: None,
            workspace_path: None,
            pr_number: None,
            error: None,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }
}
