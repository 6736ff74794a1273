//! Thin wrapper over [`coordination::state`] that enforces transition
//! legality and retries optimistic-lock conflicts.
//!
//! The stage enum and the valid-transition map live in `coordination`;
//! this module owns nothing about *which* transitions are legal, only how
//! an issue's state is read, mutated, and re-persisted.

use std::collections::HashMap;

use chrono::Utc;
use coordination::state::{
    is_valid_transition, PipelineStage, PipelineState, SharedStateRepository, StateTransition,
    StoreError,
};

/// Number of times a caller-visible operation retries on a version conflict
/// before surfacing it.
const MAX_RETRIES: u32 = 5;

#[derive(Debug, thiserror::Error)]
pub enum StateMachineError {
    #[error("no pipeline state found for issue {0}")]
    NotFound(String),

    #[error("cannot transition issue {issue_id} from {from} to {to}")]
    InvalidTransition {
        issue_id: String,
        from: PipelineStage,
        to: PipelineStage,
    },

    #[error("pipeline state already exists for issue {0}")]
    AlreadyExists(String),

    #[error("version conflict updating issue {0} after {1} retries")]
    VersionConflict(String, u32),

    #[error("state store error: {0}")]
    Store(#[from] StoreError),
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;

/// Drives one issue's [`PipelineState`] through the valid-transition map,
/// persisting every change through a [`coordination::state::StateRepository`].
pub struct PipelineStateMachine {
    repository: SharedStateRepository,
}

impl PipelineStateMachine {
    pub fn new(repository: SharedStateRepository) -> Self {
        Self { repository }
    }

    /// Create a brand-new state in `PENDING` and persist it.
    pub async fn create(&self, issue_id: &str, repository: &str) -> StateMachineResult<PipelineState> {
        let state = PipelineState::new(issue_id, repository);
        match self.repository.save(&state).await {
            Ok(()) => Ok(state),
            Err(StoreError::AlreadyExists(id)) => Err(StateMachineError::AlreadyExists(id)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, issue_id: &str) -> StateMachineResult<PipelineState> {
        self.repository
            .get(issue_id)
            .await?
            .ok_or_else(|| StateMachineError::NotFound(issue_id.to_string()))
    }

    /// Transition `issue_id` to `to_stage`, recording `details` on the new
    /// transition. Retries on optimistic-lock conflict by re-reading the
    /// current state, up to [`MAX_RETRIES`] times.
    pub async fn transition(
        &self,
        issue_id: &str,
        to_stage: PipelineStage,
        details: HashMap<String, serde_json::Value>,
    ) -> StateMachineResult<PipelineState> {
        for attempt in 0..MAX_RETRIES {
            let mut state = self.get(issue_id).await?;
            let from_stage = state.current_stage;

            if !is_valid_transition(from_stage, to_stage) {
                return Err(StateMachineError::InvalidTransition {
                    issue_id: issue_id.to_string(),
                    from: from_stage,
                    to: to_stage,
                });
            }

            let now = Utc::now();
            state.state_history.push(StateTransition {
                from_stage,
                to_stage,
                timestamp: now,
                details: details.clone(),
            });
            state.current_stage = to_stage;
            state.updated_at = now;
            state.version += 1;

            if to_stage == PipelineStage::Failed {
                let message = details
                    .get("error")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown error");
                state.error = Some(message.to_string());
            } else if to_stage == PipelineStage::Pending {
                state.error = None;
            }

            if self.repository.update_with_version(&state).await? {
                return Ok(state);
            }

            tracing::warn!(issue_id, attempt, "version conflict, retrying transition");
        }

        Err(StateMachineError::VersionConflict(issue_id.to_string(), MAX_RETRIES))
    }

    pub async fn set_classification(
        &self,
        issue_id: &str,
        classification: serde_json::Value,
    ) -> StateMachineResult<PipelineState> {
        self.mutate(issue_id, |state| {
            state.classification = Some(classification.clone());
        })
        .await
    }

    pub async fn set_workspace_path(
        &self,
        issue_id: &str,
        workspace_path: String,
    ) -> StateMachineResult<PipelineState> {
        self.mutate(issue_id, |state| {
            state.workspace_path = Some(workspace_path.clone());
        })
        .await
    }

    pub async fn set_pr_number(&self, issue_id: &str, pr_number: i64) -> StateMachineResult<PipelineState> {
        self.mutate(issue_id, |state| {
            state.pr_number = Some(pr_number);
        })
        .await
    }

    /// Passthrough to the underlying repository's liveness probe.
    pub async fn health_check(&self) -> bool {
        self.repository.health_check().await
    }

    /// Apply a field-level mutation (no stage change, no new transition
    /// record) and persist it, retrying on version conflict.
    async fn mutate(
        &self,
        issue_id: &str,
        f: impl Fn(&mut PipelineState),
    ) -> StateMachineResult<PipelineState> {
        for attempt in 0..MAX_RETRIES {
            let mut state = self.get(issue_id).await?;
            f(&mut state);
            state.updated_at = Utc::now();
            state.version += 1;

            if self.repository.update_with_version(&state).await? {
                return Ok(state);
            }

            tracing::warn!(issue_id, attempt, "version conflict, retrying field update");
        }

        Err(StateMachineError::VersionConflict(issue_id.to_string(), MAX_RETRIES))
    }
}
