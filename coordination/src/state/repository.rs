//! PostgreSQL-backed persistence for [`PipelineState`].
//!
//! Provides connection pooling, atomic transactions for writes, optimistic
//! locking on the `version` column, and history reconstruction from the
//! `state_transitions` table.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use super::types::{PipelineStage, PipelineState, StateTransition};

/// Error type for state repository operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("pipeline state already exists for issue: {0}")]
    AlreadyExists(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Shared handle to a connected repository.
pub type SharedStateRepository = Arc<dyn StateRepository>;

/// Persistence contract for pipeline state. A trait so the orchestrator can
/// be tested against an in-memory fake instead of a live database.
#[async_trait]
pub trait StateRepository: Send + Sync {
    async fn save(&self, state: &PipelineState) -> StoreResult<()>;
    async fn get(&self, issue_id: &str) -> StoreResult<Option<PipelineState>>;
    async fn list_by_stage(&self, stage: PipelineStage) -> StoreResult<Vec<PipelineState>>;
    /// Persists `state` only if the stored row's version equals
    /// `state.version - 1`. Returns `false` without mutating on conflict.
    async fn update_with_version(&self, state: &PipelineState) -> StoreResult<bool>;
    async fn delete(&self, issue_id: &str) -> StoreResult<bool>;
    async fn health_check(&self) -> bool;
}

/// `StateRepository` implementation backed by a `sqlx::PgPool`.
pub struct PostgresStateRepository {
    pool: PgPool,
}

impl PostgresStateRepository {
    /// Connect and build a pool bounded by `min_size`/`max_size`.
    pub async fn connect(
        connection_string: &str,
        min_size: u32,
        max_size: u32,
    ) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(min_size)
            .max_connections(max_size)
            .connect(connection_string)
            .await?;
        Ok(Self { pool })
    }

    /// Wrap an already-constructed pool (tests, or a pool shared with other
    /// subsystems).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the schema this repository expects. Idempotent.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pipeline_states (
                issue_id        TEXT PRIMARY KEY,
                repository      TEXT NOT NULL,
                current_stage   TEXT NOT NULL,
                classification  JSONB,
                workspace_path  TEXT,
                pr_number       BIGINT,
                error           TEXT,
                created_at      TIMESTAMPTZ NOT NULL,
                updated_at      TIMESTAMPTZ NOT NULL,
                version         BIGINT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS state_transitions (
                id          BIGSERIAL PRIMARY KEY,
                issue_id    TEXT NOT NULL REFERENCES pipeline_states(issue_id) ON DELETE CASCADE,
                from_stage  TEXT NOT NULL,
                to_stage    TEXT NOT NULL,
                timestamp   TIMESTAMPTZ NOT NULL,
                details     JSONB
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS state_transitions_issue_id_idx \
             ON state_transitions (issue_id, timestamp, id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch_history(&self, issue_id: &str) -> StoreResult<Vec<StateTransition>> {
        let rows = sqlx::query(
            "SELECT from_stage, to_stage, timestamp, details \
             FROM state_transitions WHERE issue_id = $1 ORDER BY timestamp ASC, id ASC",
        )
        .bind(issue_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let from_stage: String = row.try_get("from_stage")?;
                let to_stage: String = row.try_get("to_stage")?;
                let details: Option<serde_json::Value> = row.try_get("details")?;
                Ok(StateTransition {
                    from_stage: PipelineStage::from_str(&from_stage)
                        .expect("stage column holds a valid stage"),
                    to_stage: PipelineStage::from_str(&to_stage)
                        .expect("stage column holds a valid stage"),
                    timestamp: row.try_get("timestamp")?,
                    details: match details {
                        Some(serde_json::Value::Object(map)) => map.into_iter().collect(),
                        _ => Default::default(),
                    },
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(StoreError::from)
    }

    fn row_to_state(
        row: &sqlx::postgres::PgRow,
        state_history: Vec<StateTransition>,
    ) -> StoreResult<PipelineState> {
        let current_stage: String = row.try_get("current_stage")?;
        Ok(PipelineState {
            issue_id: row.try_get("issue_id")?,
            repository: row.try_get("repository")?,
            current_stage: PipelineStage::from_str(&current_stage)
                .expect("stage column holds a valid stage"),
            state_history,
            classification: row.try_get("classification")?,
            workspace_path: row.try_get("workspace_path")?,
            pr_number: row.try_get("pr_number")?,
            error: row.try_get("error")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            version: row.try_get("version")?,
        })
    }
}

#[async_trait]
impl StateRepository for PostgresStateRepository {
    async fn save(&self, state: &PipelineState) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO pipeline_states (
                issue_id, repository, current_stage, classification,
                workspace_path, pr_number, error, created_at, updated_at, version
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (issue_id) DO NOTHING
            "#,
        )
        .bind(&state.issue_id)
        .bind(&state.repository)
        .bind(state.current_stage.as_str())
        .bind(&state.classification)
        .bind(&state.workspace_path)
        .bind(state.pr_number)
        .bind(&state.error)
        .bind(state.created_at)
        .bind(state.updated_at)
        .bind(state.version)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists(state.issue_id.clone()));
        }

        for transition in &state.state_history {
            sqlx::query(
                "INSERT INTO state_transitions (issue_id, from_stage, to_stage, timestamp, details) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(&state.issue_id)
            .bind(transition.from_stage.as_str())
            .bind(transition.to_stage.as_str())
            .bind(transition.timestamp)
            .bind(serde_json::to_value(&transition.details)?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::info!(issue_id = %state.issue_id, stage = %state.current_stage, "saved pipeline state");
        Ok(())
    }

    async fn get(&self, issue_id: &str) -> StoreResult<Option<PipelineState>> {
        let row = sqlx::query(
            "SELECT issue_id, repository, current_stage, classification, workspace_path, \
             pr_number, error, created_at, updated_at, version \
             FROM pipeline_states WHERE issue_id = $1",
        )
        .bind(issue_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let history = self.fetch_history(issue_id).await?;
        Ok(Some(Self::row_to_state(&row, history)?))
    }

    async fn list_by_stage(&self, stage: PipelineStage) -> StoreResult<Vec<PipelineState>> {
        let rows = sqlx::query(
            "SELECT issue_id FROM pipeline_states WHERE current_stage = $1 ORDER BY created_at ASC",
        )
        .bind(stage.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut states = Vec::with_capacity(rows.len());
        for row in rows {
            let issue_id: String = row.try_get("issue_id")?;
            if let Some(state) = self.get(&issue_id).await? {
                states.push(state);
            }
        }
        Ok(states)
    }

    async fn update_with_version(&self, state: &PipelineState) -> StoreResult<bool> {
        let expected_version = state.version - 1;
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE pipeline_states
            SET current_stage = $2, classification = $3, workspace_path = $4,
                pr_number = $5, error = $6, updated_at = $7, version = $8
            WHERE issue_id = $1 AND version = $9
            "#,
        )
        .bind(&state.issue_id)
        .bind(state.current_stage.as_str())
        .bind(&state.classification)
        .bind(&state.workspace_path)
        .bind(state.pr_number)
        .bind(&state.error)
        .bind(state.updated_at)
        .bind(state.version)
        .bind(expected_version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tracing::warn!(
                issue_id = %state.issue_id,
                expected_version,
                new_version = state.version,
                "version conflict during state update"
            );
            return Ok(false);
        }

        let existing_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM state_transitions WHERE issue_id = $1")
                .bind(&state.issue_id)
                .fetch_one(&mut *tx)
                .await?;

        let new_transitions = &state.state_history[existing_count as usize..];
        for transition in new_transitions {
            sqlx::query(
                "INSERT INTO state_transitions (issue_id, from_stage, to_stage, timestamp, details) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(&state.issue_id)
            .bind(transition.from_stage.as_str())
            .bind(transition.to_stage.as_str())
            .bind(transition.timestamp)
            .bind(serde_json::to_value(&transition.details)?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::info!(
            issue_id = %state.issue_id,
            stage = %state.current_stage,
            version = state.version,
            new_transitions = new_transitions.len(),
            "updated pipeline state"
        );
        Ok(true)
    }

    async fn delete(&self, issue_id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM pipeline_states WHERE issue_id = $1")
            .bind(issue_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> bool {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}
