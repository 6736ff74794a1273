//! Durable pipeline state: stages, transitions, and Postgres-backed persistence.
//!
//! [`types`] defines the stage enumeration, the valid-transition map, and the
//! [`PipelineState`]/[`StateTransition`] records. [`repository`] persists them
//! with optimistic locking via the `version` column.

pub mod repository;
pub mod types;

pub use repository::{
    PostgresStateRepository, SharedStateRepository, StateRepository, StoreError, StoreResult,
};
pub use types::{
    is_terminal_stage, is_valid_transition, valid_targets, PipelineStage, PipelineState,
    StateTransition,
};
