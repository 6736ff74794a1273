//! Compaction and summarization error taxonomy.
//!
//! Explicit typed errors for every failure class in the compaction
//! and summarization paths. No broad catches.

use serde::{Deserialize, Serialize};

/// High-level error kind for compaction failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompactionErrorKind {
    /// No entries available to compact.
    EmptyInput,
    /// Token budget insufficient for even the summary.
    BudgetExhausted,
    /// Summarization model call failed.
    SummarizationFailed,
    /// Summary output exceeded token budget.
    SummaryTooLarge,
    /// Integrity check failed after compaction.
    IntegrityViolation,
    /// Concurrent modification detected.
    ConcurrentModification,
    /// Persistence (save/load) failed.
    PersistenceFailed,
    /// Sequence gap detected in entries.
    SequenceGap,
    /// Compaction range is invalid.
    InvalidRange,
}

impl CompactionErrorKind {
    /// Whether this error is retryable.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::SummarizationFailed | Self::ConcurrentModification | Self::PersistenceFailed
        )
    }

    /// Suggested action for this error kind.
    pub fn suggested_action(self) -> &'static str {
        match self {
            Self::EmptyInput => "skip compaction — nothing to compact",
            Self::BudgetExhausted => "increase token budget or reduce retention",
            Self::SummarizationFailed => "retry with backoff or use fallback summarizer",
            Self::SummaryTooLarge => "request shorter summary or increase budget",
            Self::IntegrityViolation => "discard summary and retry from clean state",
            Self::ConcurrentModification => "re-read state and retry compaction",
            Self::PersistenceFailed => "check storage health and retry",
            Self::SequenceGap => "rebuild sequence index before compacting",
            Self::InvalidRange => "verify compaction range parameters",
        }
    }
}

impl std::fmt::Display for CompactionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "empty_input"),
            Self::BudgetExhausted => write!(f, "budget_exhausted"),
            Self::SummarizationFailed => write!(f, "summarization_failed"),
            Self::SummaryTooLarge => write!(f, "summary_too_large"),
            Self::IntegrityViolation => write!(f, "integrity_violation"),
            Self::ConcurrentModification => write!(f, "concurrent_modification"),
            Self::PersistenceFailed => write!(f, "persistence_failed"),
            Self::SequenceGap => write!(f, "sequence_gap"),
            Self::InvalidRange => write!(f, "invalid_range"),
        }
    }
}

/// Compaction error with full context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionError {
    /// Error kind.
    pub kind: CompactionErrorKind,
    /// Human-readable detail.
    pub detail: String,
    /// Sequence range that was being compacted (if applicable).
    pub seq_range: Option<(u64, u64)>,
    /// Token count context (if applicable).
    pub token_context: Option<TokenContext>,
}

/// Token count context for budget-related errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenContext {
    /// Current token count.
    pub current: u64,
    /// Budget limit.
    pub budget: u64,
    /// Summary size (if applicable).
    pub summary_size: Option<u64>,
}

impl CompactionError {
    /// Create a new compaction error.
    pub fn new(kind: CompactionErrorKind, detail: &str) -> Self {
        Self {
            kind,
            detail: detail.to_string(),
            seq_range: None,
            token_context: None,
        }
    }

    /// Add sequence range context.
    pub fn with_range(mut self, start: u64, end: u64) -> Self {
        self.seq_range = Some((start, end));
        self
    }

    /// Add token context.
    pub fn with_tokens(mut self, current: u64, budget: u64) -> Self {
        self.token_context = Some(TokenContext {
            current,
            budget,
            summary_size: None,
        });
        self
    }

    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl std::fmt::Display for CompactionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "compaction error [{}]: {}", self.kind, self.detail)?;
        if let Some((start, end)) = self.seq_range {
            write!(f, " (seq {}..{})", start, end)?;
        }
        if let Some(ref ctx) = self.token_context {
            write!(f, " (tokens: {}/{})", ctx.current, ctx.budget)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompactionError {}

/// Summarization-specific error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizationError {
    /// The model that was used.
    pub model: String,
    /// What went wrong.
    pub reason: String,
    /// Number of entries that were being summarized.
    pub entry_count: usize,
    /// Total tokens in input.
    pub input_tokens: u64,
    /// Whether a retry is recommended.
    pub retryable: bool,
}

impl SummarizationError {
    /// Create a new summarization error.
    pub fn new(model: &str, reason: &str, entry_count: usize, input_tokens: u64) -> Self {
        Self {
            model: model.to_string(),
            reason: reason.to_string(),
            entry_count,
            input_tokens,
            retryable: true,
        }
    }

    /// Mark as non-retryable.
    pub fn non_retryable(mut self) -> Self {
        self.retryable = false;
        self
    }

    /// Convert to a CompactionError.
    pub fn into_compaction_error(self) -> CompactionError {
        CompactionError::new(CompactionErrorKind::SummarizationFailed, &self.reason)
    }
}

impl std::fmt::Display for SummarizationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "summarization failed [{}]: {} ({} entries, {} tokens)",
            self.model, self.reason, self.entry_count, self.input_tokens
        )
    }
}

impl std::error::Error for SummarizationError {}
