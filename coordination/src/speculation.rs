//! Multi-Proposal Speculative Execution
//!
//! For hard/risky tasks, a single implementer often gets stuck in local
//! minima. This module provides the planning and selection logic for
//! spawning multiple implementations in parallel with different strategies.
//!
//! # Flow
//!
//! ```text
//! Task Assessment → SpeculativePlanner → Vec<ProposalSpec>
//!                                              ↓
//!                                    [Orchestrator executes each]
//!                                              ↓
//!                                    Vec<ProposalResult>
//!                                              ↓
//!                                    ProposalSelector → Winner
//! ```
//!
//! # Strategy Diversity
//!
//! Proposals are diversified along three axes:
//! - **Temperature**: Conservative (0.2) vs creative (0.8)
//! - **Approach**: Minimal fix vs refactor for clarity
//! - **Model tier**: Fast (14B) vs deep (72B) vs cloud
//!
//! # Selection Criteria
//!
//! When multiple proposals pass the verifier, the selector ranks by:
//! 1. Verifier pass (hard gate)
//! 2. Fewest remaining warnings
//! 3. Smallest diff (most concise change)
//! 4. Lowest token cost

use crate::escalation::worker_first::TaskComplexity;
use serde::{Deserialize, Serialize};

/// Configuration for speculative execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeculativeConfig {
    /// Minimum task complexity to trigger speculation.
    pub min_complexity: TaskComplexity,
    /// Maximum number of parallel proposals.
    pub max_proposals: usize,
    /// Maximum total token budget across all proposals.
    pub token_budget: u64,
    /// Whether speculation is enabled at all.
    pub enabled: bool,
}

impl Default for SpeculativeConfig {
    fn default() -> Self {
        Self {
            min_complexity: TaskComplexity::Complex,
            max_proposals: 3,
            token_budget: 200_000,
            enabled: false,
        }
    }
}

impl SpeculativeConfig {
    /// Read from environment variables.
    pub fn from_env() -> Self {
        let enabled = std::env::var("SWARM_SPECULATION_ENABLED")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let max_proposals = std::env::var("SWARM_SPECULATION_MAX_PROPOSALS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3);
        let token_budget = std::env::var("SWARM_SPECULATION_TOKEN_BUDGET")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(200_000);

        Self {
            min_complexity: TaskComplexity::Complex,
            max_proposals,
            token_budget,
            enabled,
        }
    }

    /// Whether speculation should activate for a given complexity.
    pub fn should_speculate(&self, complexity: TaskComplexity) -> bool {
        if !self.enabled {
            return false;
        }
        matches!(
            (complexity, self.min_complexity),
            (TaskComplexity::Complex, _) | (TaskComplexity::Medium, TaskComplexity::Medium)
        )
    }
}

/// Strategy axis for differentiating proposals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalStrategy {
    /// Conservative: minimal changes, low temperature.
    Conservative,
    /// Standard: balanced approach, moderate temperature.
    Balanced,
    /// Creative: broader refactoring allowed, high temperature.
    Creative,
}

impl std::fmt::Display for ProposalStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Conservative => write!(f, "conservative"),
            Self::Balanced => write!(f, "balanced"),
            Self::Creative => write!(f, "creative"),
        }
    }
}

/// Model tier preference for a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalTier {
    /// Fast local model (strand-14B).
    Fast,
    /// Reasoning local model (OR1-Behemoth 72B).
    Reasoning,
    /// Cloud model (Opus 4.6 etc).
    Cloud,
}

impl std::fmt::Display for ProposalTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::Reasoning => write!(f, "reasoning"),
            Self::Cloud => write!(f, "cloud"),
        }
    }
}

/// Specification for a single proposal attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalSpec {
    /// Unique proposal identifier (e.g., "prop-0", "prop-1").
    pub id: String,
    /// Strategy axis for this proposal.
    pub strategy: ProposalStrategy,
    /// Model tier to use.
    pub tier: ProposalTier,
    /// Temperature setting.
    pub temperature: f64,
    /// System prompt variant description.
    pub prompt_variant: String,
    /// Maximum tokens for this proposal.
    pub max_tokens: u64,
}

/// Result of a single proposal execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalResult {
    /// Which proposal spec this corresponds to.
    pub proposal_id: String,
    /// Whether the verifier passed.
    pub verifier_passed: bool,
    /// Number of remaining errors.
    pub error_count: usize,
    /// Number of remaining warnings.
    pub warning_count: usize,
    /// Number of files changed.
    pub files_changed: usize,
    /// Total lines added + removed.
    pub diff_size: usize,
    /// Tokens consumed.
    pub tokens_used: u64,
    /// Duration of the attempt.
    pub duration_secs: f64,
    /// Strategy used.
    pub strategy: ProposalStrategy,
    /// Model tier used.
    pub tier: ProposalTier,
}

/// Outcome of the speculative execution selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SelectionOutcome {
    /// A clear winner was selected.
    Winner { winner_id: String, reason: String },
    /// No proposals passed the verifier.
    NonePassedVerifier {
        /// Combined insights from failed attempts for retry context.
        combined_insights: Vec<String>,
    },
    /// Only one proposal was submitted (no competition).
    SingleProposal { proposal_id: String, passed: bool },
}

/// Plan generated by the speculative planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeculativePlan {
    /// Proposals to execute.
    pub proposals: Vec<ProposalSpec>,
    /// Token budget allocated per proposal.
    pub per_proposal_budget: u64,
    /// Total token budget.
    pub total_budget: u64,
    /// Task description used for planning.
    pub task_summary: String,
    /// Assessed complexity.
    pub complexity: TaskComplexity,
}

/// Generate a speculative plan for a task.
///
/// Creates diversified proposals based on task complexity and available
/// budget. Returns `None` if speculation should not be used.
pub fn plan_proposals(
    task_description: &str,
    complexity: TaskComplexity,
    config: &SpeculativeConfig,
) -> Option<SpeculativePlan> {
    if !config.should_speculate(complexity) {
        return None;
    }

    let max_proposals = config.max_proposals.min(3);
    let per_proposal_budget = config.token_budget / max_proposals as u64;

    let mut proposals = Vec::with_capacity(max_proposals);

    // Proposal 0: Conservative (minimal fix, low temp, fast model)
    proposals.push(ProposalSpec {
        id: "prop-0".to_string(),
        strategy: ProposalStrategy::Conservative,
        tier: ProposalTier::Fast,
        temperature: 0.2,
        prompt_variant: "Minimal targeted fix. Change as few lines as possible.".to_string(),
        max_tokens: per_proposal_budget,
    });

    // Proposal 1: Balanced (standard approach, reasoning model)
    if max_proposals >= 2 {
        proposals.push(ProposalSpec {
            id: "prop-1".to_string(),
            strategy: ProposalStrategy::Balanced,
            tier: ProposalTier::Reasoning,
            temperature: 0.5,
            prompt_variant: "Balanced implementation. Fix the issue with clean code.".to_string(),
            max_tokens: per_proposal_budget,
        });
    }

    // Proposal 2: Creative (refactor, high temp, cloud model)
    if max_proposals >= 3 {
        proposals.push(ProposalSpec {
            id: "prop-2".to_string(),
            strategy: ProposalStrategy::Creative,
            tier: ProposalTier::Cloud,
            temperature: 0.8,
            prompt_variant:
                "Refactor for clarity. You may restructure code to solve the root cause."
                    .to_string(),
            max_tokens: per_proposal_budget,
        });
    }

    Some(SpeculativePlan {
        proposals,
        per_proposal_budget,
        total_budget: config.token_budget,
        task_summary: task_description.to_string(),
        complexity,
    })
}

/// Select the best proposal from a set of results.
///
/// Ranking:
/// 1. Verifier passed (hard gate)
/// 2. Fewest errors
/// 3. Fewest warnings
/// 4. Smallest diff (most concise)
/// 5. Lowest token cost
pub fn select_winner(results: &[ProposalResult]) -> SelectionOutcome {
    if results.is_empty() {
        return SelectionOutcome::NonePassedVerifier {
            combined_insights: vec!["No proposals were executed.".to_string()],
        };
    }

    if results.len() == 1 {
        return SelectionOutcome::SingleProposal {
            proposal_id: results[0].proposal_id.clone(),
            passed: results[0].verifier_passed,
        };
    }

    let mut passed: Vec<&ProposalResult> = results.iter().filter(|r| r.verifier_passed).collect();

    if passed.is_empty() {
        // None passed — combine insights
        let insights = results
            .iter()
            .map(|r| {
                format!(
                    "{} ({}): {} errors, {} warnings, {} files changed",
                    r.proposal_id, r.strategy, r.error_count, r.warning_count, r.files_changed,
                )
            })
            .collect();

        return SelectionOutcome::NonePassedVerifier {
            combined_insights: insights,
        };
    }

    // Sort passed proposals by quality (errors → warnings → diff_size → tokens)
    passed.sort_by(|a, b| {
        a.error_count
            .cmp(&b.error_count)
            .then(a.warning_count.cmp(&b.warning_count))
            .then(a.diff_size.cmp(&b.diff_size))
            .then(a.tokens_used.cmp(&b.tokens_used))
    });

    let winner = passed[0];
    let reason = if passed.len() == 1 {
        format!(
            "Only passing proposal: {} ({})",
            winner.proposal_id, winner.strategy,
        )
    } else {
        format!(
            "Best of {} passing proposals: {} ({}) — {} errors, {} warnings, {} diff lines, {} tokens",
            passed.len(),
            winner.proposal_id,
            winner.strategy,
            winner.error_count,
            winner.warning_count,
            winner.diff_size,
            winner.tokens_used,
        )
    };

    SelectionOutcome::Winner {
        winner_id: winner.proposal_id.clone(),
        reason,
    }
}

/// Summary of a speculative execution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeculationSummary {
    /// Number of proposals attempted.
    pub proposals_attempted: usize,
    /// Number that passed the verifier.
    pub proposals_passed: usize,
    /// Total tokens consumed across all proposals.
    pub total_tokens: u64,
    /// Total duration across all proposals.
    pub total_duration_secs: f64,
    /// The selection outcome.
    pub outcome: SelectionOutcome,
}

/// Compute a summary from proposal results.
pub fn summarize_results(results: &[ProposalResult]) -> SpeculationSummary {
    let proposals_attempted = results.len();
    let proposals_passed = results.iter().filter(|r| r.verifier_passed).count();
    let total_tokens: u64 = results.iter().map(|r| r.tokens_used).sum();
    let total_duration_secs: f64 = results.iter().map(|r| r.duration_secs).sum();
    let outcome = select_winner(results);

    SpeculationSummary {
        proposals_attempted,
        proposals_passed,
        total_tokens,
        total_duration_secs,
        outcome,
    }
}
