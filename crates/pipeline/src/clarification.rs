//! Clarification state management: keeps the `needs-clarification` label
//! and its companion comment in sync with the latest classification.

use std::sync::Arc;

use crate::classification::IssueClassification;
use crate::github_client::{GitHubClient, GitHubClientError};

pub const NEEDS_CLARIFICATION_LABEL: &str = "needs-clarification";

const CLARIFICATION_HEADER: &str = "## 🤖 Clarification Needed\n\nThis issue needs a bit more detail before the pipeline can act on it. Please answer the following:\n";
const CLARIFICATION_FOOTER: &str = "\nOnce you've updated the issue, this comment will be re-evaluated automatically.";

/// Pure decision: whether the label should be present, absent, or left
/// untouched. The two non-`None` branches are exhaustive and mutually
/// exclusive over `completeness_score`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelAction {
    Add,
    Remove,
}

pub fn determine_label_action(classification: &IssueClassification) -> LabelAction {
    if classification.needs_clarification() {
        LabelAction::Add
    } else {
        LabelAction::Remove
    }
}

/// Formats the clarification checklist comment. Empty when there are no
/// questions to ask.
pub fn format_clarification_comment(classification: &IssueClassification) -> String {
    if classification.clarification_questions.is_empty() {
        return String::new();
    }
    let checklist = format_questions_as_checklist(&classification.clarification_questions);
    if checklist.is_empty() {
        return String::new();
    }
    format!("{CLARIFICATION_HEADER}\n{checklist}\n{CLARIFICATION_FOOTER}")
}

fn format_questions_as_checklist(questions: &[String]) -> String {
    questions
        .iter()
        .map(|q| sanitize_question(q))
        .filter(|q| !q.is_empty())
        .map(|q| format!("- [ ] {q}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn sanitize_question(question: &str) -> String {
    let mut sanitized = question.trim().replace(['\n', '\r'], " ");
    while sanitized.contains("  ") {
        sanitized = sanitized.replace("  ", " ");
    }
    sanitized
}

/// Keeps the `needs-clarification` label and its comment in sync with the
/// issue's latest classification verdict.
pub struct ClarificationManager {
    github_client: Arc<GitHubClient>,
    label_name: String,
}

impl ClarificationManager {
    pub fn new(github_client: Arc<GitHubClient>) -> Self {
        Self { github_client, label_name: NEEDS_CLARIFICATION_LABEL.to_string() }
    }

    /// Inspects `classification` and idempotently adds (with a posted
    /// comment) or removes the clarification label.
    pub async fn update_clarification_state(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        classification: &IssueClassification,
        post_comment: bool,
    ) -> Result<(), GitHubClientError> {
        match determine_label_action(classification) {
            LabelAction::Add => {
                self.github_client.add_label(owner, repo, issue_number, &self.label_name).await?;
                if post_comment {
                    self.post_clarification_comment(owner, repo, issue_number, classification).await?;
                }
            }
            LabelAction::Remove => {
                self.github_client.remove_label(owner, repo, issue_number, &self.label_name).await?;
            }
        }
        Ok(())
    }

    async fn post_clarification_comment(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        classification: &IssueClassification,
    ) -> Result<(), GitHubClientError> {
        let body = format_clarification_comment(classification);
        if body.is_empty() {
            return Ok(());
        }
        self.github_client.create_comment(owner, repo, issue_number, &body).await?;
        Ok(())
    }
}
