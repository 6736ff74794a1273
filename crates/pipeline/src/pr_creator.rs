//! Opens the pull request for a completed implementation run and links it
//! back to the originating issue.

use std::sync::Arc;

use crate::classification::{IssueClassification, IssueType};
use crate::github_client::{GitHubClient, GitHubClientError, PrCreateRequest, PrCreateResult};
use crate::runner::RunResult;

const MAX_BODY_SUMMARY_CHARS: usize = 2100;
const TRUNCATION_MARKER: &str = "\n\n_...output truncated..._";
const AUTOMATED_LABEL: &str = "archon-automated";

/// Outcome of opening a PR: the PR itself, plus whether the follow-up
/// issue comment succeeded (its failure never fails the overall operation).
#[derive(Debug, Clone)]
pub struct PrCreationOutcome {
    pub pr_number: u64,
    pub pr_url: String,
    pub comment_posted: bool,
}

pub struct PrCreator {
    github_client: Arc<GitHubClient>,
}

impl PrCreator {
    pub fn new(github_client: Arc<GitHubClient>) -> Self {
        Self { github_client }
    }

    pub async fn create_pr_for_issue(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        issue_title: &str,
        head_branch: &str,
        run_result: &RunResult,
        classification: &IssueClassification,
    ) -> Result<PrCreationOutcome, GitHubClientError> {
        let request = PrCreateRequest {
            title: format!("Fix #{issue_number}: {issue_title}"),
            body: build_pr_body(issue_number, run_result, classification),
            head_branch: head_branch.to_string(),
            base_branch: "main".to_string(),
            labels: labels_for(classification),
            reviewers: Vec::new(),
        };

        let PrCreateResult { pr_number, pr_url } = self.github_client.create_pr(owner, repo, &request).await?;

        let comment_posted = self
            .github_client
            .create_comment(
                owner,
                repo,
                issue_number,
                &format!("Opened pull request #{pr_number}: {pr_url}"),
            )
            .await
            .map(|_| true)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, pr_number, "failed to post PR link comment on issue");
                false
            });

        Ok(PrCreationOutcome { pr_number, pr_url, comment_posted })
    }
}

fn labels_for(classification: &IssueClassification) -> Vec<String> {
    let mut labels = vec![AUTOMATED_LABEL.to_string()];
    if let Some(type_label) = type_label(classification.issue_type) {
        labels.push(type_label.to_string());
    }
    labels
}

fn type_label(issue_type: IssueType) -> Option<&'static str> {
    match issue_type {
        IssueType::Feature => Some("enhancement"),
        IssueType::Bug => Some("bug"),
        IssueType::Documentation => Some("documentation"),
        IssueType::Infrastructure => Some("infrastructure"),
        IssueType::Unknown => None,
    }
}

fn build_pr_body(issue_number: u64, run_result: &RunResult, classification: &IssueClassification) -> String {
    let mut sections = Vec::new();

    sections.push(format!("Closes #{issue_number}"));
    sections.push(format!("## Summary\n\n{}", summarize_stdout(&run_result.stdout)));
    sections.push(format!("**Type:** {}", classification.issue_type));

    if !classification.affected_packages.is_empty() {
        sections.push(format!("**Affected Packages:** {}", classification.affected_packages.join(", ")));
    }

    if let Some(files_section) = files_changed_section(&run_result.stdout) {
        sections.push(files_section);
    }

    sections.join("\n\n")
}

fn summarize_stdout(stdout: &str) -> String {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return "_No implementation summary was captured._".to_string();
    }
    if trimmed.len() > MAX_BODY_SUMMARY_CHARS {
        let mut truncated = trimmed[..MAX_BODY_SUMMARY_CHARS].to_string();
        truncated.push_str(TRUNCATION_MARKER);
        truncated
    } else {
        trimmed.to_string()
    }
}

/// The CLI's stdout may list changed file paths one per line prefixed with
/// a marker; absent that convention, no section is emitted.
fn files_changed_section(stdout: &str) -> Option<String> {
    let files: Vec<&str> = stdout
        .lines()
        .filter_map(|line| line.strip_prefix("CHANGED: ").map(str::trim))
        .filter(|f| !f.is_empty())
        .collect();

    if files.is_empty() {
        return None;
    }

    let list = files.iter().map(|f| format!("- `{f}`")).collect::<Vec<_>>().join("\n");
    Some(format!("## Files Changed\n\n{list}"))
}
