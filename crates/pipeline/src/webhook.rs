//! GitHub issue webhook: the event model and the defensive parser that
//! turns a raw webhook payload into a [`GitHubIssueEvent`], never raising.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueAction {
    Opened,
    Edited,
    Labeled,
}

impl IssueAction {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "opened" => Some(Self::Opened),
            "edited" => Some(Self::Edited),
            "labeled" => Some(Self::Labeled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubIssueEvent {
    pub action: IssueAction,
    pub issue_number: u64,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub labels: Vec<String>,
    pub repository: String,
    pub owner: String,
    pub author: String,
}

impl GitHubIssueEvent {
    /// `"{owner}/{repository}#{issue_number}"` — the canonical key used to
    /// address pipeline state for this issue.
    pub fn issue_id(&self) -> String {
        format!("{}/{}#{}", self.owner, self.repository, self.issue_number)
    }

    /// `"{owner}/{repository}"`.
    pub fn full_repository(&self) -> String {
        format!("{}/{}", self.owner, self.repository)
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookParseError {
    #[error("missing or invalid action")]
    MissingAction,
    #[error("missing or invalid issue payload: {0}")]
    MissingIssue(&'static str),
    #[error("missing or invalid repository payload: {0}")]
    MissingRepository(&'static str),
    #[error("missing or invalid sender payload")]
    MissingSender,
    #[error("unsupported action: {0}")]
    UnsupportedAction(String),
}

/// Parses a raw `issues` webhook payload into a [`GitHubIssueEvent`].
///
/// Defensive by design: every field is extracted with a fallback path, and
/// an unrecognized action (e.g. `closed`, `reopened`) is reported as a
/// typed error rather than panicking, so the HTTP layer can 200 it away
/// without bringing down the server.
pub fn parse_issue_event(payload: &Value) -> Result<GitHubIssueEvent, WebhookParseError> {
    let action_raw = payload.get("action").and_then(Value::as_str).ok_or(WebhookParseError::MissingAction)?;
    let action = IssueAction::parse(action_raw)
        .ok_or_else(|| WebhookParseError::UnsupportedAction(action_raw.to_string()))?;

    let issue = payload.get("issue").ok_or(WebhookParseError::MissingIssue("issue"))?;
    let issue_number = issue.get("number").and_then(Value::as_u64).ok_or(WebhookParseError::MissingIssue("number"))?;
    let title =
        issue.get("title").and_then(Value::as_str).ok_or(WebhookParseError::MissingIssue("title"))?.trim().to_string();
    let body = issue.get("body").and_then(Value::as_str).unwrap_or("").to_string();
    let labels = extract_labels(issue);

    let repo = payload.get("repository").ok_or(WebhookParseError::MissingRepository("repository"))?;
    let repository = repo
        .get("name")
        .and_then(Value::as_str)
        .ok_or(WebhookParseError::MissingRepository("name"))?
        .trim()
        .to_string();
    let owner = repo
        .get("owner")
        .and_then(|o| o.get("login").and_then(Value::as_str))
        .ok_or(WebhookParseError::MissingRepository("owner.login"))?
        .trim()
        .to_string();

    let author = extract_user_login(payload).ok_or(WebhookParseError::MissingSender)?;

    Ok(GitHubIssueEvent { action, issue_number, title, body, labels, repository, owner, author })
}

fn extract_labels(issue: &Value) -> Vec<String> {
    issue
        .get("labels")
        .and_then(Value::as_array)
        .map(|labels| {
            labels
                .iter()
                .filter_map(|label| {
                    if let Some(name) = label.as_str() {
                        Some(name.trim().to_string())
                    } else {
                        label.get("name").and_then(Value::as_str).map(|s| s.trim().to_string())
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}

fn extract_user_login(payload: &Value) -> Option<String> {
    payload
        .get("sender")
        .and_then(|s| s.get("login"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            payload
                .get("issue")
                .and_then(|i| i.get("user"))
                .and_then(|u| u.get("login"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
}
