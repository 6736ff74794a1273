//! GitHub REST API client: retrying, rate-limit-aware, used by the
//! clarification manager and the PR creator.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::Rng;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;

const DEFAULT_BASE_URL: &str = "https://api.github.com";
const USER_AGENT: &str = "issue-pipeline/1.0";
const RETRYABLE_STATUS: [u16; 6] = [408, 429, 500, 502, 503, 504];

#[derive(Debug, thiserror::Error)]
pub enum GitHubClientError {
    #[error("GitHub API error {status} for {url}: {body}")]
    Api { status: u16, body: String, url: String },

    #[error("rate limited until {reset_at_unix}s (retry after {retry_after_seconds:.1}s)")]
    RateLimit { reset_at_unix: Option<i64>, retry_after_seconds: f64 },

    #[error("request to {0} failed after retries: {1}")]
    Request(String, String),
}

#[derive(Debug, Clone)]
pub struct GitHubClientConfig {
    pub base_url: String,
    pub max_retries: u32,
    pub base_delay_seconds: f64,
    pub max_delay_seconds: f64,
    pub timeout_seconds: f64,
}

impl Default for GitHubClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            max_retries: 3,
            base_delay_seconds: 1.0,
            max_delay_seconds: 60.0,
            timeout_seconds: 30.0,
        }
    }
}

pub struct GitHubClient {
    client: reqwest::Client,
    token: String,
    config: GitHubClientConfig,
}

#[derive(Debug, Clone, Default)]
pub struct PrCreateRequest {
    pub title: String,
    pub body: String,
    pub head_branch: String,
    pub base_branch: String,
    pub labels: Vec<String>,
    pub reviewers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrCreateResult {
    pub pr_number: u64,
    pub pr_url: String,
}

impl PrCreateResult {
    fn from_github_response(value: &serde_json::Value) -> Option<Self> {
        Some(Self {
            pr_number: value.get("number")?.as_u64()?,
            pr_url: value.get("html_url")?.as_str()?.to_string(),
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
}

impl GitHubClient {
    pub fn new(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self::with_config(token, GitHubClientConfig { base_url: base_url.into(), ..Default::default() })
    }

    pub fn with_config(token: impl Into<String>, config: GitHubClientConfig) -> Self {
        Self { client: reqwest::Client::new(), token: token.into(), config }
    }

    pub async fn create_comment(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        body: &str,
    ) -> Result<(), GitHubClientError> {
        let path = format!("/repos/{owner}/{repo}/issues/{issue_number}/comments");
        self.request(Method::POST, &path, Some(json!({ "body": body }))).await?;
        Ok(())
    }

    pub async fn add_label(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        label: &str,
    ) -> Result<Vec<String>, GitHubClientError> {
        let path = format!("/repos/{owner}/{repo}/issues/{issue_number}/labels");
        let response = self.request(Method::POST, &path, Some(json!({ "labels": [label] }))).await?;
        let labels = response
            .as_array()
            .map(|items| items.iter().filter_map(|v| v.get("name")?.as_str()).map(str::to_string).collect())
            .unwrap_or_default();
        Ok(labels)
    }

    /// Idempotent: a 404 (label already absent) is treated as success.
    pub async fn remove_label(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        label: &str,
    ) -> Result<(), GitHubClientError> {
        let encoded = urlencoding::encode(label);
        let path = format!("/repos/{owner}/{repo}/issues/{issue_number}/labels/{encoded}");
        match self.request(Method::DELETE, &path, None).await {
            Ok(_) => Ok(()),
            Err(GitHubClientError::Api { status, .. }) if status == 404 => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub async fn create_pr(
        &self,
        owner: &str,
        repo: &str,
        request: &PrCreateRequest,
    ) -> Result<PrCreateResult, GitHubClientError> {
        let path = format!("/repos/{owner}/{repo}/pulls");
        let body = json!({
            "title": request.title,
            "body": request.body,
            "head": request.head_branch,
            "base": request.base_branch,
        });
        let response = self.request(Method::POST, &path, Some(body)).await?;
        let result = PrCreateResult::from_github_response(&response).ok_or_else(|| {
            GitHubClientError::Request(path.clone(), "malformed pull request response".to_string())
        })?;

        if !request.labels.is_empty() {
            let label_path = format!("/repos/{owner}/{repo}/issues/{}/labels", result.pr_number);
            self.request(Method::POST, &label_path, Some(json!({ "labels": request.labels }))).await?;
        }
        if !request.reviewers.is_empty() {
            self.request_reviewers(owner, repo, result.pr_number, &request.reviewers).await?;
        }

        Ok(result)
    }

    pub async fn request_reviewers(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        reviewers: &[String],
    ) -> Result<(), GitHubClientError> {
        let path = format!("/repos/{owner}/{repo}/pulls/{pr_number}/requested_reviewers");
        self.request(Method::POST, &path, Some(json!({ "reviewers": reviewers }))).await?;
        Ok(())
    }

    pub async fn get_issue(&self, owner: &str, repo: &str, issue_number: u64) -> Result<Issue, GitHubClientError> {
        let path = format!("/repos/{owner}/{repo}/issues/{issue_number}");
        let response = self.request(Method::GET, &path, None).await?;
        serde_json::from_value(response)
            .map_err(|e| GitHubClientError::Request(path, format!("malformed issue response: {e}")))
    }

    pub async fn health_check(&self) -> bool {
        self.request(Method::GET, "/user", None).await.is_ok()
    }

    /// Core retry loop: retryable statuses and transport errors are
    /// retried with full-jitter exponential backoff; rate limits surface
    /// immediately as a typed error for the caller to act on; all other
    /// non-2xx responses raise immediately without further retries.
    async fn request(
        &self,
        method: Method,
        path: &str,
        json_body: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, GitHubClientError> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let mut last_error: Option<String> = None;

        for attempt in 0..=self.config.max_retries {
            let mut builder = self
                .client
                .request(method.clone(), &url)
                .header("Authorization", format!("Bearer {}", self.token))
                .header("Accept", "application/vnd.github+json")
                .header("X-GitHub-Api-Version", "2022-11-28")
                .header("User-Agent", USER_AGENT)
                .timeout(Duration::from_secs_f64(self.config.timeout_seconds));
            if let Some(ref body) = json_body {
                builder = builder.json(body);
            }

            let response = match builder.send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(e.to_string());
                    if attempt < self.config.max_retries {
                        tokio::time::sleep(self.backoff_delay(attempt)).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();

            if status == StatusCode::FORBIDDEN && remaining_is_zero(&response) {
                return Err(self.handle_rate_limit(&response));
            }
            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(self.handle_rate_limit(&response));
            }

            if RETRYABLE_STATUS.contains(&status.as_u16()) && attempt < self.config.max_retries {
                tokio::time::sleep(self.backoff_delay(attempt)).await;
                continue;
            }

            if status.is_client_error() || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                return Err(GitHubClientError::Api { status: status.as_u16(), body, url });
            }

            return response
                .json()
                .await
                .or(Ok(serde_json::Value::Null))
                .map_err(|e: reqwest::Error| GitHubClientError::Request(url.clone(), e.to_string()));
        }

        Err(GitHubClientError::Request(url, last_error.unwrap_or_else(|| "exhausted retries".to_string())))
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self.config.base_delay_seconds * 2f64.powi(attempt as i32);
        let capped = exp.min(self.config.max_delay_seconds);
        let jittered = rand::thread_rng().gen_range(0.0..=capped.max(0.0));
        Duration::from_secs_f64(jittered)
    }

    fn handle_rate_limit(&self, response: &reqwest::Response) -> GitHubClientError {
        let headers = response.headers();
        let reset_at_unix = headers
            .get("x-ratelimit-reset")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<i64>().ok());

        let retry_after_header = headers
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<f64>().ok());

        let retry_after_seconds = retry_after_header.unwrap_or_else(|| {
            reset_at_unix
                .map(|reset| {
                    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64;
                    (reset - now).max(0) as f64
                })
                .unwrap_or(0.0)
        });

        GitHubClientError::RateLimit { reset_at_unix, retry_after_seconds }
    }
}

fn remaining_is_zero(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<i64>().ok())
        == Some(0)
}
