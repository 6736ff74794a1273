//! LLM-based issue classifier: a single non-streaming chat completion
//! against an OpenAI-compatible endpoint, parsed into a structured verdict.
//!
//! Classification never fails outward — any network, parse, or validation
//! error collapses into [`IssueClassification::create_unknown`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::classification::{IssueClassification, IssueType};

const SYSTEM_PROMPT: &str = r#"You are an issue classification assistant for an automated development pipeline. Given a GitHub issue's title, body, and labels, analyze it and respond with ONLY a JSON object (no prose, no markdown fences) matching this exact shape:

{
  "issue_type": "feature" | "bug" | "documentation" | "infrastructure" | "unknown",
  "requirements": [string, ...],
  "affected_packages": [string, ...],
  "completeness_score": integer from 1 to 5,
  "clarification_questions": [string, ...],
  "confidence": number from 0.0 to 1.0,
  "reasoning": string
}

Scoring guide for completeness_score:
1 = no actionable detail at all
2 = a vague idea, missing most specifics
3 = specific enough to attempt, some ambiguity remains
4 = clear and actionable, minor gaps
5 = fully specified, nothing left to clarify

When completeness_score is below 3, clarification_questions must contain at least one concrete question that would raise the score. requirements should be the distinct, individually actionable statements extracted from the issue. affected_packages should name the repositories or package directories the issue is likely to touch, if determinable."#;

const DEFAULT_TEMPERATURE: f64 = 0.1;
const DEFAULT_TIMEOUT_SECONDS: f64 = 30.0;

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Classifies issues via a single chat-completion call to an
/// OpenAI-compatible LLM endpoint.
pub struct IssueClassifier {
    client: reqwest::Client,
    llm_url: String,
    model_name: String,
    temperature: f64,
    timeout_seconds: f64,
}

impl IssueClassifier {
    pub fn new(llm_url: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            llm_url: llm_url.into(),
            model_name: model_name.into(),
            temperature: DEFAULT_TEMPERATURE,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout_seconds(mut self, timeout_seconds: f64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Classify an issue. Never returns an error: any failure collapses
    /// into a degraded [`IssueClassification`] carrying the failure reason.
    pub async fn classify(&self, title: &str, body: &str, labels: &[String]) -> IssueClassification {
        match self.perform_classification(title, body, labels).await {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!(error = %e, "classification failed, falling back to unknown");
                IssueClassification::create_unknown(format!("Classification failed: {e}"))
            }
        }
    }

    async fn perform_classification(
        &self,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<IssueClassification, ClassifierError> {
        let prompt = build_classification_prompt(title, body, labels);

        let request = ChatCompletionRequest {
            model: self.model_name.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage { role: "user", content: prompt },
            ],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.llm_url.trim_end_matches('/')))
            .json(&request)
            .timeout(std::time::Duration::from_secs_f64(self.timeout_seconds))
            .send()
            .await
            .map_err(ClassifierError::Request)?
            .error_for_status()
            .map_err(ClassifierError::Request)?
            .json::<ChatCompletionResponse>()
            .await
            .map_err(ClassifierError::Request)?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(ClassifierError::EmptyResponse)?;

        let parsed = parse_llm_response(&content)?;
        Ok(validate_and_normalize(parsed))
    }

    /// Cheap liveness probe: a trivial single-message completion.
    pub async fn health_check(&self) -> bool {
        let request = ChatCompletionRequest {
            model: self.model_name.clone(),
            messages: vec![ChatMessage { role: "user", content: "Hello".to_string() }],
            temperature: self.temperature,
        };

        self.client
            .post(format!("{}/chat/completions", self.llm_url.trim_end_matches('/')))
            .json(&request)
            .timeout(std::time::Duration::from_secs_f64(self.timeout_seconds))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .is_ok()
    }
}

#[derive(Debug, thiserror::Error)]
enum ClassifierError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("LLM returned an empty response")]
    EmptyResponse,
    #[error("failed to parse LLM response as JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

fn build_classification_prompt(title: &str, body: &str, labels: &[String]) -> String {
    let labels_str = if labels.is_empty() { "none".to_string() } else { labels.join(", ") };
    let body_str = if body.trim().is_empty() { "(no description provided)" } else { body };
    format!("Title: {title}\nLabels: {labels_str}\n\nBody:\n{body_str}")
}

/// Strips fenced-code-block wrappers (with or without a `json` tag) before
/// decoding, since LLMs reliably wrap "JSON only" responses in them anyway.
fn parse_llm_response(raw: &str) -> Result<Value, ClassifierError> {
    let trimmed = raw.trim();
    let stripped = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed)
        .trim();
    let stripped = stripped.strip_suffix("```").unwrap_or(stripped).trim();
    Ok(serde_json::from_str(stripped)?)
}

/// Normalizes an untrusted LLM JSON payload into a valid classification.
/// Total: no input produces a panic or an error.
fn validate_and_normalize(raw: Value) -> IssueClassification {
    let issue_type = raw
        .get("issue_type")
        .and_then(|v| v.as_str())
        .and_then(IssueType::from_str)
        .unwrap_or(IssueType::Unknown);

    let completeness_score = raw
        .get("completeness_score")
        .and_then(coerce_i64)
        .map(|n| n.clamp(1, 5) as i32)
        .unwrap_or(1);

    let requirements = coerce_string_list(raw.get("requirements"));
    let affected_packages = coerce_string_list(raw.get("affected_packages"));
    let mut clarification_questions = coerce_string_list(raw.get("clarification_questions"));

    let confidence = raw.get("confidence").and_then(|v| v.as_f64()).map(|c| c.clamp(0.0, 1.0));
    let reasoning = raw.get("reasoning").and_then(|v| v.as_str()).map(|s| s.to_string());

    if completeness_score < 3 && clarification_questions.is_empty() {
        clarification_questions = vec![
            "Could you provide more details about the expected behavior?".to_string(),
            "What specific changes or features are you requesting?".to_string(),
        ];
    }

    IssueClassification {
        issue_type,
        requirements,
        affected_packages,
        completeness_score,
        clarification_questions,
        confidence,
        reasoning,
    }
}

fn coerce_i64(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    if let Some(f) = value.as_f64() {
        return Some(f as i64);
    }
    value.as_str().and_then(|s| s.parse().ok())
}

fn coerce_string_list(value: Option<&Value>) -> Vec<String> {
    match value.and_then(|v| v.as_array()) {
        Some(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::to_string)
            .filter(|s| !s.is_empty())
            .collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fenced_code_block() {
        let raw = "```json\n{\"issue_type\": \"bug\"}\n```";
        let value = parse_llm_response(raw).unwrap();
        assert_eq!(value["issue_type"], "bug");
    }

    #[test]
    fn strips_bare_fenced_code_block() {
        let raw = "```\n{\"issue_type\": \"bug\"}\n```";
        let value = parse_llm_response(raw).unwrap();
        assert_eq!(value["issue_type"], "bug");
    }

    #[test]
    fn unknown_issue_type_falls_back_to_unknown() {
        let raw = serde_json::json!({"issue_type": "not-a-real-type", "completeness_score": 4});
        let verdict = validate_and_normalize(raw);
        assert_eq!(verdict.issue_type, IssueType::Unknown);
    }

    #[test]
    fn completeness_score_is_clamped() {
        let raw = serde_json::json!({"issue_type": "bug", "completeness_score": 99});
        let verdict = validate_and_normalize(raw);
        assert_eq!(verdict.completeness_score, 5);

        let raw = serde_json::json!({"issue_type": "bug", "completeness_score": -3});
        let verdict = validate_and_normalize(raw);
        assert_eq!(verdict.completeness_score, 1);
    }

    #[test]
    fn low_completeness_with_no_questions_gets_fallback_questions() {
        let raw = serde_json::json!({"issue_type": "bug", "completeness_score": 2});
        let verdict = validate_and_normalize(raw);
        assert_eq!(verdict.clarification_questions.len(), 2);
    }

    #[test]
    fn non_list_requirements_coerce_to_empty() {
        let raw = serde_json::json!({"issue_type": "bug", "completeness_score": 4, "requirements": "not a list"});
        let verdict = validate_and_normalize(raw);
        assert!(verdict.requirements.is_empty());
    }

    #[test]
    fn confidence_out_of_range_is_clamped() {
        let raw = serde_json::json!({"issue_type": "bug", "completeness_score": 4, "confidence": 2.5});
        let verdict = validate_and_normalize(raw);
        assert_eq!(verdict.confidence, Some(1.0));
    }

    #[test]
    fn empty_labels_render_as_none() {
        let prompt = build_classification_prompt("t", "b", &[]);
        assert!(prompt.contains("Labels: none"));
    }
}
