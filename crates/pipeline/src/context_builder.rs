//! Renders the `context.md` and `task.md` files dropped into a provisioned
//! workspace before the CLI run: everything the autonomous implementation
//! step needs to know about the issue, its classification, and (optionally)
//! any retrieved knowledge-base context.

use std::path::Path;

use async_trait::async_trait;

use crate::classification::{IssueClassification, IssueType};
use crate::provisioner::IssueDetails;

/// Looks up supporting context for an issue. A knowledge base is an
/// optional ambient integration: any failure or absence must degrade to an
/// empty string rather than fail the pipeline.
#[async_trait]
pub trait KnowledgeProvider: Send + Sync {
    async fn search(&self, query: &str) -> String;
}

pub struct NoKnowledgeProvider;

#[async_trait]
impl KnowledgeProvider for NoKnowledgeProvider {
    async fn search(&self, _query: &str) -> String {
        String::new()
    }
}

pub struct ContextBuilder<'a> {
    knowledge_provider: Option<&'a (dyn KnowledgeProvider)>,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(knowledge_provider: Option<&'a dyn KnowledgeProvider>) -> Self {
        Self { knowledge_provider }
    }

    /// Writes `context.md` and `task.md` into `workspace_path`, returning
    /// their paths. Knowledge retrieval failures are swallowed; nothing
    /// here should be able to fail the run because a search backend is down.
    pub async fn generate_workspace_files(
        &self,
        workspace_path: &Path,
        issue_details: &IssueDetails,
        classification: &IssueClassification,
    ) -> std::io::Result<(std::path::PathBuf, std::path::PathBuf)> {
        let knowledge = self.retrieve_knowledge_context(issue_details, classification).await;

        let context_path = workspace_path.join("context.md");
        let context_markdown = build_context_markdown(issue_details, classification, &knowledge);
        tokio::fs::write(&context_path, context_markdown).await?;

        let task_path = workspace_path.join("task.md");
        let task_markdown = build_task_markdown(issue_details, classification);
        tokio::fs::write(&task_path, task_markdown).await?;

        Ok((context_path, task_path))
    }

    async fn retrieve_knowledge_context(
        &self,
        issue_details: &IssueDetails,
        classification: &IssueClassification,
    ) -> String {
        let Some(provider) = self.knowledge_provider else {
            return String::new();
        };
        let query = build_search_query(issue_details, classification);
        if query.trim().is_empty() {
            return String::new();
        }
        provider.search(&query).await
    }
}

fn build_search_query(issue_details: &IssueDetails, classification: &IssueClassification) -> String {
    let mut parts = vec![issue_details.title.clone()];
    parts.extend(classification.requirements.iter().cloned());
    parts.join(" ")
}

fn build_context_markdown(
    issue_details: &IssueDetails,
    classification: &IssueClassification,
    knowledge: &str,
) -> String {
    let mut sections = vec![
        format!("# Context: {}", issue_details.title),
        format_issue_section(issue_details),
        format_classification_section(classification),
    ];

    if let Some(knowledge_section) = format_knowledge_section(knowledge) {
        sections.push(knowledge_section);
    }

    sections.join("\n\n") + "\n"
}

fn format_issue_section(issue_details: &IssueDetails) -> String {
    let labels = if issue_details.labels.is_empty() {
        "_none_".to_string()
    } else {
        issue_details.labels.join(", ")
    };
    format!(
        "## Issue Details\n\n**Repository:** {}/{}\n**Labels:** {}\n\n{}",
        issue_details.owner,
        issue_details.repository,
        labels,
        if issue_details.body.trim().is_empty() { "_No description provided._" } else { issue_details.body.trim() }
    )
}

fn format_classification_section(classification: &IssueClassification) -> String {
    let mut lines = vec![
        "## Classification".to_string(),
        format!("**Type:** {}", classification.issue_type),
        format!("**Completeness Score:** {}/5", classification.completeness_score),
    ];

    if !classification.affected_packages.is_empty() {
        lines.push(format!("**Affected Packages:** {}", classification.affected_packages.join(", ")));
    }
    if !classification.requirements.is_empty() {
        lines.push("**Requirements:**".to_string());
        for requirement in &classification.requirements {
            lines.push(format!("- {requirement}"));
        }
    }

    lines.join("\n")
}

fn format_knowledge_section(knowledge: &str) -> Option<String> {
    let trimmed = knowledge.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(format!("## Knowledge Context\n\n{trimmed}"))
}

fn build_task_markdown(issue_details: &IssueDetails, classification: &IssueClassification) -> String {
    let mut sections = vec![
        format!("# Task: {}", issue_details.title),
        format!("**Type:** {}", classification.issue_type),
        format!("## Objective\n\n{}", build_objective(issue_details)),
    ];

    if !classification.requirements.is_empty() {
        let requirements = classification
            .requirements
            .iter()
            .enumerate()
            .map(|(i, r)| format!("{}. {r}", i + 1))
            .collect::<Vec<_>>()
            .join("\n");
        sections.push(format!("## Requirements\n\n{requirements}"));
    }

    if !classification.affected_packages.is_empty() {
        let packages = classification.affected_packages.iter().map(|p| format!("- {p}")).collect::<Vec<_>>().join("\n");
        sections.push(format!("## Affected Packages\n\n{packages}"));
    }

    sections.join("\n\n") + "\n"
}

fn build_objective(issue_details: &IssueDetails) -> String {
    let trimmed = issue_details.body.trim();
    if trimmed.is_empty() {
        issue_details.title.clone()
    } else {
        trimmed.to_string()
    }
}
