//! Orchestration loop: drives a single issue through classification,
//! optional clarification, workspace provisioning, CLI execution, and PR
//! creation.
//!
//! Every stage transitions the state machine first and emits a
//! `state_transition` event; a failure at any stage transitions to
//! [`PipelineStage::Failed`] and emits an `error` event instead of
//! propagating, since nothing upstream of `process_issue` is waiting on a
//! `Result`.

use std::sync::Arc;
use std::time::Instant;

use coordination::events::{PipelineEvent, SharedEventEmitter};
use coordination::state::PipelineStage;

use crate::classification::IssueClassification;
use crate::classifier::IssueClassifier;
use crate::clarification::ClarificationManager;
use crate::context_builder::{ContextBuilder, KnowledgeProvider};
use crate::github_client::GitHubClient;
use crate::pr_creator::PrCreator;
use crate::provisioner::{IssueDetails, ProvisionedWorkspace, WorkspaceProvisioner};
use crate::runner::CliRunner;
use crate::state_machine::PipelineStateMachine;
use crate::webhook::GitHubIssueEvent;

pub struct PipelineOrchestrator {
    state_machine: Arc<PipelineStateMachine>,
    classifier: Arc<IssueClassifier>,
    clarification_manager: Arc<ClarificationManager>,
    provisioner: Arc<WorkspaceProvisioner>,
    cli_runner: Arc<CliRunner>,
    pr_creator: Arc<PrCreator>,
    github_client: Arc<GitHubClient>,
    event_emitter: SharedEventEmitter,
    knowledge_provider: Option<Arc<dyn KnowledgeProvider>>,
}

impl PipelineOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state_machine: Arc<PipelineStateMachine>,
        classifier: Arc<IssueClassifier>,
        clarification_manager: Arc<ClarificationManager>,
        provisioner: Arc<WorkspaceProvisioner>,
        cli_runner: Arc<CliRunner>,
        pr_creator: Arc<PrCreator>,
        github_client: Arc<GitHubClient>,
        event_emitter: SharedEventEmitter,
        knowledge_provider: Option<Arc<dyn KnowledgeProvider>>,
    ) -> Self {
        Self {
            state_machine,
            classifier,
            clarification_manager,
            provisioner,
            cli_runner,
            pr_creator,
            github_client,
            event_emitter,
            knowledge_provider,
        }
    }

    /// Probes every external dependency the pipeline actually needs to make
    /// progress: the state store, GitHub, and the classifier's LLM endpoint.
    /// Ready only if all three respond.
    pub async fn readiness_check(&self) -> bool {
        let state_ok = self.state_machine.health_check().await;
        let github_ok = self.github_client.health_check().await;
        let classifier_ok = self.classifier.health_check().await;
        state_ok && github_ok && classifier_ok
    }

    pub async fn process_issue(&self, event: GitHubIssueEvent) {
        let issue_id = event.issue_id();
        let repository = event.full_repository();
        let started_at = Instant::now();

        tracing::info!(issue_id = %issue_id, action = ?event.action, "starting pipeline for issue");

        if self.create_pipeline_state(&issue_id, &repository).await.is_none() {
            return;
        }

        self.run_intake(&event, started_at).await;
    }

    async fn create_pipeline_state(&self, issue_id: &str, repository: &str) -> Option<()> {
        match self.state_machine.create(issue_id, repository).await {
            Ok(_) => {
                self.emit_transition(issue_id, repository, "created", PipelineStage::Pending.as_str()).await;
                Some(())
            }
            Err(e) => {
                tracing::error!(issue_id, error = %e, "failed to create pipeline state");
                self.emit_error(issue_id, repository, "state_creation", &e.to_string()).await;
                None
            }
        }
    }

    async fn run_intake(&self, event: &GitHubIssueEvent, started_at: Instant) {
        let issue_id = event.issue_id();
        let repository = event.full_repository();

        if self.transition(&issue_id, &repository, PipelineStage::Intake).await.is_err() {
            return;
        }

        let classification = self.classifier.classify(&event.title, &event.body, &event.labels).await;
        tracing::info!(
            issue_id = %issue_id,
            issue_type = %classification.issue_type,
            completeness = classification.completeness_score,
            "issue classified"
        );

        if let Ok(value) = serde_json::to_value(classification.clone()) {
            if let Err(e) = self.state_machine.set_classification(&issue_id, value).await {
                tracing::warn!(issue_id = %issue_id, error = %e, "failed to persist classification");
            }
        }

        if classification.needs_clarification() {
            self.handle_clarification(event, &classification).await;
            return;
        }

        // Issue may have previously scored below the clarification threshold
        // and carry the label; clear it now that it's actionable. A failure
        // here is logged, not fatal — it shouldn't block provisioning.
        if let Err(e) = self
            .clarification_manager
            .update_clarification_state(&event.owner, &event.repository, event.issue_number, &classification, false)
            .await
        {
            tracing::warn!(issue_id = %issue_id, error = %e, "failed to clear clarification label");
        }

        self.run_provisioning(event, &classification, started_at).await;
    }

    async fn handle_clarification(&self, event: &GitHubIssueEvent, classification: &IssueClassification) {
        let issue_id = event.issue_id();
        let repository = event.full_repository();

        if self.transition(&issue_id, &repository, PipelineStage::Clarification).await.is_err() {
            return;
        }

        match self
            .clarification_manager
            .update_clarification_state(&event.owner, &event.repository, event.issue_number, classification, true)
            .await
        {
            Ok(()) => tracing::info!(issue_id = %issue_id, "issue sent to clarification"),
            Err(e) => self.fail(&issue_id, &repository, "clarification", &e.to_string()).await,
        }
    }

    async fn run_provisioning(&self, event: &GitHubIssueEvent, classification: &IssueClassification, started_at: Instant) {
        let issue_id = event.issue_id();
        let repository = event.full_repository();

        if self.transition(&issue_id, &repository, PipelineStage::Provisioning).await.is_err() {
            return;
        }

        let issue_details = IssueDetails {
            owner: event.owner.clone(),
            repository: event.repository.clone(),
            title: event.title.clone(),
            body: event.body.clone(),
            labels: event.labels.clone(),
        };

        let workspace = match self.provisioner.provision(&issue_id, classification, &issue_details).await {
            Ok(workspace) => workspace,
            Err(e) => {
                self.fail(&issue_id, &repository, "provisioning", &e.to_string()).await;
                return;
            }
        };

        let context_builder = ContextBuilder::new(self.knowledge_provider.as_deref());
        if let Err(e) = context_builder.generate_workspace_files(&workspace.path, &issue_details, classification).await
        {
            self.fail(&issue_id, &repository, "provisioning", &e.to_string()).await;
            return;
        }

        if let Err(e) = self.state_machine.set_workspace_path(&issue_id, workspace.path.display().to_string()).await {
            tracing::warn!(issue_id = %issue_id, error = %e, "failed to persist workspace path");
        }

        tracing::info!(issue_id = %issue_id, workspace = %workspace.path.display(), "workspace provisioned");

        self.run_implementation(event, classification, &workspace, started_at).await;
    }

    async fn run_implementation(
        &self,
        event: &GitHubIssueEvent,
        classification: &IssueClassification,
        workspace: &ProvisionedWorkspace,
        started_at: Instant,
    ) {
        let issue_id = event.issue_id();
        let repository = event.full_repository();

        if self.transition(&issue_id, &repository, PipelineStage::Implementation).await.is_err() {
            return;
        }

        let task_file = workspace.path.join("task.md");
        let run_result = self.cli_runner.run(&workspace.path, &task_file, None).await;

        if !run_result.success {
            let stderr_excerpt: String = run_result.stderr.chars().take(500).collect();
            let message = format!("CLI exited with code {}: {stderr_excerpt}", run_result.exit_code);
            self.fail(&issue_id, &repository, "implementation", &message).await;
            return;
        }

        tracing::info!(issue_id = %issue_id, duration = run_result.duration_seconds, "CLI run completed");

        self.run_pr_creation(event, classification, &run_result, started_at).await;
    }

    async fn run_pr_creation(
        &self,
        event: &GitHubIssueEvent,
        classification: &IssueClassification,
        run_result: &crate::runner::RunResult,
        started_at: Instant,
    ) {
        let issue_id = event.issue_id();
        let repository = event.full_repository();

        if self.transition(&issue_id, &repository, PipelineStage::PrCreation).await.is_err() {
            return;
        }

        let head_branch = format!("archon/{}/{}/{}", event.owner, event.repository, event.issue_number);

        let outcome = match self
            .pr_creator
            .create_pr_for_issue(
                &event.owner,
                &event.repository,
                event.issue_number,
                &event.title,
                &head_branch,
                run_result,
                classification,
            )
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                self.fail(&issue_id, &repository, "pr_creation", &e.to_string()).await;
                return;
            }
        };

        if let Err(e) = self.state_machine.set_pr_number(&issue_id, outcome.pr_number as i64).await {
            tracing::warn!(issue_id = %issue_id, error = %e, "failed to persist PR number");
        }

        if self.transition(&issue_id, &repository, PipelineStage::Completed).await.is_err() {
            return;
        }

        let duration_seconds = started_at.elapsed().as_secs_f64();
        self.emit_completion(&issue_id, &repository, outcome.pr_number as i64, &outcome.pr_url, duration_seconds).await;
        tracing::info!(issue_id = %issue_id, pr_number = outcome.pr_number, "pipeline completed");
    }

    async fn transition(&self, issue_id: &str, repository: &str, to_stage: PipelineStage) -> Result<(), ()> {
        match self.state_machine.transition(issue_id, to_stage, Default::default()).await {
            Ok(state) => {
                let from_stage =
                    state.state_history.last().map(|t| t.from_stage.as_str()).unwrap_or("unknown");
                self.emit_transition(issue_id, repository, from_stage, to_stage.as_str()).await;
                Ok(())
            }
            Err(e) => {
                self.fail(issue_id, repository, "state_transition", &e.to_string()).await;
                Err(())
            }
        }
    }

    async fn fail(&self, issue_id: &str, repository: &str, stage: &str, error_message: &str) {
        let message = format!("{stage}: {error_message}");
        tracing::error!(issue_id, stage, error = %message, "pipeline stage failed");

        let mut details = std::collections::HashMap::new();
        details.insert("error".to_string(), serde_json::json!(message));
        if let Err(e) = self.state_machine.transition(issue_id, PipelineStage::Failed, details).await {
            tracing::error!(issue_id, error = %e, "failed to transition to failed state");
        }

        self.emit_error(issue_id, repository, stage, error_message).await;
    }

    async fn emit_transition(&self, issue_id: &str, repository: &str, from_stage: &str, to_stage: &str) {
        self.event_emitter.emit(&PipelineEvent::state_transition(issue_id, repository, from_stage, to_stage)).await;
    }

    async fn emit_error(&self, issue_id: &str, repository: &str, stage: &str, error_message: &str) {
        self.event_emitter.emit(&PipelineEvent::error(issue_id, repository, stage, error_message)).await;
    }

    async fn emit_completion(
        &self,
        issue_id: &str,
        repository: &str,
        pr_number: i64,
        pr_url: &str,
        duration_seconds: f64,
    ) {
        let mut event = PipelineEvent::completion(issue_id, repository, pr_number, duration_seconds);
        event.details.insert("pr_url".to_string(), serde_json::json!(pr_url));
        self.event_emitter.emit(&event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use coordination::events::NullEventEmitter;
    use coordination::state::{PipelineState, StateRepository, StoreError, StoreResult};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeRepository(Mutex<HashMap<String, PipelineState>>);

    impl FakeRepository {
        fn new() -> Self {
            Self(Mutex::new(HashMap::new()))
        }
    }

    #[async_trait]
    impl StateRepository for FakeRepository {
        async fn save(&self, state: &PipelineState) -> StoreResult<()> {
            let mut store = self.0.lock().unwrap();
            if store.contains_key(&state.issue_id) {
                return Err(StoreError::AlreadyExists(state.issue_id.clone()));
            }
            store.insert(state.issue_id.clone(), state.clone());
            Ok(())
        }

        async fn get(&self, issue_id: &str) -> StoreResult<Option<PipelineState>> {
            Ok(self.0.lock().unwrap().get(issue_id).cloned())
        }

        async fn list_by_stage(&self, stage: PipelineStage) -> StoreResult<Vec<PipelineState>> {
            Ok(self.0.lock().unwrap().values().filter(|s| s.current_stage == stage).cloned().collect())
        }

        async fn update_with_version(&self, state: &PipelineState) -> StoreResult<bool> {
            let mut store = self.0.lock().unwrap();
            match store.get(&state.issue_id) {
                Some(existing) if existing.version == state.version - 1 => {
                    store.insert(state.issue_id.clone(), state.clone());
                    Ok(true)
                }
                Some(_) => Ok(false),
                None => Ok(false),
            }
        }

        async fn delete(&self, issue_id: &str) -> StoreResult<bool> {
            Ok(self.0.lock().unwrap().remove(issue_id).is_some())
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    fn sample_event() -> GitHubIssueEvent {
        GitHubIssueEvent {
            action: crate::webhook::IssueAction::Opened,
            issue_number: 7,
            title: "Widgets crash on empty input".to_string(),
            body: "stack trace".to_string(),
            labels: vec![],
            repository: "widgets".to_string(),
            owner: "acme".to_string(),
            author: "someone".to_string(),
        }
    }

    #[tokio::test]
    async fn creating_state_twice_for_the_same_issue_does_not_panic() {
        let repository: Arc<dyn StateRepository> = Arc::new(FakeRepository::new());
        let state_machine = Arc::new(PipelineStateMachine::new(repository));
        let event = sample_event();

        state_machine.create(&event.issue_id(), &event.full_repository()).await.unwrap();
        let second = state_machine.create(&event.issue_id(), &event.full_repository()).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn null_emitter_accepts_every_event_type_without_erroring() {
        let emitter = NullEventEmitter;
        emitter.emit(&PipelineEvent::error("x", "y", "stage", "boom")).await;
        emitter.emit(&PipelineEvent::completion("x", "y", 1, 0.0)).await;
    }
}
