//! Process entry point: parses CLI arguments, loads configuration, wires
//! every pipeline dependency together, and serves the HTTP surface.

use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use coordination::events::{CompositeEventEmitter, EventEmitter, LoggingEventEmitter, MetricsEventEmitter};
use coordination::state::PostgresStateRepository;
use issue_pipeline::classifier::IssueClassifier;
use issue_pipeline::clarification::ClarificationManager;
use issue_pipeline::config::PipelineSettings;
use issue_pipeline::github_client::{GitHubClient, GitHubClientConfig};
use issue_pipeline::orchestrator::PipelineOrchestrator;
use issue_pipeline::pr_creator::PrCreator;
use issue_pipeline::provisioner::{WorkspaceConfig, WorkspaceProvisioner};
use issue_pipeline::runner::CliRunner;
use issue_pipeline::server::{build_router, AppState};
use issue_pipeline::state_machine::PipelineStateMachine;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP server and begin accepting webhook deliveries.
    Run {
        /// Override PIPELINE_HOST.
        #[arg(long)]
        host: Option<String>,
        /// Override PIPELINE_PORT.
        #[arg(long)]
        port: Option<u16>,
        /// Override the tracing output format (defaults to plain text).
        #[arg(long, value_enum)]
        log_format: Option<LogFormat>,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let Command::Run { host, port, log_format } = cli.command;

    init_tracing(log_format.unwrap_or(LogFormat::Text));

    let mut settings = PipelineSettings::load().map_err(|e| anyhow::anyhow!("{e}"))?;
    if let Some(host) = host {
        settings.host = host;
    }
    if let Some(port) = port {
        settings.port = port;
    }
    log_configuration(&settings);

    let state_repository = PostgresStateRepository::connect(
        &settings.database_url,
        settings.database_min_pool_size,
        settings.database_max_pool_size,
    )
    .await
    .map_err(|e| anyhow::anyhow!("failed to connect to database: {e}"))?;
    state_repository.migrate().await.map_err(|e| anyhow::anyhow!("failed to migrate database: {e}"))?;
    let state_machine = Arc::new(PipelineStateMachine::new(Arc::new(state_repository)));

    let github_client = Arc::new(GitHubClient::with_config(
        settings.github_token.clone(),
        GitHubClientConfig {
            base_url: settings.github_base_url.clone(),
            max_retries: settings.github_max_retries,
            base_delay_seconds: settings.github_base_delay_seconds,
            max_delay_seconds: settings.github_max_delay_seconds,
            timeout_seconds: settings.github_request_timeout_seconds,
        },
    ));

    let classifier = Arc::new(IssueClassifier::new(settings.llm_url.clone(), settings.llm_model.clone()));
    let clarification_manager = Arc::new(ClarificationManager::new(Arc::clone(&github_client)));
    let provisioner = Arc::new(WorkspaceProvisioner::new(WorkspaceConfig::new(
        &settings.workspace_base_path,
        settings.workspace_retention_days,
    )));
    let cli_runner = Arc::new(CliRunner::new(settings.runner_cli_path.clone(), settings.runner_timeout_seconds));
    let pr_creator = Arc::new(PrCreator::new(Arc::clone(&github_client)));

    let metrics_emitter = Arc::new(MetricsEventEmitter::new());
    let event_emitter: Arc<dyn EventEmitter> = Arc::new(CompositeEventEmitter::new(vec![
        Arc::new(LoggingEventEmitter::new()) as Arc<dyn EventEmitter>,
        Arc::clone(&metrics_emitter) as Arc<dyn EventEmitter>,
    ]));

    let orchestrator = Arc::new(PipelineOrchestrator::new(
        state_machine,
        classifier,
        clarification_manager,
        provisioner,
        cli_runner,
        pr_creator,
        github_client,
        event_emitter,
        None,
    ));

    let app_state = Arc::new(AppState { orchestrator, metrics: metrics_emitter });
    let router = build_router(app_state);

    let address = format!("{}:{}", settings.host, settings.port);
    tracing::info!(address = %address, "starting issue pipeline server");
    let listener = tokio::net::TcpListener::bind(&address).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(env_filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(env_filter).init(),
    }
}

fn log_configuration(settings: &PipelineSettings) {
    for (key, value) in settings.redacted_summary() {
        tracing::info!(key, value = %value, "loaded configuration");
    }
}
