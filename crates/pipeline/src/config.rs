//! Process configuration: environment-driven, validated eagerly at startup.
//!
//! Every field is read from `PIPELINE_*` environment variables. Unlike a
//! single-error bail-out, [`PipelineSettings::load`] collects every
//! violation it finds before returning, so a misconfigured deployment sees
//! the whole list in one failed startup rather than one fix-and-retry cycle
//! per field.

use std::env;

const ENV_PREFIX: &str = "PIPELINE_";

#[derive(Debug, thiserror::Error)]
#[error("invalid configuration:\n{}", .0.join("\n"))]
pub struct ConfigError(pub Vec<String>);

/// Validated pipeline configuration, loaded once at process startup.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub github_webhook_secret: String,
    pub github_token: String,
    pub github_base_url: String,
    pub github_max_retries: u32,
    pub github_base_delay_seconds: f64,
    pub github_max_delay_seconds: f64,
    pub github_request_timeout_seconds: f64,

    pub workspace_base_path: String,
    pub workspace_retention_days: i64,

    pub runner_cli_path: String,
    pub runner_timeout_seconds: u64,

    pub llm_url: String,
    pub llm_model: String,

    pub database_url: String,
    pub database_min_pool_size: u32,
    pub database_max_pool_size: u32,

    pub knowledge_base_namespace: String,
    pub knowledge_base_name: String,

    pub host: String,
    pub port: u16,
}

impl PipelineSettings {
    /// Load and validate every field from the environment, collecting all
    /// violations rather than failing on the first.
    pub fn load() -> Result<Self, ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        let github_webhook_secret = required_string("GITHUB_WEBHOOK_SECRET", &mut errors);
        let github_token = required_string("GITHUB_TOKEN", &mut errors);
        let llm_url = required_string("LLM_URL", &mut errors);
        let database_url = required_string("DATABASE_URL", &mut errors);

        let github_base_url = optional_string("GITHUB_BASE_URL", "https://api.github.com");
        let workspace_base_path = optional_string("WORKSPACE_BASE_PATH", "/var/lib/pipeline/workspaces");
        let runner_cli_path = optional_string("RUNNER_CLI_PATH", "/usr/local/bin/agent-cli");
        let llm_model = optional_string("LLM_MODEL", "Qwen/Qwen2.5-Coder-14B-Instruct-GPTQ-Int4");
        let knowledge_base_namespace = optional_string("KNOWLEDGE_BASE_NAMESPACE", "pipeline-system");
        let knowledge_base_name = optional_string("KNOWLEDGE_BASE_NAME", "pipeline-workspace");
        let host = optional_string("HOST", "0.0.0.0");

        let workspace_retention_days = parse_with_default("WORKSPACE_RETENTION_DAYS", 7i64, &mut errors);
        let runner_timeout_seconds = parse_with_default("RUNNER_TIMEOUT_SECONDS", 3600u64, &mut errors);
        let port = parse_with_default("PORT", 8080u16, &mut errors);
        let database_min_pool_size = parse_with_default("DATABASE_MIN_POOL_SIZE", 1u32, &mut errors);
        let database_max_pool_size = parse_with_default("DATABASE_MAX_POOL_SIZE", 10u32, &mut errors);
        let github_max_retries = parse_with_default("GITHUB_MAX_RETRIES", 3u32, &mut errors);
        let github_base_delay_seconds = parse_with_default("GITHUB_BASE_DELAY_SECONDS", 1.0f64, &mut errors);
        let github_max_delay_seconds = parse_with_default("GITHUB_MAX_DELAY_SECONDS", 60.0f64, &mut errors);
        let github_request_timeout_seconds =
            parse_with_default("GITHUB_REQUEST_TIMEOUT_SECONDS", 30.0f64, &mut errors);

        if let Some(ref secret) = github_webhook_secret {
            if secret.trim().is_empty() {
                errors.push("github_webhook_secret must not be blank".into());
            }
        }
        if let Some(ref token) = github_token {
            if token.trim().is_empty() {
                errors.push("github_token must not be blank".into());
            }
        }
        if let Some(ref url) = llm_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                errors.push(format!("llm_url must start with http:// or https://, got {url:?}"));
            }
        }
        if let Some(ref url) = database_url {
            if !(url.starts_with("postgresql://") || url.starts_with("postgres://")) {
                errors.push(format!("database_url must start with postgresql:// or postgres://, got {url:?}"));
            }
        }
        if !std::path::Path::new(&workspace_base_path).is_absolute() {
            errors.push(format!("workspace_base_path must be absolute, got {workspace_base_path:?}"));
        }
        if workspace_retention_days < 1 {
            errors.push(format!("workspace_retention_days must be >= 1, got {workspace_retention_days}"));
        }
        if runner_timeout_seconds < 1 {
            errors.push(format!("runner_timeout_seconds must be >= 1, got {runner_timeout_seconds}"));
        }
        if port == 0 {
            errors.push("port must be in 1..=65535, got 0".to_string());
        }

        if !errors.is_empty() {
            return Err(ConfigError(errors));
        }

        Ok(Self {
            github_webhook_secret: github_webhook_secret.expect("validated above"),
            github_token: github_token.expect("validated above"),
            github_base_url,
            github_max_retries,
            github_base_delay_seconds,
            github_max_delay_seconds,
            github_request_timeout_seconds,
            workspace_base_path,
            workspace_retention_days,
            runner_cli_path,
            runner_timeout_seconds,
            llm_url: llm_url.expect("validated above"),
            llm_model,
            database_url: database_url.expect("validated above"),
            database_min_pool_size,
            database_max_pool_size,
            knowledge_base_namespace,
            knowledge_base_name,
            host,
            port,
        })
    }

    /// Render the configuration for startup logging, with secrets
    /// redacted (first four characters visible, the rest masked).
    pub fn redacted_summary(&self) -> Vec<(&'static str, String)> {
        vec![
            ("github_base_url", self.github_base_url.clone()),
            ("github_token", redact(&self.github_token)),
            ("github_webhook_secret", redact(&self.github_webhook_secret)),
            ("workspace_base_path", self.workspace_base_path.clone()),
            ("workspace_retention_days", self.workspace_retention_days.to_string()),
            ("runner_cli_path", self.runner_cli_path.clone()),
            ("runner_timeout_seconds", self.runner_timeout_seconds.to_string()),
            ("llm_url", self.llm_url.clone()),
            ("llm_model", self.llm_model.clone()),
            ("database_url", redact(&self.database_url)),
            ("host", self.host.clone()),
            ("port", self.port.to_string()),
        ]
    }
}

fn redact(value: &str) -> String {
    const VISIBLE: usize = 4;
    if value.len() <= VISIBLE {
        "*".repeat(value.len())
    } else {
        let mut out = value[..VISIBLE].to_string();
        out.push_str(&"*".repeat(value.len() - VISIBLE));
        out
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}{name}")).ok()
}

fn required_string(name: &str, errors: &mut Vec<String>) -> Option<String> {
    match env_var(name) {
        Some(v) if !v.trim().is_empty() => Some(v),
        _ => {
            errors.push(format!("{ENV_PREFIX}{name} is required"));
            None
        }
    }
}

fn optional_string(name: &str, default: &str) -> String {
    env_var(name).unwrap_or_else(|| default.to_string())
}

fn parse_with_default<T>(name: &str, default: T, errors: &mut Vec<String>) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(name) {
        None => default,
        Some(raw) => match raw.parse() {
            Ok(value) => value,
            Err(e) => {
                errors.push(format!("{ENV_PREFIX}{name}={raw:?} is invalid: {e}"));
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variable tests must not run concurrently with each other.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for (key, _) in env::vars() {
            if key.starts_with(ENV_PREFIX) {
                env::remove_var(key);
            }
        }
    }

    #[test]
    fn missing_required_fields_are_all_reported_together() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        let err = PipelineSettings::load().unwrap_err();
        assert!(err.0.iter().any(|m| m.contains("GITHUB_WEBHOOK_SECRET")));
        assert!(err.0.iter().any(|m| m.contains("GITHUB_TOKEN")));
        assert!(err.0.iter().any(|m| m.contains("LLM_URL")));
        assert!(err.0.iter().any(|m| m.contains("DATABASE_URL")));
    }

    #[test]
    fn valid_configuration_loads_with_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("PIPELINE_GITHUB_WEBHOOK_SECRET", "s3cret");
        env::set_var("PIPELINE_GITHUB_TOKEN", "ghp_abc");
        env::set_var("PIPELINE_LLM_URL", "http://localhost:8000");
        env::set_var("PIPELINE_DATABASE_URL", "postgresql://localhost/pipeline");

        let settings = PipelineSettings::load().unwrap();
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.workspace_retention_days, 7);
        assert_eq!(settings.github_base_url, "https://api.github.com");
        clear_env();
    }

    #[test]
    fn malformed_url_and_relative_path_are_both_reported() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("PIPELINE_GITHUB_WEBHOOK_SECRET", "s3cret");
        env::set_var("PIPELINE_GITHUB_TOKEN", "ghp_abc");
        env::set_var("PIPELINE_LLM_URL", "not-a-url");
        env::set_var("PIPELINE_DATABASE_URL", "postgresql://localhost/pipeline");
        env::set_var("PIPELINE_WORKSPACE_BASE_PATH", "relative/path");

        let err = PipelineSettings::load().unwrap_err();
        assert!(err.0.iter().any(|m| m.contains("llm_url")));
        assert!(err.0.iter().any(|m| m.contains("workspace_base_path")));
        clear_env();
    }

    #[test]
    fn redacted_summary_hides_the_tail_of_secrets() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("PIPELINE_GITHUB_WEBHOOK_SECRET", "s3cret-value");
        env::set_var("PIPELINE_GITHUB_TOKEN", "ghp_abcdefgh");
        env::set_var("PIPELINE_LLM_URL", "http://localhost:8000");
        env::set_var("PIPELINE_DATABASE_URL", "postgresql://localhost/pipeline");

        let settings = PipelineSettings::load().unwrap();
        let summary = settings.redacted_summary();
        let token = summary.iter().find(|(k, _)| *k == "github_token").unwrap();
        assert_eq!(token.1, "ghp_********");
        clear_env();
    }
}
