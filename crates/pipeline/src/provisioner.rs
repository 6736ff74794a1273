//! Workspace provisioning: allocates a directory per issue attempt, shallow
//! clones the relevant repositories into it, and periodically garbage
//! collects old attempts.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::classification::IssueClassification;

const DEFAULT_CLONE_TIMEOUT_SECONDS: u64 = 300;
const DEFAULT_DIR_PERMISSIONS: u32 = 0o755;

#[derive(Debug, thiserror::Error)]
pub enum ProvisionerError {
    #[error("failed to create workspace directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("failed to set permissions on {0}: {1}")]
    SetPermissions(PathBuf, std::io::Error),

    #[error("git clone of {url} failed: {stderr}")]
    GitClone { url: String, stderr: String },

    #[error("git clone of {0} timed out")]
    GitCloneTimeout(String),

    #[error("failed to launch git: {0}")]
    GitLaunch(std::io::Error),
}

#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
    pub base_path: PathBuf,
    pub retention_days: i64,
    pub clone_timeout_seconds: u64,
    pub dir_permissions: u32,
}

impl WorkspaceConfig {
    pub fn new(base_path: impl Into<PathBuf>, retention_days: i64) -> Self {
        Self {
            base_path: base_path.into(),
            retention_days,
            clone_timeout_seconds: DEFAULT_CLONE_TIMEOUT_SECONDS,
            dir_permissions: DEFAULT_DIR_PERMISSIONS,
        }
    }
}

/// Issue details required to resolve which repositories to clone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueDetails {
    pub owner: String,
    pub repository: String,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ProvisionedWorkspace {
    pub path: PathBuf,
    pub cloned_repositories: Vec<String>,
}

pub struct WorkspaceProvisioner {
    config: WorkspaceConfig,
}

impl WorkspaceProvisioner {
    pub fn new(config: WorkspaceConfig) -> Self {
        Self { config }
    }

    pub async fn provision(
        &self,
        issue_id: &str,
        classification: &IssueClassification,
        issue_details: &IssueDetails,
    ) -> Result<ProvisionedWorkspace, ProvisionerError> {
        let dir_name = workspace_dir_name(issue_id, now_unix());
        let workspace_path = self.config.base_path.join(dir_name);

        tokio::fs::create_dir_all(&workspace_path)
            .await
            .map_err(|e| ProvisionerError::CreateDir(workspace_path.clone(), e))?;

        set_permissions(&workspace_path, self.config.dir_permissions)?;

        let urls = resolve_clone_urls(issue_details, classification);
        let mut cloned = Vec::with_capacity(urls.len());
        for (package_name, url) in &urls {
            self.shallow_clone(url, &workspace_path.join(package_name)).await?;
            cloned.push(package_name.clone());
        }

        Ok(ProvisionedWorkspace { path: workspace_path, cloned_repositories: cloned })
    }

    async fn shallow_clone(&self, url: &str, destination: &Path) -> Result<(), ProvisionerError> {
        let child = Command::new("git")
            .arg("clone")
            .arg("--depth")
            .arg("1")
            .arg(url)
            .arg(destination)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(ProvisionerError::GitLaunch)?;

        let timeout = Duration::from_secs(self.config.clone_timeout_seconds);
        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) if output.status.success() => Ok(()),
            Ok(Ok(output)) => Err(ProvisionerError::GitClone {
                url: url.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            }),
            Ok(Err(e)) => Err(ProvisionerError::GitLaunch(e)),
            Err(_) => Err(ProvisionerError::GitCloneTimeout(url.to_string())),
        }
    }

    /// Removes workspace directories older than the configured retention
    /// window. Returns the number removed. Non-directory entries under the
    /// base path are ignored; a single removal failure is logged and does
    /// not stop the rest of the pass.
    pub async fn cleanup_old_workspaces(&self) -> Result<usize, std::io::Error> {
        let cutoff = SystemTime::now() - Duration::from_secs((self.config.retention_days * 86_400) as u64);
        let mut removed = 0;

        let mut entries = match tokio::fs::read_dir(&self.config.base_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        while let Some(entry) = entries.next_entry().await? {
            let metadata = match entry.metadata().await {
                Ok(m) => m,
                Err(_) => continue,
            };
            if !metadata.is_dir() {
                continue;
            }
            let modified = match metadata.modified() {
                Ok(m) => m,
                Err(_) => continue,
            };
            if modified < cutoff {
                match tokio::fs::remove_dir_all(entry.path()).await {
                    Ok(()) => removed += 1,
                    Err(e) => tracing::warn!(path = ?entry.path(), error = %e, "failed to remove old workspace"),
                }
            }
        }

        Ok(removed)
    }
}

fn workspace_dir_name(issue_id: &str, epoch_seconds: u64) -> String {
    let sanitized = issue_id.replace(['/', '#'], "_");
    format!("{sanitized}_{epoch_seconds}")
}

fn now_unix() -> u64 {
    SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_secs()
}

fn resolve_clone_urls(
    issue_details: &IssueDetails,
    classification: &IssueClassification,
) -> Vec<(String, String)> {
    let mut seen = std::collections::HashSet::new();
    let mut urls = Vec::new();

    let primary_url = format!("https://github.com/{}/{}.git", issue_details.owner, issue_details.repository);
    seen.insert(issue_details.repository.clone());
    urls.push((issue_details.repository.clone(), primary_url));

    for package in &classification.affected_packages {
        if seen.insert(package.clone()) {
            urls.push((package.clone(), format!("https://github.com/{}/{}.git", issue_details.owner, package)));
        }
    }

    urls
}

#[cfg(unix)]
fn set_permissions(path: &Path, mode: u32) -> Result<(), ProvisionerError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|e| ProvisionerError::SetPermissions(path.to_path_buf(), e))
}

#[cfg(not(unix))]
fn set_permissions(_path: &Path, _mode: u32) -> Result<(), ProvisionerError> {
    Ok(())
}
