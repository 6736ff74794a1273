//! Subprocess lifecycle for the external autonomous-implementation CLI:
//! launch, concurrent stdout/stderr draining, timeout-kill, and a
//! structured result that never propagates as an error.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Result of one CLI invocation. The runner never raises; every failure
/// mode (non-zero exit, timeout, launch failure) is represented here.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub success: bool,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_seconds: f64,
}

/// A callback invoked per output line, prefixed with its stream
/// (`[stdout]`/`[stderr]`), in addition to the structured debug log.
pub type LogCallback = Box<dyn Fn(&str) + Send + Sync>;

pub struct CliRunner {
    cli_path: String,
    timeout: Duration,
}

impl CliRunner {
    pub fn new(cli_path: impl Into<String>, timeout_seconds: u64) -> Self {
        Self { cli_path: cli_path.into(), timeout: Duration::from_secs(timeout_seconds) }
    }

    pub async fn run(
        &self,
        workspace_path: &Path,
        task_file: &Path,
        log_callback: Option<&LogCallback>,
    ) -> RunResult {
        let start = Instant::now();

        let mut child = match Command::new(&self.cli_path)
            .arg("--workspace")
            .arg(workspace_path)
            .arg("--task")
            .arg(task_file)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => return Self::os_error_result(&e, start),
        };

        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");

        let collect = async {
            let (stdout_lines, stderr_lines) =
                tokio::join!(read_lines(stdout, "stdout", log_callback), read_lines(stderr, "stderr", log_callback));
            let status = child.wait().await;
            (stdout_lines, stderr_lines, status)
        };

        match tokio::time::timeout(self.timeout, collect).await {
            Ok((stdout_lines, stderr_lines, status)) => {
                let exit_code = status.ok().and_then(|s| s.code()).unwrap_or(-1);
                Self::build_result(exit_code, stdout_lines.join("\n"), stderr_lines.join("\n"), start)
            }
            Err(_) => {
                let _ = child.start_kill();
                Self::timeout_result(self.timeout, start)
            }
        }
    }

    fn build_result(exit_code: i32, stdout: String, stderr: String, start: Instant) -> RunResult {
        let success = exit_code == 0;
        let duration_seconds = start.elapsed().as_secs_f64();
        if success {
            tracing::info!(duration_seconds, "CLI run succeeded");
        } else {
            tracing::warn!(duration_seconds, exit_code, "CLI run failed");
        }
        RunResult { success, exit_code, stdout, stderr, duration_seconds }
    }

    fn timeout_result(timeout: Duration, start: Instant) -> RunResult {
        RunResult {
            success: false,
            exit_code: -1,
            stdout: String::new(),
            stderr: format!("Process timed out after {}s", timeout.as_secs()),
            duration_seconds: start.elapsed().as_secs_f64(),
        }
    }

    fn os_error_result(error: &std::io::Error, start: Instant) -> RunResult {
        RunResult {
            success: false,
            exit_code: -1,
            stdout: String::new(),
            stderr: format!("Failed to start CLI: {error}"),
            duration_seconds: start.elapsed().as_secs_f64(),
        }
    }
}

async fn read_lines<R: tokio::io::AsyncRead + Unpin>(
    stream: R,
    label: &'static str,
    log_callback: Option<&LogCallback>,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut reader = BufReader::new(stream).lines();
    while let Ok(Some(line)) = reader.next_line().await {
        tracing::debug!(stream = label, "{line}");
        if let Some(callback) = log_callback {
            callback(&format!("[{label}] {line}"));
        }
        lines.push(line);
    }
    lines
}
