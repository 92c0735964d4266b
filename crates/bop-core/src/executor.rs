//! Build execution collaborator.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::branch::BuildTarget;
use crate::error::{BopError, Result};

const TASK_ID_PREFIX: &str = "Created task: ";
const TASK_URL_PREFIX: &str = "Task info: ";

/// Result of one finished build request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutcome {
    /// Exit code of the build command (0 = success).
    pub exit_code: i32,

    /// Brew task ID parsed from the build output.
    pub task_id: Option<String>,

    /// Brew task URL parsed from the build output.
    pub task_url: Option<String>,
}

impl BuildOutcome {
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }

    /// Build an outcome from an exit code and the command's output.
    pub fn from_output(exit_code: i32, output: &str) -> Self {
        Self {
            exit_code,
            task_id: find_prefixed(output, TASK_ID_PREFIX),
            task_url: find_prefixed(output, TASK_URL_PREFIX),
        }
    }
}

fn find_prefixed(output: &str, prefix: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| line.strip_prefix(prefix))
        .map(|rest| rest.trim().to_string())
}

/// Issues a build of the current branch in one target.
///
/// The returned future is the build handle: it resolves once the build
/// request finished. A non-zero exit code is an outcome, not an error;
/// errors are reserved for failing to run the build at all.
#[async_trait]
pub trait BuildExecutor: Send + Sync {
    async fn execute(&self, target: &BuildTarget, log_path: &Path) -> Result<BuildOutcome>;
}

/// Scratch builds through `rhpkg`, run inside a dist-git checkout.
pub struct RhpkgExecutor {
    command: Vec<String>,
    workdir: PathBuf,
}

impl RhpkgExecutor {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            command: ["rhpkg", "build", "--scratch", "--skip-nvr-check"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            workdir: workdir.into(),
        }
    }

    /// Replace the build command. `--target <target>` is appended to it.
    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = command;
        self
    }
}

#[async_trait]
impl BuildExecutor for RhpkgExecutor {
    async fn execute(&self, target: &BuildTarget, log_path: &Path) -> Result<BuildOutcome> {
        let start = Instant::now();
        let execution_error = |detail: String| BopError::Execution {
            target: target.to_string(),
            detail,
        };

        let Some((exe, args)) = self.command.split_first() else {
            return Err(execution_error("empty build command".to_string()));
        };

        // stdout and stderr share one log file.
        let logfile = tokio::fs::File::create(log_path).await?;
        let stderr = logfile.try_clone().await?.into_std().await;
        let logfile = logfile.into_std().await;

        let mut child = Command::new(exe)
            .args(args)
            .args(["--target", target.as_str()])
            .current_dir(&self.workdir)
            .stdout(Stdio::from(logfile))
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(|e| execution_error(format!("failed to spawn {exe}: {e}")))?;

        let status = child.wait().await?;
        let exit_code = status.code().unwrap_or(-1);
        debug!(
            target_name = %target,
            exit_code,
            duration_ms = start.elapsed().as_millis() as u64,
            "Build command finished"
        );

        let log = tokio::fs::read(log_path).await?;
        Ok(BuildOutcome::from_output(exit_code, &String::from_utf8_lossy(&log)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_outcome_parses_task_lines() {
        let output = "Building...\nCreated task: 12345\nTask info: https://brew.example.com/taskinfo?taskID=12345\n";
        let outcome = BuildOutcome::from_output(0, output);
        assert!(outcome.passed());
        assert_eq!(outcome.task_id.as_deref(), Some("12345"));
        assert_eq!(
            outcome.task_url.as_deref(),
            Some("https://brew.example.com/taskinfo?taskID=12345")
        );
    }

    #[test]
    fn test_outcome_without_task_lines() {
        let outcome = BuildOutcome::from_output(1, "could not connect\n");
        assert!(!outcome.passed());
        assert!(outcome.task_id.is_none());
        assert!(outcome.task_url.is_none());
    }

    #[tokio::test]
    async fn test_execute_writes_log_and_parses_it() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join("build-a.log");
        let executor = RhpkgExecutor::new(dir.path()).with_command(vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo \"Created task: 77\"; echo \"Task info: http://brew/77\"".to_string(),
            "sh".to_string(),
        ]);

        let outcome = executor.execute(&BuildTarget::from("a"), &log_path).await.unwrap();
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.task_id.as_deref(), Some("77"));
        assert!(std::fs::read_to_string(&log_path).unwrap().contains("Task info"));
    }

    #[tokio::test]
    async fn test_execute_logs_both_streams_into_fresh_file() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join("build-a.log");
        std::fs::write(&log_path, "stale output from an earlier run\n").unwrap();
        let executor = RhpkgExecutor::new(dir.path()).with_command(vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo to-stdout; echo to-stderr >&2".to_string(),
            "sh".to_string(),
        ]);

        executor.execute(&BuildTarget::from("a"), &log_path).await.unwrap();

        let log = std::fs::read_to_string(&log_path).unwrap();
        assert!(log.contains("to-stdout"));
        assert!(log.contains("to-stderr"));
        assert!(!log.contains("stale"));
    }

    #[tokio::test]
    async fn test_execute_failing_command() {
        let dir = TempDir::new().unwrap();
        let executor = RhpkgExecutor::new(dir.path()).with_command(vec!["false".to_string()]);

        let outcome = executor
            .execute(&BuildTarget::from("a"), &dir.path().join("build-a.log"))
            .await
            .unwrap();
        assert!(!outcome.passed());
        assert_ne!(outcome.exit_code, 0);
    }

    #[tokio::test]
    async fn test_execute_missing_program_is_error() {
        let dir = TempDir::new().unwrap();
        let executor =
            RhpkgExecutor::new(dir.path()).with_command(vec!["/nonexistent/rhpkg".to_string()]);

        let err = executor
            .execute(&BuildTarget::from("a"), &dir.path().join("build-a.log"))
            .await
            .unwrap_err();
        assert!(matches!(err, BopError::Execution { .. }));
    }
}
