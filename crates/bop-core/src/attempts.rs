//! Concurrent scratch build attempts.
//!
//! One [`BuildAttempt`] is issued per target. All attempts run concurrently
//! on the Tokio runtime; [`BuildAttemptSet::await_all`] is the only point
//! where the caller waits for them. A failed build is a normal outcome and is
//! never retried.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::branch::BuildTarget;
use crate::committer::CommitterStore;
use crate::error::{BopError, Result};
use crate::executor::{BuildExecutor, BuildOutcome};
use crate::obs;

/// Lifecycle state of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    NotStarted,
    Running,
    Passed,
    Failed,
}

impl AttemptState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptState::Passed | AttemptState::Failed)
    }
}

/// A scratch build request for one target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildAttempt {
    pub target: BuildTarget,

    /// Log file receiving the build command output.
    pub log_path: PathBuf,

    pub state: AttemptState,

    /// Brew task ID, when the build request got that far.
    pub task_id: Option<String>,

    /// Brew task URL, when the build request got that far.
    pub task_url: Option<String>,

    pub exit_code: Option<i32>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BuildAttempt {
    pub fn new(target: BuildTarget, log_dir: &Path) -> Self {
        let log_path = log_dir.join(format!("build-{target}.log"));
        Self {
            target,
            log_path,
            state: AttemptState::NotStarted,
            task_id: None,
            task_url: None,
            exit_code: None,
            started_at: None,
            finished_at: None,
        }
    }

    /// Whether the build passed. Fails until the attempt has completed.
    pub fn passed(&self) -> Result<bool> {
        match self.state {
            AttemptState::Passed => Ok(true),
            AttemptState::Failed => Ok(false),
            AttemptState::NotStarted | AttemptState::Running => {
                Err(BopError::AttemptsNotComplete { pending: 1 })
            }
        }
    }

    /// `PASS` or `FAIL`. Fails until the attempt has completed.
    pub fn short_result(&self) -> Result<&'static str> {
        Ok(if self.passed()? { "PASS" } else { "FAIL" })
    }

    /// File name of the log, e.g. `build-rhel-7.3-candidate.log`.
    pub fn log_file_name(&self) -> String {
        self.log_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn complete(&mut self, outcome: BuildOutcome) {
        let passed = outcome.exit_code == 0;
        self.state = if passed { AttemptState::Passed } else { AttemptState::Failed };
        self.exit_code = Some(outcome.exit_code);
        self.task_id = outcome.task_id;
        self.task_url = outcome.task_url;
        self.finished_at = Some(Utc::now());

        if passed {
            info!(target_name = %self.target, "Brew build was successful");
        } else {
            error!(target_name = %self.target, exit_code = outcome.exit_code, "Brew build failed");
        }
        obs::emit_attempt_finished(self.target.as_str(), passed, self.task_id.as_deref());
    }
}

/// Target names end up in log file names, so only plain name characters are allowed.
fn validate_target(target: &BuildTarget) -> Result<()> {
    let name = target.as_str();
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-'));
    if valid {
        Ok(())
    } else {
        Err(BopError::InvalidTarget {
            target: name.to_string(),
        })
    }
}

/// All build attempts of one dispatch, keyed by target.
pub struct BuildAttemptSet {
    executor: Arc<dyn BuildExecutor>,
    log_dir: PathBuf,
    targets: Vec<BuildTarget>,
    attempts: BTreeMap<BuildTarget, BuildAttempt>,
    handles: Vec<(BuildTarget, JoinHandle<Result<BuildOutcome>>)>,
}

impl BuildAttemptSet {
    pub fn new(executor: Arc<dyn BuildExecutor>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            executor,
            log_dir: log_dir.into(),
            targets: Vec::new(),
            attempts: BTreeMap::new(),
            handles: Vec::new(),
        }
    }

    /// Issue one build per distinct target and return without waiting.
    ///
    /// A repeated target is ignored; a second call fails with
    /// `DuplicateStart`. Nothing is issued when called outside a Tokio
    /// runtime or when any target is not a valid log file name.
    pub fn start(&mut self, targets: impl IntoIterator<Item = BuildTarget>) -> Result<()> {
        if !self.attempts.is_empty() {
            return Err(BopError::DuplicateStart);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| BopError::NoRuntime)?;

        let mut distinct: Vec<BuildTarget> = Vec::new();
        for target in targets {
            validate_target(&target)?;
            if !distinct.contains(&target) {
                distinct.push(target);
            }
        }

        for target in distinct {
            let mut attempt = BuildAttempt::new(target.clone(), &self.log_dir);
            info!(target_name = %target, log = %attempt.log_path.display(), "Building for target");
            obs::emit_attempt_started(target.as_str());

            let executor = Arc::clone(&self.executor);
            let task_target = target.clone();
            let log_path = attempt.log_path.clone();
            let handle = runtime.spawn(async move { executor.execute(&task_target, &log_path).await });

            attempt.state = AttemptState::Running;
            attempt.started_at = Some(Utc::now());
            self.handles.push((target.clone(), handle));
            self.attempts.insert(target.clone(), attempt);
            self.targets.push(target);
        }

        Ok(())
    }

    /// Wait until every issued attempt has finished.
    ///
    /// All attempts are awaited even when the executor fails for some of
    /// them; the first such failure is then returned and the affected
    /// attempts stay `Running`.
    pub async fn await_all(&mut self) -> Result<()> {
        let (targets, handles): (Vec<_>, Vec<_>) = std::mem::take(&mut self.handles).into_iter().unzip();
        let results = join_all(handles).await;

        let mut first_error = None;
        for (target, joined) in targets.into_iter().zip(results) {
            let outcome = match joined {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => {
                    error!(target_name = %target, error = %e, "Build execution failed");
                    first_error.get_or_insert(e);
                    continue;
                }
                Err(e) => {
                    let e = BopError::Execution {
                        target: target.to_string(),
                        detail: e.to_string(),
                    };
                    error!(target_name = %target, error = %e, "Build task aborted");
                    first_error.get_or_insert(e);
                    continue;
                }
            };

            if let Some(attempt) = self.attempts.get_mut(&target) {
                attempt.complete(outcome);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Targets in the order their builds were issued.
    pub fn targets(&self) -> &[BuildTarget] {
        &self.targets
    }

    /// Attempts in issue order.
    pub fn attempts(&self) -> impl Iterator<Item = &BuildAttempt> {
        self.targets.iter().filter_map(|t| self.attempts.get(t))
    }

    pub fn get(&self, target: &BuildTarget) -> Option<&BuildAttempt> {
        self.attempts.get(target)
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    fn ensure_complete(&self) -> Result<()> {
        let pending = self
            .attempts
            .values()
            .filter(|a| !a.state.is_terminal())
            .count();
        if pending > 0 {
            return Err(BopError::AttemptsNotComplete { pending });
        }
        Ok(())
    }

    /// True iff every attempt passed. Fails while attempts are outstanding.
    pub fn all_passed(&self) -> Result<bool> {
        self.ensure_complete()?;
        Ok(self.attempts.values().all(|a| a.state == AttemptState::Passed))
    }

    /// Number of failed attempts. Fails while attempts are outstanding.
    pub fn failed_count(&self) -> Result<usize> {
        self.ensure_complete()?;
        Ok(self
            .attempts
            .values()
            .filter(|a| a.state == AttemptState::Failed)
            .count())
    }

    /// Remember who pushed the commit behind every issued Brew task.
    ///
    /// Builds run under the CI machine account, so later notifications about
    /// those tasks look the committer up here.
    pub async fn record_committer(&self, store: &dyn CommitterStore, committer: &str) -> Result<usize> {
        let mut recorded = 0;
        for attempt in self.attempts() {
            if let Some(task_id) = &attempt.task_id {
                store.record(task_id, committer).await?;
                recorded += 1;
            }
        }
        Ok(recorded)
    }
}
