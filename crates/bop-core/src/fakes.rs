//! In-memory fakes for the external collaborators (testing only)
//!
//! `MemoryScheduler` stands in for Jenkins and `ScriptedExecutor` for Brew.
//! Both record the calls they receive so tests can assert on them.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::branch::BuildTarget;
use crate::error::{BopError, Result};
use crate::executor::{BuildExecutor, BuildOutcome};
use crate::jobs::Job;
use crate::scheduler::JobScheduler;
use crate::settings::CiSettings;

// ---------------------------------------------------------------------------
// MemoryScheduler
// ---------------------------------------------------------------------------

/// A call received by [`MemoryScheduler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerCall {
    Create(String),
    Update(String),
    Enable(String),
    Disable(String),
    Delete(String),
    Trigger {
        job: String,
        parameters: BTreeMap<String, String>,
    },
    Describe {
        job: String,
        build: String,
        description: String,
    },
}

#[derive(Debug, Default)]
struct SchedulerState {
    jobs: BTreeMap<String, bool>,
    calls: Vec<SchedulerCall>,
}

/// In-memory job scheduler tracking which jobs exist and are enabled.
///
/// Job definitions are built on create/update, so a missing setting fails
/// the same way it would against a real Jenkins.
#[derive(Debug, Default)]
pub struct MemoryScheduler {
    settings: CiSettings,
    state: Mutex<SchedulerState>,
}

impl MemoryScheduler {
    pub fn new(settings: CiSettings) -> Self {
        Self {
            settings,
            state: Mutex::default(),
        }
    }

    /// Pre-register a job as existing (and enabled or not).
    pub fn with_job(self, name: impl Into<String>, enabled: bool) -> Self {
        self.state.lock().unwrap().jobs.insert(name.into(), enabled);
        self
    }

    pub fn calls(&self) -> Vec<SchedulerCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn is_enabled(&self, name: &str) -> Option<bool> {
        self.state.lock().unwrap().jobs.get(name).copied()
    }

    fn missing(operation: &'static str, name: &str) -> BopError {
        BopError::Scheduler {
            operation,
            job: name.to_string(),
            detail: "no such job".to_string(),
        }
    }
}

#[async_trait]
impl JobScheduler for MemoryScheduler {
    async fn job_exists(&self, job: &Job) -> Result<bool> {
        let state = self.state.lock().unwrap();
        Ok(state.jobs.contains_key(&job.name()) || state.jobs.contains_key(&job.display_name()))
    }

    async fn create_job(&self, job: &Job) -> Result<()> {
        job.definition(&self.settings)?;
        let name = job.name();
        let mut state = self.state.lock().unwrap();
        if state.jobs.contains_key(&name) {
            return Err(BopError::Scheduler {
                operation: "create-job",
                job: name,
                detail: "job already exists".to_string(),
            });
        }
        state.jobs.insert(name.clone(), true);
        state.calls.push(SchedulerCall::Create(name));
        Ok(())
    }

    async fn update_job(&self, job: &Job) -> Result<()> {
        job.definition(&self.settings)?;
        let name = job.name();
        let mut state = self.state.lock().unwrap();
        if !state.jobs.contains_key(&name) {
            return Err(Self::missing("update-job", &name));
        }
        state.calls.push(SchedulerCall::Update(name));
        Ok(())
    }

    async fn enable_job(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match state.jobs.get_mut(name) {
            Some(enabled) => *enabled = true,
            None => return Err(Self::missing("enable-job", name)),
        }
        state.calls.push(SchedulerCall::Enable(name.to_string()));
        Ok(())
    }

    async fn disable_job(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match state.jobs.get_mut(name) {
            Some(enabled) => *enabled = false,
            None => return Err(Self::missing("disable-job", name)),
        }
        state.calls.push(SchedulerCall::Disable(name.to_string()));
        Ok(())
    }

    async fn delete_job(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.jobs.remove(name).is_none() {
            return Err(Self::missing("delete-job", name));
        }
        state.calls.push(SchedulerCall::Delete(name.to_string()));
        Ok(())
    }

    async fn trigger_job(&self, name: &str, parameters: &BTreeMap<String, String>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match state.jobs.get(name) {
            Some(true) => {}
            Some(false) => {
                return Err(BopError::Scheduler {
                    operation: "build",
                    job: name.to_string(),
                    detail: "job is disabled".to_string(),
                })
            }
            None => return Err(Self::missing("build", name)),
        }
        state.calls.push(SchedulerCall::Trigger {
            job: name.to_string(),
            parameters: parameters.clone(),
        });
        Ok(())
    }

    async fn set_build_description(&self, job_name: &str, build: &str, description: &str) -> Result<()> {
        self.state.lock().unwrap().calls.push(SchedulerCall::Describe {
            job: job_name.to_string(),
            build: build.to_string(),
            description: description.to_string(),
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScriptedExecutor
// ---------------------------------------------------------------------------

/// Build executor answering from a script instead of running builds.
///
/// Targets pass by default. Each call writes a small log file and reports a
/// task ID derived from the call order.
#[derive(Debug)]
pub struct ScriptedExecutor {
    failing: HashSet<String>,
    erroring: HashSet<String>,
    gate: Option<(watch::Sender<bool>, watch::Receiver<bool>)>,
    calls: Mutex<Vec<(BuildTarget, PathBuf)>>,
}

impl Default for ScriptedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self {
            failing: HashSet::new(),
            erroring: HashSet::new(),
            gate: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// The build for `target` exits non-zero.
    pub fn fail(mut self, target: &str) -> Self {
        self.failing.insert(target.to_string());
        self
    }

    /// The executor cannot run the build for `target` at all.
    pub fn error_for(mut self, target: &str) -> Self {
        self.erroring.insert(target.to_string());
        self
    }

    /// Builds block until [`ScriptedExecutor::release`] is called.
    pub fn hold(mut self) -> Self {
        self.gate = Some(watch::channel(false));
        self
    }

    pub fn release(&self) {
        if let Some((tx, _)) = &self.gate {
            tx.send_replace(true);
        }
    }

    pub fn calls(&self) -> Vec<(BuildTarget, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn executed_targets(&self) -> BTreeSet<BuildTarget> {
        self.calls().into_iter().map(|(target, _)| target).collect()
    }
}

#[async_trait]
impl BuildExecutor for ScriptedExecutor {
    async fn execute(&self, target: &BuildTarget, log_path: &Path) -> Result<BuildOutcome> {
        let task_id = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((target.clone(), log_path.to_path_buf()));
            (1000 + calls.len()).to_string()
        };

        if let Some((_, rx)) = &self.gate {
            let mut rx = rx.clone();
            rx.wait_for(|released| *released)
                .await
                .map_err(|e| BopError::Execution {
                    target: target.to_string(),
                    detail: e.to_string(),
                })?;
        }

        if self.erroring.contains(target.as_str()) {
            return Err(BopError::Execution {
                target: target.to_string(),
                detail: "scripted execution error".to_string(),
            });
        }

        let exit_code = if self.failing.contains(target.as_str()) { 1 } else { 0 };
        let output = format!(
            "Created task: {task_id}\nTask info: https://brew.example.com/taskinfo?taskID={task_id}\n"
        );
        tokio::fs::write(log_path, &output).await?;
        Ok(BuildOutcome::from_output(exit_code, &output))
    }
}
