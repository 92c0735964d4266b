//! Build-on-Push for a component.
//!
//! Enabling Build-on-Push for a component means having its dispatcher job
//! present and enabled on Jenkins. The dispatcher runs [`CommitCi::dispatch`]
//! for every pushed commit, which in turn creates and triggers the worker job
//! of the pushed branch when there is something to build.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, Instrument};

use crate::branch::BuildTarget;
use crate::config::{join_targets, BranchConfig};
use crate::dispatch::{Commit, CommitDispatchPolicy, DispatchDecision};
use crate::error::Result;
use crate::jobs::{CiSource, DispatcherJob, Job, WorkerJob};
use crate::obs;
use crate::scheduler::JobScheduler;
use crate::settings::CiSettings;

/// Worker job parameter carrying the space-separated target list.
pub const TARGETS_PARAMETER: &str = "BREW_TARGETS";

pub struct CommitCi {
    scheduler: Arc<dyn JobScheduler>,
    component: String,
    settings: CiSettings,
}

impl CommitCi {
    pub fn new(scheduler: Arc<dyn JobScheduler>, component: impl Into<String>, settings: CiSettings) -> Self {
        Self {
            scheduler,
            component: component.into(),
            settings,
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    /// Create or enable the component's dispatcher job.
    pub async fn enable(&self, slave: &str, source: &CiSource) -> Result<()> {
        let dispatcher = DispatcherJob::new(self.component.clone(), slave, source.clone());
        self.enable_job(&dispatcher.into()).await
    }

    /// Disable the component's dispatcher job, if it exists.
    pub async fn disable(&self) -> Result<()> {
        let dispatcher = Job::from(DispatcherJob::named(self.component.clone()));
        if self.scheduler.job_exists(&dispatcher).await? {
            self.scheduler.disable_job(&dispatcher.name()).await?;
            info!(job = %dispatcher.name(), "Disabled dispatcher job");
        }
        Ok(())
    }

    /// Delete the component's dispatcher job, if it exists.
    pub async fn remove(&self) -> Result<()> {
        let dispatcher = Job::from(DispatcherJob::named(self.component.clone()));
        if self.scheduler.job_exists(&dispatcher).await? {
            self.scheduler.delete_job(&dispatcher.name()).await?;
            info!(job = %dispatcher.name(), "Deleted dispatcher job");
        }
        Ok(())
    }

    /// Decide whether a pushed commit is built and trigger its worker job.
    ///
    /// When this runs inside a Jenkins build (job name and build number are
    /// known), that build's description is set to the rendered outcome.
    pub async fn dispatch(
        &self,
        commit: &Commit,
        config: Option<&BranchConfig>,
        slave: &str,
        source: &CiSource,
    ) -> Result<DispatchDecision> {
        let span = obs::dispatch_span(&self.component, commit.branch.as_str());
        async move {
            let decision = CommitDispatchPolicy::consider(commit, config)?;

            if !decision.targets.is_empty() {
                let worker = WorkerJob::new(self.component.clone(), commit.branch.clone(), slave, source.clone());
                self.run_on_targets(&worker.into(), &decision.targets).await?;
            }

            if let Some((job_name, build)) = self.settings.current_build() {
                let jenkins_url = self.settings.jenkins_url.as_deref().unwrap_or_default();
                let description = decision.outcome.render_html(jenkins_url, &self.component);
                self.scheduler
                    .set_build_description(job_name, build, &description)
                    .await?;
            }

            Ok(decision)
        }
        .instrument(span)
        .await
    }

    /// Make sure a worker job is current and enabled, then trigger it.
    async fn run_on_targets(&self, worker: &Job, targets: &[BuildTarget]) -> Result<()> {
        self.enable_job(worker).await?;

        let joined = join_targets(targets);
        let mut parameters = BTreeMap::new();
        parameters.insert(TARGETS_PARAMETER.to_string(), joined.clone());

        self.scheduler.trigger_job(&worker.name(), &parameters).await?;
        obs::emit_job_triggered(&worker.name(), &joined);
        Ok(())
    }

    /// Create a missing job, or update an existing one from the current
    /// definition and enable it.
    async fn enable_job(&self, job: &Job) -> Result<()> {
        let name = job.name();
        let created = if self.scheduler.job_exists(job).await? {
            self.scheduler.update_job(job).await?;
            self.scheduler.enable_job(&name).await?;
            false
        } else {
            self.scheduler.create_job(job).await?;
            true
        };
        obs::emit_job_enabled(&name, created);
        Ok(())
    }
}
