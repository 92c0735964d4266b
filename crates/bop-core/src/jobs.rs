//! Build-on-Push Jenkins job roles.
//!
//! A single *dispatcher* job per component watches every push to the
//! component's dist-git repository and decides whether the pushed branch
//! should be built. A *worker* job exists per (component, branch) pair and
//! issues the scratch builds, so its build history is the buildability
//! history of that branch.
//!
//! A job's definition is the set of parameters used to instantiate one of
//! the Jenkins Job Builder templates. Rendering the template is left to the
//! job scheduler.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::branch::BranchName;
use crate::error::Result;
use crate::settings::{html_link, CiSettings};

/// Where the CI code used inside the jobs is fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiSource {
    /// GitHub user owning the CI repository.
    pub user: String,

    /// Branch of the CI repository.
    pub branch: String,
}

impl CiSource {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            branch: "master".to_string(),
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }
}

/// Parameters instantiating a Jenkins Job Builder template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDefinition {
    /// Job name.
    pub name: String,

    /// Template defaults the job is instantiated from.
    pub template: String,

    /// Project parameters substituted into the template.
    pub parameters: BTreeMap<String, serde_yaml::Value>,
}

impl JobDefinition {
    fn new(name: String, template: &str) -> Self {
        Self {
            name,
            template: template.to_string(),
            parameters: BTreeMap::new(),
        }
    }

    fn param(mut self, key: &str, value: impl Into<serde_yaml::Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    /// Job Builder YAML: a `job-template` entry followed by a `project` entry.
    pub fn to_yaml(&self) -> Result<String> {
        let mut template = serde_yaml::Mapping::new();
        template.insert("name".into(), self.name.clone().into());
        template.insert("defaults".into(), self.template.clone().into());

        let mut project = serde_yaml::Mapping::new();
        for (key, value) in &self.parameters {
            project.insert(key.clone().into(), value.clone());
        }
        project.insert(
            "jobs".into(),
            serde_yaml::Value::Sequence(vec![self.name.clone().into()]),
        );

        let mut template_entry = serde_yaml::Mapping::new();
        template_entry.insert("job-template".into(), template.into());
        let mut project_entry = serde_yaml::Mapping::new();
        project_entry.insert("project".into(), project.into());

        let document = serde_yaml::Value::Sequence(vec![template_entry.into(), project_entry.into()]);
        Ok(serde_yaml::to_string(&document)?)
    }
}

/// Per-component dispatcher job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherJob {
    pub component: String,
    pub slave: Option<String>,
    pub source: Option<CiSource>,
}

impl DispatcherJob {
    pub const TEMPLATE: &'static str = "ci-dispatcher-commit";

    /// A dispatcher reference carrying only what is needed to address the job.
    pub fn named(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            slave: None,
            source: None,
        }
    }

    pub fn new(component: impl Into<String>, slave: impl Into<String>, source: CiSource) -> Self {
        Self {
            component: component.into(),
            slave: Some(slave.into()),
            source: Some(source),
        }
    }

    pub fn job_name(component: &str) -> String {
        format!("ci-{component}-dispatcher-commit")
    }

    pub fn name(&self) -> String {
        Self::job_name(&self.component)
    }

    pub fn display_name(&self) -> String {
        format!("{}: Schedule Brew build", self.component)
    }

    pub fn definition(&self, settings: &CiSettings) -> Result<JobDefinition> {
        let distgit_url = settings.require_distgit_url("create a commit dispatcher job")?;
        let staging_doc_link = html_link(settings.staging_branch_doc_url.as_deref(), "staging branch");

        let definition = JobDefinition::new(self.name(), Self::TEMPLATE)
            .param("name", self.component.as_str())
            .param("component", self.component.as_str())
            .param("display-name", self.display_name())
            .param("distgit-root-url", distgit_url)
            .param("platform-ci-project-link", settings.project_link())
            .param("staging-branch-doc-link", staging_doc_link);

        Ok(with_runtime_params(definition, self.slave.as_deref(), self.source.as_ref()))
    }
}

/// Per-(component, branch) worker job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerJob {
    pub component: String,
    pub branch: BranchName,
    pub slave: Option<String>,
    pub source: Option<CiSource>,
}

impl WorkerJob {
    pub const TEMPLATE: &'static str = "ci-workflow-brew-build";

    pub fn new(
        component: impl Into<String>,
        branch: BranchName,
        slave: impl Into<String>,
        source: CiSource,
    ) -> Self {
        Self {
            component: component.into(),
            branch,
            slave: Some(slave.into()),
            source: Some(source),
        }
    }

    /// Name of the worker job for a component and branch, usable without
    /// knowing the rest of the job's configuration.
    pub fn job_name(component: &str, branch: &str) -> String {
        format!("ci-{component}-commit-{branch}")
    }

    pub fn name(&self) -> String {
        Self::job_name(&self.component, self.branch.as_str())
    }

    pub fn display_name(&self) -> String {
        format!("{}: Build branch {} in Brew", self.component, self.branch)
    }

    pub fn definition(&self, settings: &CiSettings) -> Result<JobDefinition> {
        let distgit_url = settings.require_distgit_url("create a commit worker job")?;

        let dispatcher_name = DispatcherJob::job_name(&self.component);
        let dispatcher_url = settings
            .jenkins_url
            .as_deref()
            .map(|url| format!("{url}/job/{dispatcher_name}"));
        let dispatcher_link = html_link(dispatcher_url.as_deref(), "commit dispatcher");

        let definition = JobDefinition::new(self.name(), Self::TEMPLATE)
            .param("name", self.component.as_str())
            .param("component", self.component.as_str())
            .param("git-branch", self.branch.as_str())
            .param("display-name", self.display_name())
            .param("dispatcher-link", dispatcher_link)
            .param("platform-ci-project-link", settings.project_link())
            .param("distgit-root-url", distgit_url);

        Ok(with_runtime_params(definition, self.slave.as_deref(), self.source.as_ref()))
    }
}

fn with_runtime_params(definition: JobDefinition, slave: Option<&str>, source: Option<&CiSource>) -> JobDefinition {
    let mut definition = definition;
    if let Some(slave) = slave {
        definition = definition.param("team-slave", slave);
    }
    if let Some(source) = source {
        definition = definition
            .param("platform-ci-branch", source.branch.as_str())
            .param("github-user", source.user.as_str());
    }
    definition
}

/// A Build-on-Push Jenkins job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    Dispatcher(DispatcherJob),
    Worker(WorkerJob),
}

impl Job {
    pub fn name(&self) -> String {
        match self {
            Job::Dispatcher(job) => job.name(),
            Job::Worker(job) => job.name(),
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            Job::Dispatcher(job) => job.display_name(),
            Job::Worker(job) => job.display_name(),
        }
    }

    pub fn definition(&self, settings: &CiSettings) -> Result<JobDefinition> {
        match self {
            Job::Dispatcher(job) => job.definition(settings),
            Job::Worker(job) => job.definition(settings),
        }
    }
}

impl From<DispatcherJob> for Job {
    fn from(job: DispatcherJob) -> Self {
        Job::Dispatcher(job)
    }
}

impl From<WorkerJob> for Job {
    fn from(job: WorkerJob) -> Self {
        Job::Worker(job)
    }
}
