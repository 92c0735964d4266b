//! Instance-wide settings.
//!
//! Built once by the driver and passed by reference to whatever needs it.

use serde::{Deserialize, Serialize};

use crate::error::{BopError, Result};

/// Environment variable names understood by [`CiSettings::from_env`].
pub mod env {
    pub const PROJECT_URL: &str = "PLATFORM_CI_PROJECT";
    pub const DISTGIT_URL: &str = "BOP_DIST_GIT_URL";
    pub const JENKINS_URL: &str = "JENKINS_URL";
    pub const STAGING_BRANCH_DOC: &str = "BOP_STAGING_BRANCH_DOC";
    pub const ADMINS: &str = "PLATFORM_CI_ADMINS";
    pub const BUG_DESTINATION: &str = "PLATFORM_CI_BUG_DESTINATION";
    pub const JENKINS_CLI: &str = "BOP_JENKINS_CLI";
    pub const BUILD_URL: &str = "BUILD_URL";
    pub const JOB_NAME: &str = "JOB_NAME";
    pub const BUILD_NUMBER: &str = "BUILD_NUMBER";
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiSettings {
    /// CI project page, linked from job descriptions and reports.
    pub project_url: Option<String>,

    /// Root URL of the dist-git service. Required to create jobs.
    pub distgit_url: Option<String>,

    /// Jenkins master URL.
    pub jenkins_url: Option<String>,

    /// Documentation page describing staging branches.
    pub staging_branch_doc_url: Option<String>,

    /// Contact for CI administrators.
    pub admins: Option<String>,

    /// Where bugs against the CI should be filed.
    pub bug_destination: Option<String>,

    /// Command prefix invoking the Jenkins CLI, split on whitespace.
    pub jenkins_cli: Option<String>,

    /// URL of the Jenkins build currently running this process.
    pub build_url: Option<String>,

    /// Name of the Jenkins job currently running this process.
    pub job_name: Option<String>,

    /// Number of the Jenkins build currently running this process.
    pub build_number: Option<String>,
}

impl CiSettings {
    /// Read settings from the process environment. Empty values count as unset.
    pub fn from_env() -> Self {
        fn var(name: &str) -> Option<String> {
            std::env::var(name).ok().filter(|v| !v.is_empty())
        }

        Self {
            project_url: var(env::PROJECT_URL),
            distgit_url: var(env::DISTGIT_URL),
            jenkins_url: var(env::JENKINS_URL),
            staging_branch_doc_url: var(env::STAGING_BRANCH_DOC),
            admins: var(env::ADMINS),
            bug_destination: var(env::BUG_DESTINATION),
            jenkins_cli: var(env::JENKINS_CLI),
            build_url: var(env::BUILD_URL),
            job_name: var(env::JOB_NAME),
            build_number: var(env::BUILD_NUMBER),
        }
    }

    /// The dist-git URL, or `MissingSetting` naming what could not be done.
    pub fn require_distgit_url(&self, purpose: &'static str) -> Result<&str> {
        self.distgit_url
            .as_deref()
            .ok_or(BopError::MissingSetting {
                name: "DistGit URL",
                purpose,
            })
    }

    /// Job name and build number of the build running this process, when both are known.
    pub fn current_build(&self) -> Option<(&str, &str)> {
        match (&self.job_name, &self.build_number) {
            (Some(job), Some(build)) => Some((job.as_str(), build.as_str())),
            _ => None,
        }
    }

    /// Link to the console log of the current build, or `unknown`.
    pub fn debug_log_url(&self) -> String {
        match &self.build_url {
            Some(url) => format!("{url}/console"),
            None => "unknown".to_string(),
        }
    }

    /// Footer line pointing at the project page; empty when unset.
    pub fn project_page_line(&self) -> String {
        match &self.project_url {
            Some(url) => format!("CI Project page: {url}"),
            None => String::new(),
        }
    }

    /// HTML link to the project page, or its plain label.
    pub fn project_link(&self) -> String {
        html_link(self.project_url.as_deref(), "Platform CI Project")
    }
}

/// `<a href="url">label</a>` when a URL is known, the bare label otherwise.
pub(crate) fn html_link(url: Option<&str>, label: &str) -> String {
    match url {
        Some(url) => format!(r#"<a href="{url}">{label}</a>"#),
        None => label.to_string(),
    }
}
