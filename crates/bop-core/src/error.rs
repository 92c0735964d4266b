//! Error types for Build-on-Push operations

use std::path::PathBuf;

use thiserror::Error;

/// Headers opening an operator notification, chosen by the class of error.
pub mod headers {
    pub const GENERIC_CI: &str = "An error has occurred and the desired action was not performed correctly. \
                                  Please contact the administrators of this CI instance.";
    pub const CONTACTS_CI: &str = "An error has occurred and no tests were reliably executed. ";
    pub const BREW_BUILD: &str = "There was a problem during a Brew build attempt. ";
    pub const DIST_GIT: &str = "There was a problem with dist-git manipulation. ";
    pub const JENKINS: &str = "An error has occurred while communicating with Jenkins. ";
}

/// Errors produced by the Build-on-Push core.
#[derive(Error, Debug)]
pub enum BopError {
    /// A staging target was requested for a branch that is neither staging nor standard.
    #[error("{branch} is not a staging or standard branch")]
    NotStagingOrStandard { branch: String },

    /// Aggregate results were queried while attempts were still outstanding.
    #[error("build results queried before all attempts completed ({pending} still pending)")]
    AttemptsNotComplete { pending: usize },

    /// `start` was called on an attempt set that already issued its builds.
    #[error("build attempts were already started")]
    DuplicateStart,

    /// A build target name that cannot be used as a log file name.
    #[error("invalid build target name: {target:?}")]
    InvalidTarget { target: String },

    /// Builds were started outside a Tokio runtime.
    #[error("build attempts must be started from within a Tokio runtime")]
    NoRuntime,

    /// The branch config file exists but does not have the expected shape.
    #[error("invalid branch config {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    #[error("failed to parse branch config: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// A setting required for the requested operation is unset.
    #[error("{name} not set: cannot {purpose}")]
    MissingSetting {
        name: &'static str,
        purpose: &'static str,
    },

    /// The job scheduler rejected a request or could not be reached.
    #[error("{operation} failed for job {job}: {detail}")]
    Scheduler {
        operation: &'static str,
        job: String,
        detail: String,
    },

    /// The build execution service could not run a build.
    #[error("build execution failed for target {target}: {detail}")]
    Execution { target: String, detail: String },

    #[error("committer store error: {0}")]
    Store(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BopError {
    /// Notification header matching the class of this error.
    pub fn header(&self) -> &'static str {
        match self {
            BopError::NotStagingOrStandard { .. }
            | BopError::InvalidTarget { .. }
            | BopError::Config { .. }
            | BopError::ConfigParse(_) => headers::DIST_GIT,
            BopError::Execution { .. } | BopError::AttemptsNotComplete { .. } | BopError::DuplicateStart => {
                headers::BREW_BUILD
            }
            BopError::Scheduler { .. } => headers::JENKINS,
            BopError::MissingSetting { .. } | BopError::NoRuntime | BopError::Store(_) | BopError::Io(_) => {
                headers::CONTACTS_CI
            }
        }
    }
}

/// Result type for Build-on-Push operations
pub type Result<T> = std::result::Result<T, BopError>;
