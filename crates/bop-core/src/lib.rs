//! Build-on-Push Core Library
//!
//! Automated scratch builds for dist-git branches: pushed branches are
//! classified, mapped to Brew build targets, and built through Jenkins jobs.
//!
//! - [`branch`] / [`resolver`] / [`config`] - which targets a branch builds
//! - [`dispatch`] / [`commit_ci`] - per-commit decisions and Jenkins jobs
//! - [`attempts`] / [`executor`] / [`committer`] - concurrent scratch builds
//! - [`report`] - operator notifications

pub mod attempts;
pub mod branch;
pub mod commit_ci;
pub mod committer;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod fakes;
pub mod jobs;
pub mod obs;
pub mod report;
pub mod resolver;
pub mod scheduler;
pub mod settings;
pub mod telemetry;

pub use attempts::{AttemptState, BuildAttempt, BuildAttemptSet};
pub use branch::{BranchClassifier, BranchName, BranchType, BuildTarget};
pub use commit_ci::{CommitCi, TARGETS_PARAMETER};
pub use committer::{CommitterStore, FsCommitterStore, MemoryCommitterStore};
pub use config::{join_targets, split_targets, BranchConfig};
pub use dispatch::{Commit, CommitDispatchPolicy, DispatchDecision, DispatchReason, OutcomeRecord};
pub use error::{BopError, Result};
pub use executor::{BuildExecutor, BuildOutcome, RhpkgExecutor};
pub use jobs::{CiSource, DispatcherJob, Job, JobDefinition, WorkerJob};
pub use report::{BuildReport, ErrorReport};
pub use resolver::BuildTargetResolver;
pub use scheduler::{JenkinsCli, JobScheduler};
pub use settings::CiSettings;
pub use telemetry::init_tracing;
