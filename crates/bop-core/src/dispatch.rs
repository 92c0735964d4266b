//! Commit dispatch policy.
//!
//! Decides, for one pushed commit, which targets (if any) should be built and
//! records a human-readable outcome for the reporting side.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::branch::{BranchClassifier, BranchName, BranchType, BuildTarget};
use crate::config::{join_targets, BranchConfig};
use crate::error::Result;
use crate::jobs::WorkerJob;
use crate::obs;
use crate::resolver::BuildTargetResolver;

/// A commit pushed to a monitored dist-git repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub branch: BranchName,
    pub hash: Option<String>,
    pub description: Option<String>,
}

impl Commit {
    pub fn new(branch: impl Into<BranchName>) -> Self {
        Self {
            branch: branch.into(),
            hash: None,
            description: None,
        }
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Why a branch is (or is not) built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchReason {
    /// Staging and private staging branches are always built.
    StagingBranch,
    /// The branch carries a `ci.yaml` file.
    BranchConfig,
    /// Neither: nothing is built.
    NotHandled,
}

/// Summary of one dispatch decision, consumed by the reporting side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub branch: BranchName,
    pub branch_type: BranchType,
    pub commit_hash: Option<String>,
    pub targets: Vec<BuildTarget>,
    pub description: Option<String>,
}

impl OutcomeRecord {
    pub fn triggered(&self) -> bool {
        !self.targets.is_empty()
    }

    /// Plain-text rendering, one fact per line.
    pub fn render_text(&self) -> String {
        let mut lines = vec![format!("Dist-git branch: {} ({} branch)", self.branch, self.branch_type)];
        if let Some(hash) = &self.commit_hash {
            lines.push(format!("Commit: {hash}"));
        }
        if self.triggered() {
            lines.push(format!("Triggered targets: {}", join_targets(&self.targets)));
        } else {
            lines.push(format!("No brew build was issued ({} is not handled by CI)", self.branch));
        }
        if let Some(description) = &self.description {
            lines.push("Commit description:".to_string());
            lines.extend(description.lines().map(str::to_string));
        }
        lines.join("\n")
    }

    /// HTML fragment used as the dispatcher build description, linking the
    /// triggered worker job on `jenkins_url`.
    pub fn render_html(&self, jenkins_url: &str, component: &str) -> String {
        let mut lines = vec![format!(
            "<strong>Dist-git branch</strong>: {} ({} branch)",
            self.branch, self.branch_type
        )];

        if let Some(hash) = &self.commit_hash {
            lines.push(format!("<strong>Commit:</strong> {hash}"));
        }

        if self.triggered() {
            let worker = WorkerJob::job_name(component, self.branch.as_str());
            lines.push(format!(
                r#"<strong>Triggered job: </strong><a href="{jenkins_url}/job/{worker}">Worker job for branch {}</a>"#,
                self.branch
            ));
        } else {
            lines.push(format!(
                "<strong>No brew build was issued</strong> ({} is not handled by CI)",
                self.branch
            ));
        }

        if let Some(description) = &self.description {
            lines.push("<hr/><strong>Commit description:</strong>".to_string());
            lines.extend(description.split('\n').map(str::to_string));
        }

        format!("<p>{}</p>", lines.join("<br>"))
    }
}

/// Result of [`CommitDispatchPolicy::consider`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchDecision {
    pub reason: DispatchReason,
    pub targets: Vec<BuildTarget>,
    pub outcome: OutcomeRecord,
}

pub struct CommitDispatchPolicy;

impl CommitDispatchPolicy {
    /// Decide which targets to build for a commit.
    ///
    /// An empty target list is a valid outcome, not an error.
    pub fn consider(commit: &Commit, config: Option<&BranchConfig>) -> Result<DispatchDecision> {
        let name = commit.branch.as_str();
        let branch_type = BranchClassifier::classify(name);

        let (reason, targets) = if branch_type.is_staging() {
            info!(branch = %name, "Branch should be built: it is a staging branch");
            let targets = BuildTargetResolver::resolve(branch_type, name, config)?;
            (DispatchReason::StagingBranch, targets)
        } else if let Some(config) = config {
            info!(branch = %name, "Branch should be built: it contains a 'ci.yaml' file");
            let targets = BuildTargetResolver::resolve(branch_type, name, Some(config))?;
            info!(targets = %join_targets(&targets), "Targets from config file");
            (DispatchReason::BranchConfig, targets)
        } else {
            warn!(branch = %name, "Branch is not a staging branch and 'ci.yaml' file was not found");
            warn!(branch = %name, "Branch should not be built");
            (DispatchReason::NotHandled, Vec::new())
        };

        obs::emit_dispatch_decided(name, branch_type.label(), targets.len());

        let outcome = OutcomeRecord {
            branch: commit.branch.clone(),
            branch_type,
            commit_hash: commit.hash.clone(),
            targets: targets.clone(),
            description: commit.description.clone(),
        };

        Ok(DispatchDecision {
            reason,
            targets,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_branch_without_config() {
        let decision = CommitDispatchPolicy::consider(&Commit::new("rhel-7.1-staging"), None).unwrap();
        assert_eq!(decision.reason, DispatchReason::StagingBranch);
        assert_eq!(decision.targets, vec![BuildTarget::from("rhel-7.1-candidate")]);
        assert_eq!(decision.outcome.branch_type, BranchType::Staging);
    }

    #[test]
    fn test_private_branch_without_config_is_not_handled() {
        let decision = CommitDispatchPolicy::consider(&Commit::new("john-feature-branch"), None).unwrap();
        assert_eq!(decision.reason, DispatchReason::NotHandled);
        assert!(decision.targets.is_empty());
        assert!(!decision.outcome.triggered());
    }

    #[test]
    fn test_private_branch_with_config_builds_declared_targets() {
        let config = BranchConfig::new(["test-1-target", "test-2-target"]);
        let decision =
            CommitDispatchPolicy::consider(&Commit::new("john-feature-branch"), Some(&config)).unwrap();
        assert_eq!(decision.reason, DispatchReason::BranchConfig);
        assert_eq!(decision.targets, config.targets);
        assert_eq!(decision.outcome.branch_type, BranchType::Private);
    }

    #[test]
    fn test_render_html_not_handled() {
        let commit = Commit::new("john-feature-branch")
            .with_hash("abc123")
            .with_description("Fix build\n\nResolves: BZ1");
        let decision = CommitDispatchPolicy::consider(&commit, None).unwrap();

        let html = decision.outcome.render_html("https://jenkins", "bash");
        assert_eq!(
            html,
            "<p><strong>Dist-git branch</strong>: john-feature-branch (private branch)<br>\
             <strong>Commit:</strong> abc123<br>\
             <strong>No brew build was issued</strong> (john-feature-branch is not handled by CI)<br>\
             <hr/><strong>Commit description:</strong><br>Fix build<br><br>Resolves: BZ1</p>"
        );
    }

    #[test]
    fn test_render_html_links_worker_job() {
        let decision = CommitDispatchPolicy::consider(&Commit::new("rhel-7.3-staging"), None).unwrap();
        let html = decision.outcome.render_html("https://jenkins", "bash");
        assert!(html.contains(
            r#"<a href="https://jenkins/job/ci-bash-commit-rhel-7.3-staging">Worker job for branch rhel-7.3-staging</a>"#
        ));
        assert!(html.contains("(staging branch)"));
        assert!(!html.contains("Commit:"));
    }

    #[test]
    fn test_render_text() {
        let commit = Commit::new("private-jdoe-rhel-7.3-staging").with_hash("abc");
        let decision = CommitDispatchPolicy::consider(&commit, None).unwrap();
        let text = decision.outcome.render_text();
        assert!(text.contains("(private staging branch)"));
        assert!(text.contains("Commit: abc"));
        assert!(text.contains("Triggered targets: rhel-7.3-candidate"));
    }
}
