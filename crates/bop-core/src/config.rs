//! Per-branch `ci.yaml` control file.
//!
//! Developers can commit a `ci.yaml` file to a branch to ask for that branch
//! to be built automatically:
//!
//! ```yaml
//! auto-build:
//!   targets:
//!     - rhel-7.3-candidate
//!     - extras-rhel-7.3-candidate
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::branch::BuildTarget;
use crate::error::{BopError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(rename = "auto-build")]
    auto_build: AutoBuild,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AutoBuild {
    targets: Vec<BuildTarget>,
}

/// Targets declared by a branch's `ci.yaml` file, in file order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchConfig {
    pub targets: Vec<BuildTarget>,
}

impl BranchConfig {
    /// Name of the control file at the root of a branch tree.
    pub const FILE_NAME: &'static str = "ci.yaml";

    pub fn new(targets: impl IntoIterator<Item = impl Into<BuildTarget>>) -> Self {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse the contents of a control file.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let file: ConfigFile = serde_yaml::from_str(content)?;
        Ok(Self {
            targets: file.auto_build.targets,
        })
    }

    /// Read and parse a control file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content).map_err(|e| BopError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Look for the control file in a checked-out branch tree.
    ///
    /// A missing file is not an error: the branch simply has no config.
    pub fn discover(tree_root: &Path) -> Result<Option<Self>> {
        let path = tree_root.join(Self::FILE_NAME);
        if !path.is_file() {
            tracing::debug!(path = %path.display(), "No branch config file");
            return Ok(None);
        }

        tracing::info!(path = %path.display(), "Config file is present in the branch");
        Self::from_path(&path).map(Some)
    }

    /// Space-separated target list, as passed to worker jobs.
    pub fn joined_targets(&self) -> String {
        join_targets(&self.targets)
    }
}

/// Join targets with single spaces.
pub fn join_targets(targets: &[BuildTarget]) -> String {
    targets
        .iter()
        .map(BuildTarget::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a space-separated target list, skipping empty items.
pub fn split_targets(joined: &str) -> Vec<BuildTarget> {
    joined.split_whitespace().map(BuildTarget::from).collect()
}
