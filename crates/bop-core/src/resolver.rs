//! Build target resolution.
//!
//! Staging branches always build in their own candidate target, on top of
//! whatever their `ci.yaml` declares. Every other branch builds exactly what
//! its `ci.yaml` declares, or nothing at all.

use crate::branch::{BranchClassifier, BranchType, BuildTarget};
use crate::config::BranchConfig;
use crate::error::Result;

pub struct BuildTargetResolver;

impl BuildTargetResolver {
    /// Resolve the ordered list of targets to build for a branch.
    ///
    /// Fails only if a staging type is paired with a name that carries no
    /// staging target, which cannot happen for a type produced by
    /// [`BranchClassifier::classify`].
    pub fn resolve(
        branch_type: BranchType,
        branch_name: &str,
        config: Option<&BranchConfig>,
    ) -> Result<Vec<BuildTarget>> {
        if branch_type.is_staging() {
            let mut targets = config.map(|c| c.targets.clone()).unwrap_or_default();
            let staging_target = BranchClassifier::staging_target(branch_name)?;
            tracing::info!(staging_target = %staging_target, "Staging target");

            if !targets.contains(&staging_target) {
                targets.push(staging_target);
            }
            return Ok(targets);
        }

        Ok(config.map(|c| c.targets.clone()).unwrap_or_default())
    }
}
