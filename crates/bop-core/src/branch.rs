//! Dist-git branch classification.
//!
//! Everything here works over branch *names* only: no clone of, or access
//! to, a dist-git repository is needed.
//!
//! Four branch types are recognised:
//! - standard: `rhel-7.3`, `extras-rhel-7.2`, `rhscl-2.1-rh-ruby22-rhel-7`
//! - staging: a standard name with a `-staging` suffix, e.g. `rhel-7.3-staging`
//! - private staging: `private-<anything->` followed by a staging name, with an
//!   optional trailing suffix, e.g. `private-jdoe-rhel-7.3-staging-BZ123456`
//! - private: any other name

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{BopError, Result};

/// Optional `extras-` or software-collection prefix followed by `rhel-<major>[.<minor>]`.
const BASE_PATTERN: &str = r"(?:extras-|rhscl-\d\.\d-rh-\w+?-)?rhel-\d(?:\.\d)?";

static STANDARD_BRANCH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^(?P<st_branch>{BASE_PATTERN})$")).unwrap());

static STAGING_BRANCH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^(?P<st_branch>{BASE_PATTERN}-staging)$")).unwrap());

// Only a private staging branch may carry a trailing suffix.
static PRIVATE_STAGING_BRANCH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^private-[\w-]*?(?P<st_branch>{BASE_PATTERN}-staging)"
    ))
    .unwrap()
});

const PRIVATE_PREFIX: &str = "private-";

/// Type of a dist-git branch, derived from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchType {
    Standard,
    Staging,
    Private,
    PrivateStaging,
}

impl BranchType {
    /// Human label used in build descriptions and reports.
    pub fn label(&self) -> &'static str {
        match self {
            BranchType::Standard => "standard",
            BranchType::Staging => "staging",
            BranchType::Private => "private",
            BranchType::PrivateStaging => "private staging",
        }
    }

    /// Staging and private staging branches are always built.
    pub fn is_staging(&self) -> bool {
        matches!(self, BranchType::Staging | BranchType::PrivateStaging)
    }
}

impl fmt::Display for BranchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Name of a dist-git branch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchName(String);

impl BranchName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shorthand for [`BranchClassifier::classify`].
    pub fn branch_type(&self) -> BranchType {
        BranchClassifier::classify(&self.0)
    }

    /// Shorthand for [`BranchClassifier::staging_target`].
    pub fn staging_target(&self) -> Result<BuildTarget> {
        BranchClassifier::staging_target(&self.0)
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BranchName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for BranchName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Name of a Brew build target, e.g. `rhel-7.3-candidate`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildTarget(String);

impl BuildTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BuildTarget {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for BuildTarget {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Branch name classifier.
pub struct BranchClassifier;

impl BranchClassifier {
    /// Returns the type of a branch. The staging patterns are tried first.
    pub fn classify(name: &str) -> BranchType {
        if Self::staging_base(name).is_some() {
            if name.starts_with(PRIVATE_PREFIX) {
                BranchType::PrivateStaging
            } else {
                BranchType::Staging
            }
        } else if STANDARD_BRANCH.is_match(name) {
            BranchType::Standard
        } else {
            BranchType::Private
        }
    }

    /// Computes the Brew target associated with a staging or standard branch.
    ///
    /// `rhel-7.3-staging` -> `rhel-7.3-candidate`, `extras-rhel-7.2` ->
    /// `extras-rhel-7.2-candidate`. A private staging branch uses the
    /// embedded staging name; its prefix and suffix are ignored.
    ///
    /// A major-only staging branch such as `rhel-6-staging` maps textually to
    /// `rhel-6-candidate` rather than to the latest minor release target.
    pub fn staging_target(name: &str) -> Result<BuildTarget> {
        if let Some(base) = Self::staging_base(name) {
            return Ok(BuildTarget::new(base.replace("staging", "candidate")));
        }

        if let Some(captures) = STANDARD_BRANCH.captures(name) {
            return Ok(BuildTarget::new(format!("{}-candidate", &captures["st_branch"])));
        }

        Err(BopError::NotStagingOrStandard {
            branch: name.to_string(),
        })
    }

    /// The embedded staging branch name, if `name` is a (private) staging branch.
    fn staging_base(name: &str) -> Option<&str> {
        STAGING_BRANCH
            .captures(name)
            .or_else(|| PRIVATE_STAGING_BRANCH.captures(name))
            .and_then(|captures| captures.name("st_branch"))
            .map(|m| m.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_branch() {
        assert_eq!(BranchClassifier::classify("rhel-7.1-staging"), BranchType::Staging);
        assert_eq!(
            BranchClassifier::staging_target("rhel-7.1-staging").unwrap(),
            BuildTarget::from("rhel-7.1-candidate")
        );
    }

    #[test]
    fn test_extras_staging_branch() {
        assert_eq!(BranchClassifier::classify("extras-rhel-7.2-staging"), BranchType::Staging);
        assert_eq!(
            BranchClassifier::staging_target("extras-rhel-7.2-staging").unwrap().as_str(),
            "extras-rhel-7.2-candidate"
        );
    }

    #[test]
    fn test_standard_branch() {
        assert_eq!(BranchClassifier::classify("extras-rhel-7.2"), BranchType::Standard);
        assert_eq!(BranchClassifier::classify("rhel-7.3"), BranchType::Standard);
        assert_eq!(
            BranchClassifier::staging_target("extras-rhel-7.2").unwrap().as_str(),
            "extras-rhel-7.2-candidate"
        );
    }

    #[test]
    fn test_private_branch() {
        assert_eq!(BranchClassifier::classify("private-pmuller-branch"), BranchType::Private);
        assert_eq!(BranchClassifier::classify("john-feature-branch"), BranchType::Private);
        let err = BranchClassifier::staging_target("private-pmuller-branch").unwrap_err();
        assert!(matches!(err, BopError::NotStagingOrStandard { .. }));
    }

    #[test]
    fn test_suffix_requires_private_prefix() {
        assert_eq!(BranchClassifier::classify("rhel-7.3-staging-BZ1"), BranchType::Private);
        assert_eq!(BranchClassifier::classify("rhel-7.3-foo"), BranchType::Private);
        assert!(BranchClassifier::staging_target("rhel-7.3-staging-BZ1").is_err());
    }

    #[test]
    fn test_rhscl_staging_branches() {
        for branch in [
            "rhscl-2.1-rh-ruby22-rhel-6-staging",
            "rhscl-2.1-rh-ruby22-rhel-7-staging",
            "rhscl-2.1-rh-mariadb100-rhel-6-staging",
            "rhscl-2.1-rh-mariadb100-rhel-7-staging",
        ] {
            assert_eq!(BranchClassifier::classify(branch), BranchType::Staging, "{branch}");
            assert_eq!(
                BranchClassifier::staging_target(branch).unwrap().as_str(),
                branch.replace("staging", "candidate")
            );
        }
    }

    #[test]
    fn test_private_rhscl_staging_branches() {
        let cases = [
            ("private-johnfoo-rhscl-2.1-rh-ruby22-rhel-6-staging", "rhscl-2.1-rh-ruby22-rhel-6-candidate"),
            ("private-johnfoo-rhscl-2.1-rh-ruby22-rhel-7-staging-BZ123456", "rhscl-2.1-rh-ruby22-rhel-7-candidate"),
            ("private-rhscl-2.1-rh-mariadb100-rhel-6-staging-BZ654321", "rhscl-2.1-rh-mariadb100-rhel-6-candidate"),
            ("private-jo-fo-rhscl-2.1-rh-mariadb100-rhel-7-staging-bar-baz", "rhscl-2.1-rh-mariadb100-rhel-7-candidate"),
        ];

        for (branch, target) in cases {
            assert_eq!(BranchClassifier::classify(branch), BranchType::PrivateStaging, "{branch}");
            assert_eq!(BranchClassifier::staging_target(branch).unwrap().as_str(), target);
        }
    }

    #[test]
    fn test_private_staging_branches() {
        let cases = [
            ("private-johnfoo-rhel-7.3-staging", "rhel-7.3-candidate"),
            ("private-johnfoo-rhel-7.3-staging-BZ123456", "rhel-7.3-candidate"),
            ("private-rhel-6.8-staging-BZ654321", "rhel-6.8-candidate"),
            ("private-jo-fo-rhel-6.8-staging-bar-baz", "rhel-6.8-candidate"),
            ("private-johnfoo-extras-rhel-7.3-staging", "extras-rhel-7.3-candidate"),
            ("private-johnfoo-extras-rhel-7.3-staging-BZ123456", "extras-rhel-7.3-candidate"),
            ("private-extras-rhel-6.8-staging-BZ654321", "extras-rhel-6.8-candidate"),
            ("private-jo-fo-extras-rhel-6.8-staging-bar-baz", "extras-rhel-6.8-candidate"),
        ];

        for (branch, target) in cases {
            assert_eq!(BranchClassifier::classify(branch), BranchType::PrivateStaging, "{branch}");
            assert_eq!(BranchClassifier::staging_target(branch).unwrap().as_str(), target);
        }
    }

    #[test]
    fn test_major_only_staging_is_textual() {
        assert_eq!(
            BranchClassifier::staging_target("rhel-6-staging").unwrap().as_str(),
            "rhel-6-candidate"
        );
    }

    #[test]
    fn test_branch_type_labels() {
        assert_eq!(BranchType::PrivateStaging.to_string(), "private staging");
        assert_eq!(BranchType::Standard.to_string(), "standard");
        assert!(BranchType::Staging.is_staging());
        assert!(!BranchType::Private.is_staging());
    }

    #[test]
    fn test_branch_name_shorthands() {
        let name = BranchName::from("rhel-7.3-staging");
        assert_eq!(name.branch_type(), BranchType::Staging);
        assert_eq!(name.staging_target().unwrap().as_str(), "rhel-7.3-candidate");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn staging_target_exists_unless_private(name in "[a-z0-9.-]{0,40}") {
                let private = BranchClassifier::classify(&name) == BranchType::Private;
                prop_assert_eq!(BranchClassifier::staging_target(&name).is_ok(), !private);
            }

            #[test]
            fn classification_is_repeatable(name in "[a-zA-Z0-9._-]{0,40}") {
                prop_assert_eq!(BranchClassifier::classify(&name), BranchClassifier::classify(&name));

                let first = BranchClassifier::staging_target(&name).map_err(|e| e.to_string());
                let second = BranchClassifier::staging_target(&name).map_err(|e| e.to_string());
                prop_assert_eq!(first, second);
            }

            #[test]
            fn private_staging_ignores_prefix_and_suffix(
                owner in "[a-z]{1,8}",
                major in 5_u8..10,
                minor in 0_u8..10,
                suffix in proptest::option::of("-[A-Za-z0-9]{1,8}"),
            ) {
                // An owner ending in "extras" would be read as part of the staging name.
                prop_assume!(!owner.ends_with("extras"));
                let name = format!(
                    "private-{owner}-rhel-{major}.{minor}-staging{}",
                    suffix.unwrap_or_default()
                );
                prop_assert_eq!(BranchClassifier::classify(&name), BranchType::PrivateStaging);
                let target = BranchClassifier::staging_target(&name).unwrap();
                prop_assert_eq!(target.as_str(), format!("rhel-{major}.{minor}-candidate"));
            }

            #[test]
            fn standard_target_appends_candidate(major in 5_u8..10, minor in 0_u8..10) {
                let name = format!("extras-rhel-{major}.{minor}");
                prop_assert_eq!(BranchClassifier::classify(&name), BranchType::Standard);
                prop_assert_eq!(
                    BranchClassifier::staging_target(&name).unwrap().to_string(),
                    format!("{name}-candidate")
                );
            }
        }
    }
}
