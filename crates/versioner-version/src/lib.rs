//! Build version calculation for versioner.
//!
//! The version of a build depends on facts that may only be supplied after
//! every project has been handed its version object, so the version is a
//! deferred value: [`VersionCalculator::render`] computes it on first use and
//! returns the memoized string from then on.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use versioner_receipt::BuildTimestamp;
//! use versioner_types::BuildType;
//! use versioner_version::{VersionCalculator, VersionDetails};
//!
//! let details = VersionDetails::new();
//! let calculator = Arc::new(VersionCalculator::new(
//!     details.clone(),
//!     BuildType::Snapshot,
//!     BuildTimestamp::from("20240101120000+0000"),
//! ));
//!
//! // Facts may arrive after the calculator is shared.
//! details.set_next_version("1.2");
//!
//! assert_eq!(calculator.render().unwrap(), "1.2-snapshot-20240101120000+0000");
//! ```

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use versioner_receipt::BuildTimestamp;
use versioner_types::{BuildType, ReleaseError};

/// Plain version facts as supplied by configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionFacts {
    /// The version being worked towards (e.g. "1.2")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_version: Option<String>,
    /// Milestone qualifier (e.g. "3")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_snapshot: Option<String>,
    /// Build against the authenticated remote repository
    #[serde(default)]
    pub use_repo: bool,
}

/// Shared, mutable handle to the version facts of a build.
///
/// Clones observe the same facts.
#[derive(Debug, Clone, Default)]
pub struct VersionDetails {
    facts: Arc<RwLock<VersionFacts>>,
}

impl VersionDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_facts(facts: VersionFacts) -> Self {
        Self {
            facts: Arc::new(RwLock::new(facts)),
        }
    }

    /// Copy of the current facts.
    pub fn facts(&self) -> VersionFacts {
        self.facts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn next_version(&self) -> Option<String> {
        self.facts().next_version
    }

    pub fn next_snapshot(&self) -> Option<String> {
        self.facts().next_snapshot
    }

    pub fn use_repo(&self) -> bool {
        self.facts().use_repo
    }

    pub fn set_next_version(&self, version: impl Into<String>) {
        self.update(|facts| facts.next_version = Some(version.into()));
    }

    pub fn set_next_snapshot(&self, qualifier: impl Into<String>) {
        self.update(|facts| facts.next_snapshot = Some(qualifier.into()));
    }

    pub fn set_use_repo(&self, use_repo: bool) {
        self.update(|facts| facts.use_repo = use_repo);
    }

    fn update(&self, f: impl FnOnce(&mut VersionFacts)) {
        let mut facts = self.facts.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut facts);
    }
}

/// Compute the version string for a build type.
pub fn compute_version(
    facts: &VersionFacts,
    build_type: BuildType,
    timestamp: &BuildTimestamp,
) -> Result<String, ReleaseError> {
    let next_version = facts
        .next_version
        .as_deref()
        .ok_or(ReleaseError::MissingVersion)?;

    let version = match build_type {
        BuildType::Release => next_version.to_string(),
        BuildType::Milestone => {
            let qualifier = facts
                .next_snapshot
                .as_deref()
                .ok_or(ReleaseError::MissingMilestone)?;
            format!("{next_version}-milestone-{qualifier}")
        }
        BuildType::Snapshot => format!("{next_version}-snapshot-{timestamp}"),
        BuildType::Dev => format!("{next_version}-dev"),
    };
    Ok(version)
}

/// Deferred, memoized version of a build.
///
/// One instance is constructed per build and shared (behind an `Arc`) by
/// every project. The first successful [`render`](Self::render) fixes the
/// version; failures are not memoized.
#[derive(Debug)]
pub struct VersionCalculator {
    details: VersionDetails,
    build_type: BuildType,
    timestamp: BuildTimestamp,
    version: Mutex<Option<String>>,
}

impl VersionCalculator {
    pub fn new(details: VersionDetails, build_type: BuildType, timestamp: BuildTimestamp) -> Self {
        Self {
            details,
            build_type,
            timestamp,
            version: Mutex::new(None),
        }
    }

    /// Resolve the version now, computing it at most once.
    pub fn render(&self) -> Result<String, ReleaseError> {
        // Held across the computation so concurrent first renders never compute twice.
        let mut memo = self.version.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(version) = memo.as_ref() {
            return Ok(version.clone());
        }

        let version = compute_version(&self.details.facts(), self.build_type, &self.timestamp)?;
        *memo = Some(version.clone());
        Ok(version)
    }

    /// The memoized version, if it has been rendered.
    pub fn cached(&self) -> Option<String> {
        self.version
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn build_type(&self) -> BuildType {
        self.build_type
    }

    pub fn timestamp(&self) -> &BuildTimestamp {
        &self.timestamp
    }

    pub fn details(&self) -> &VersionDetails {
        &self.details
    }
}
