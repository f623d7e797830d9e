//! Core domain types for versioner.
//!
//! This crate provides the types shared across the versioner workspace:
//! build types and the intents they are resolved from, publication
//! descriptors, the [`Reporter`] seam, and the error taxonomy every
//! configuration step reports.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Release channel of a single build.
///
/// Declaration order is significant: conflicting intents are reported in
/// this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildType {
    /// Local developer build
    #[default]
    Dev,
    /// Timestamped snapshot build
    Snapshot,
    /// Milestone build with a qualifier
    Milestone,
    /// Final release build
    Release,
}

impl BuildType {
    /// All build types in declaration order.
    pub const ALL: [BuildType; 4] = [
        BuildType::Dev,
        BuildType::Snapshot,
        BuildType::Milestone,
        BuildType::Release,
    ];

    /// Whether this build publishes to the snapshot repository.
    pub fn is_snapshot(self) -> bool {
        self == BuildType::Snapshot
    }
}

impl std::fmt::Display for BuildType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildType::Dev => write!(f, "Dev"),
            BuildType::Snapshot => write!(f, "Snapshot"),
            BuildType::Milestone => write!(f, "Milestone"),
            BuildType::Release => write!(f, "Release"),
        }
    }
}

/// The boolean build-type intents supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BuildIntents {
    pub release: bool,
    pub milestone: bool,
    pub snapshot: bool,
}

impl BuildIntents {
    /// Build types selected by these intents, in declaration order.
    pub fn enabled(&self) -> Vec<BuildType> {
        let mut enabled = Vec::new();
        if self.snapshot {
            enabled.push(BuildType::Snapshot);
        }
        if self.milestone {
            enabled.push(BuildType::Milestone);
        }
        if self.release {
            enabled.push(BuildType::Release);
        }
        enabled
    }

    /// Resolve the intents to exactly one build type.
    ///
    /// No intent selects [`BuildType::Dev`]; more than one is a
    /// [`ReleaseError::ConflictingBuildTypes`].
    pub fn resolve(&self) -> Result<BuildType, ReleaseError> {
        let enabled = self.enabled();
        match enabled.as_slice() {
            [] => Ok(BuildType::Dev),
            [single] => Ok(*single),
            _ => Err(ReleaseError::ConflictingBuildTypes { types: enabled }),
        }
    }
}

/// Classification of a publication for upload lifecycle grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicationKind {
    /// The primary publication of a project
    Main,
    /// Auxiliary publications (native/JNI variants)
    Other,
}

impl std::fmt::Display for PublicationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublicationKind::Main => write!(f, "main"),
            PublicationKind::Other => write!(f, "other"),
        }
    }
}

/// A publication declared by a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    /// Publication name (e.g. "main", "linux-amd64")
    pub name: String,
    /// Explicit classification; left to the publication rules when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<PublicationKind>,
}

impl Publication {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: PublicationKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

/// Sink for operator-facing messages emitted while configuring a build.
pub trait Reporter {
    fn info(&mut self, msg: &str);
    fn warn(&mut self, msg: &str);
    fn error(&mut self, msg: &str);
}

/// Fatal configuration errors. None of these are retried.
#[derive(Debug, thiserror::Error)]
pub enum ReleaseError {
    #[error("Cannot build {} in same build.", join_types(.types))]
    ConflictingBuildTypes { types: Vec<BuildType> },

    #[error("Next version not specified.")]
    MissingVersion,

    #[error("Next milestone not specified.")]
    MissingMilestone,

    #[error("build receipt {} does not contain a buildTimestamp", .path.display())]
    MissingTimestamp { path: PathBuf },

    #[error("failed to access build receipt {}", .path.display())]
    ReceiptIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("task '{name}' not found")]
    UnknownTask { name: String },

    #[error("upload task '{task}' is shared by a main and a non-main publication")]
    ConflictingUploadTask { task: String },

    #[error("repository credentials missing: {}", .missing.join(", "))]
    MissingCredentials { missing: Vec<String> },
}

fn join_types(types: &[BuildType]) -> String {
    types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" and ")
}
