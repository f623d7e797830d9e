//! # Versioner
//!
//! Build type resolution and snapshot versioning for multi-project builds.
//!
//! A build is configured exactly once. Versioner decides what kind of build
//! is running, fixes the build timestamp, renders one version string shared by
//! every project, and wires each project's per-publication upload tasks under
//! two lifecycle tasks.
//!
//! ## Features
//!
//! - **Build type resolution** - at most one of release, milestone or snapshot
//!   may be requested; none means a dev build.
//! - **Reproducible timestamps** - snapshot builds write a `build-receipt.properties`
//!   file, and a later stage that receives it under `incoming-distributions/`
//!   replays the same timestamp instead of minting a new one.
//! - **Deferred versions** - the version is rendered on first use, after every
//!   project had a chance to amend the version facts, then memoized.
//! - **Upload lifecycle** - `uploadMain` and `uploadJni` aggregate the upload
//!   tasks of the main and the native publications.
//!
//! ## Pipeline
//!
//! 1. [`BuildContext::configure`] resolves the build type, determines the
//!    timestamp and, for snapshot builds, persists the receipt.
//! 2. [`BuildContext::configure_project`] attaches the shared version, the
//!    remote repository and the lifecycle tasks to one project.
//! 3. [`BuildContext::plan`] does this for every project and renders the version.
//!
//! ## Example
//!
//! ```
//! use versioner::version::VersionFacts;
//! use versioner::{BuildContext, BuildIntents, BuildOptions, Reporter};
//!
//! struct Quiet;
//! impl Reporter for Quiet {
//!     fn info(&mut self, _: &str) {}
//!     fn warn(&mut self, _: &str) {}
//!     fn error(&mut self, _: &str) {}
//! }
//!
//! let root = tempfile::tempdir().expect("tempdir");
//! let opts = BuildOptions {
//!     root: root.path().to_path_buf(),
//!     intents: BuildIntents { release: true, ..Default::default() },
//!     ignore_incoming_build_receipt: false,
//!     versions: VersionFacts {
//!         next_version: Some("1.2".to_string()),
//!         ..Default::default()
//!     },
//! };
//!
//! let ctx = BuildContext::configure(&opts, &mut Quiet).expect("configure");
//! assert_eq!(ctx.version().render().expect("render"), "1.2");
//! ```
//!
//! ## Modules
//!
//! - [`context`] - Build-wide configuration and per-project wiring
//! - [`repository`] - Remote repository selection
//! - [`receipt`] - Build receipt codec and timestamp decision
//! - [`version`] - Version facts and the memoized calculator
//! - [`upload`] - Task graph and upload lifecycle aggregation
//! - [`auth`] - Repository credential resolution
//! - [`config`] - Configuration file (`.versioner.toml`) loading and merging

/// Build-wide configuration and per-project wiring.
pub mod context;

/// Remote repository selection.
pub mod repository;

/// Build receipt codec and timestamp decision.
/// Re-exported from versioner-receipt microcrate.
pub use versioner_receipt as receipt;

/// Version facts and the memoized calculator.
/// Re-exported from versioner-version microcrate.
pub use versioner_version as version;

/// Task graph and upload lifecycle aggregation.
/// Re-exported from versioner-upload microcrate.
pub use versioner_upload as upload;

/// Repository credentials.
/// Re-exported from versioner-auth microcrate.
pub use versioner_auth as auth;

/// Configuration file loading and merging.
/// Re-exported from versioner-config microcrate.
pub use versioner_config as config;

/// Domain types shared by every versioner crate.
/// Re-exported from versioner-types microcrate.
pub use versioner_types as types;

pub use context::{
    BuildContext, BuildOptions, BuildPlan, ConfiguredProject, ProjectPlan, load_build_config,
    projects_or_root, register_upload_tasks,
};
pub use repository::{
    BASIC_AUTHENTICATION, RELEASES_REPOSITORY_URL, Repository, SNAPSHOT_REPOSITORY_URL,
    repository_url, select_repository,
};
pub use versioner_types::{BuildIntents, BuildType, Publication, ReleaseError, Reporter};
