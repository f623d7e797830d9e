//! Configuration file handling for versioner.
//!
//! This crate provides configuration loading from `.versioner.toml` files
//! with support for merging with CLI arguments and defaults.
//!
//! # Example
//!
//! ```
//! use versioner_config::load_config;
//! use std::path::Path;
//!
//! // Load config from a directory (looks for .versioner.toml)
//! let config = load_config(Path::new(".")).expect("load config");
//!
//! if let Some(version) = config.next_version() {
//!     println!("Next version: {}", version);
//! }
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use versioner_types::Publication;

/// Default configuration file name
pub const CONFIG_FILE: &str = ".versioner.toml";

/// Get the config file path for a directory
pub fn config_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE)
}

/// Complete versioner configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Version facts
    #[serde(default)]
    pub versions: VersionsConfig,
    /// Build behavior
    #[serde(default)]
    pub build: BuildConfig,
    /// Projects participating in the build
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub projects: Vec<ProjectConfig>,
}

impl Config {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_version(&self) -> Option<&str> {
        self.versions.next_version.as_deref()
    }

    pub fn next_snapshot(&self) -> Option<&str> {
        self.versions.next_snapshot.as_deref()
    }

    pub fn use_repo(&self) -> bool {
        self.versions.use_repo
    }

    pub fn ignore_incoming_build_receipt(&self) -> bool {
        self.build.ignore_incoming_build_receipt
    }

    pub fn projects(&self) -> &[ProjectConfig] {
        &self.projects
    }

    /// Merge this config with another (other takes precedence)
    pub fn merge(&self, other: &Config) -> Config {
        Config {
            versions: VersionsConfig {
                next_version: other
                    .versions
                    .next_version
                    .as_ref()
                    .or(self.versions.next_version.as_ref())
                    .cloned(),
                next_snapshot: other
                    .versions
                    .next_snapshot
                    .as_ref()
                    .or(self.versions.next_snapshot.as_ref())
                    .cloned(),
                use_repo: other.versions.use_repo || self.versions.use_repo,
            },
            build: BuildConfig {
                ignore_incoming_build_receipt: other.build.ignore_incoming_build_receipt
                    || self.build.ignore_incoming_build_receipt,
            },
            projects: if other.projects.is_empty() {
                self.projects.clone()
            } else {
                other.projects.clone()
            },
        }
    }
}

/// `[versions]` table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionsConfig {
    /// The version being worked towards
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_version: Option<String>,
    /// Milestone qualifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_snapshot: Option<String>,
    /// Build against the authenticated remote repository
    #[serde(default)]
    pub use_repo: bool,
}

/// `[build]` table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Mint a fresh timestamp even when an incoming build receipt exists
    #[serde(default)]
    pub ignore_incoming_build_receipt: bool,
}

/// `[[projects]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default)]
    pub publications: Vec<Publication>,
}

/// Load configuration from a directory
pub fn load_config(dir: &Path) -> Result<Config> {
    load_config_from_file(&config_path(dir))
}

/// Load configuration from a specific file path
pub fn load_config_from_file(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    Ok(config)
}

/// Save configuration to a directory
pub fn save_config(dir: &Path, config: &Config) -> Result<()> {
    let path = config_path(dir);

    let content = toml::to_string_pretty(config).context("failed to serialize config to TOML")?;

    std::fs::write(&path, content)
        .with_context(|| format!("failed to write config file: {}", path.display()))?;

    Ok(())
}

/// Find configuration file by walking up the directory tree
pub fn find_config(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir;

    loop {
        let config_file = current.join(CONFIG_FILE);
        if config_file.exists() {
            return Some(config_file);
        }

        match current.parent() {
            Some(parent) => current = parent,
            None => return None,
        }
    }
}
