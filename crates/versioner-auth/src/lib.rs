//! Repository credential resolution for versioner.
//!
//! Builds that use the remote repository need a username and password.
//! Credentials are resolved from, in order:
//!
//! 1. `VERSIONER_REPO_USERNAME` / `VERSIONER_REPO_PASSWORD` environment variables
//! 2. `$VERSIONER_HOME/credentials.toml` (default `~/.versioner/credentials.toml`)
//!
//! ```toml
//! [repository]
//! username = "builder"
//! password = "secret"
//! ```
//!
//! Each field is resolved independently, so the username may come from the
//! environment while the password comes from the file.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use versioner_types::ReleaseError;

/// Environment variable holding the repository username
pub const USERNAME_ENV: &str = "VERSIONER_REPO_USERNAME";

/// Environment variable holding the repository password
pub const PASSWORD_ENV: &str = "VERSIONER_REPO_PASSWORD";

/// Environment variable overriding the versioner home directory
pub const VERSIONER_HOME_ENV: &str = "VERSIONER_HOME";

/// Credentials file name
pub const CREDENTIALS_FILE: &str = "credentials.toml";

/// Where a credential field came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Not found
    None,
    /// From an environment variable
    Env,
    /// From `credentials.toml`
    CredentialsFile,
}

impl std::fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialSource::None => write!(f, "none"),
            CredentialSource::Env => write!(f, "environment"),
            CredentialSource::CredentialsFile => write!(f, "credentials.toml"),
        }
    }
}

/// Repository credentials. `Debug` never prints the password.
#[derive(Clone, Default)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_deref().map(mask_secret))
            .finish()
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    /// Whether both fields are present and non-empty.
    pub fn is_present(&self) -> bool {
        self.missing().is_empty()
    }

    /// Return `(username, password)`, failing with the names of missing fields.
    pub fn assert_present(&self) -> Result<(&str, &str), ReleaseError> {
        match (non_empty(&self.username), non_empty(&self.password)) {
            (Some(username), Some(password)) => Ok((username, password)),
            _ => Err(ReleaseError::MissingCredentials {
                missing: self.missing(),
            }),
        }
    }

    fn missing(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if non_empty(&self.username).is_none() {
            missing.push(format!("username ({USERNAME_ENV})"));
        }
        if non_empty(&self.password).is_none() {
            missing.push(format!("password ({PASSWORD_ENV})"));
        }
        missing
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Resolved credentials plus where each field came from.
#[derive(Debug, Clone)]
pub struct CredentialsInfo {
    pub credentials: Credentials,
    pub username_source: CredentialSource,
    pub password_source: CredentialSource,
}

/// Resolve repository credentials from the environment, then the credentials file.
pub fn resolve_credentials(versioner_home: Option<&Path>) -> CredentialsInfo {
    let from_file = credentials_from_file(&versioner_home_path(versioner_home).join(CREDENTIALS_FILE))
        .unwrap_or_default();

    let (username, username_source) = pick(env_value(USERNAME_ENV), from_file.username);
    let (password, password_source) = pick(env_value(PASSWORD_ENV), from_file.password);

    CredentialsInfo {
        credentials: Credentials { username, password },
        username_source,
        password_source,
    }
}

fn pick(env_value: Option<String>, file_value: Option<String>) -> (Option<String>, CredentialSource) {
    match (env_value, file_value.filter(|v| !v.is_empty())) {
        (Some(value), _) => (Some(value), CredentialSource::Env),
        (None, Some(value)) => (Some(value), CredentialSource::CredentialsFile),
        (None, None) => (None, CredentialSource::None),
    }
}

fn env_value(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

/// Get the versioner home directory.
pub fn versioner_home_path(versioner_home: Option<&Path>) -> PathBuf {
    if let Some(path) = versioner_home {
        return path.to_path_buf();
    }

    if let Ok(path) = env::var(VERSIONER_HOME_ENV) {
        return PathBuf::from(path);
    }

    // Default to ~/.versioner
    if let Some(home) = dirs::home_dir() {
        return home.join(".versioner");
    }

    PathBuf::from(".versioner")
}

/// Read the `[repository]` table of a credentials file.
pub fn credentials_from_file(path: &Path) -> Result<Credentials> {
    if !path.exists() {
        return Err(anyhow::anyhow!("credentials file not found: {}", path.display()));
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read credentials file: {}", path.display()))?;

    let credentials: toml::Value = toml::from_str(&content)
        .with_context(|| format!("failed to parse credentials file: {}", path.display()))?;

    let field = |name: &str| {
        credentials
            .get("repository")
            .and_then(|r| r.get(name))
            .and_then(|v| v.as_str())
            .map(String::from)
    };

    Ok(Credentials {
        username: field("username"),
        password: field("password"),
    })
}

/// Mask a secret for safe display (show first 2 and last 2 chars).
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{head}****{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_credentials(dir: &Path, content: &str) {
        std::fs::write(dir.join(CREDENTIALS_FILE), content).expect("write");
    }

    #[test]
    fn mask_secret_short() {
        assert_eq!(mask_secret("abc"), "***");
        assert_eq!(mask_secret("abcdefgh"), "********");
    }

    #[test]
    fn mask_secret_long() {
        assert_eq!(mask_secret("abcdefghijklmnop"), "ab****op");
    }

    #[test]
    fn debug_redacts_password() {
        let creds = Credentials::new("builder", "super-secret-key");
        let debug = format!("{creds:?}");
        assert!(debug.contains("builder"));
        assert!(!debug.contains("super-secret-key"));
    }

    #[test]
    fn assert_present_returns_both_fields() {
        let creds = Credentials::new("builder", "secret");
        assert_eq!(creds.assert_present().unwrap(), ("builder", "secret"));
    }

    #[test]
    fn assert_present_names_missing_fields() {
        let creds = Credentials {
            username: Some("builder".to_string()),
            password: Some(String::new()),
        };
        let err = creds.assert_present().unwrap_err();
        insta::assert_snapshot!(
            err.to_string(),
            @"repository credentials missing: password (VERSIONER_REPO_PASSWORD)"
        );
    }

    #[test]
    fn versioner_home_path_prefers_argument() {
        let td = tempdir().expect("tempdir");
        assert_eq!(versioner_home_path(Some(td.path())), td.path());
    }

    #[test]
    fn resolve_from_env() {
        let td = tempdir().expect("tempdir");
        temp_env::with_vars(
            [(USERNAME_ENV, Some("env-user")), (PASSWORD_ENV, Some("env-pass"))],
            || {
                let info = resolve_credentials(Some(td.path()));
                assert!(info.credentials.is_present());
                assert_eq!(info.credentials.username.as_deref(), Some("env-user"));
                assert_eq!(info.username_source, CredentialSource::Env);
                assert_eq!(info.password_source, CredentialSource::Env);
            },
        );
    }

    #[test]
    fn resolve_from_file() {
        let td = tempdir().expect("tempdir");
        write_credentials(
            td.path(),
            r#"
[repository]
username = "file-user"
password = "file-pass"
"#,
        );

        temp_env::with_vars([(USERNAME_ENV, None::<&str>), (PASSWORD_ENV, None)], || {
            let info = resolve_credentials(Some(td.path()));
            assert_eq!(info.credentials.password.as_deref(), Some("file-pass"));
            assert_eq!(info.password_source, CredentialSource::CredentialsFile);
        });
    }

    #[test]
    fn env_and_file_combine_per_field() {
        let td = tempdir().expect("tempdir");
        write_credentials(td.path(), "[repository]\npassword = \"file-pass\"\n");

        temp_env::with_vars([(USERNAME_ENV, Some("env-user")), (PASSWORD_ENV, None)], || {
            let info = resolve_credentials(Some(td.path()));
            assert_eq!(info.username_source, CredentialSource::Env);
            assert_eq!(info.password_source, CredentialSource::CredentialsFile);
            assert!(info.credentials.is_present());
        });
    }

    #[test]
    fn resolve_none_found() {
        let td = tempdir().expect("tempdir");
        temp_env::with_vars([(USERNAME_ENV, None::<&str>), (PASSWORD_ENV, None)], || {
            let info = resolve_credentials(Some(td.path()));
            assert!(!info.credentials.is_present());
            assert_eq!(info.username_source, CredentialSource::None);
            assert!(info.credentials.assert_present().is_err());
        });
    }

    #[test]
    fn credentials_file_missing() {
        let td = tempdir().expect("tempdir");
        assert!(credentials_from_file(&td.path().join("nonexistent.toml")).is_err());
    }

    #[test]
    fn credentials_file_malformed() {
        let td = tempdir().expect("tempdir");
        write_credentials(td.path(), "[repository\nusername =");
        assert!(credentials_from_file(&td.path().join(CREDENTIALS_FILE)).is_err());
    }

    #[test]
    fn credential_source_display() {
        assert_eq!(CredentialSource::None.to_string(), "none");
        assert_eq!(CredentialSource::Env.to_string(), "environment");
        assert_eq!(CredentialSource::CredentialsFile.to_string(), "credentials.toml");
    }
}
