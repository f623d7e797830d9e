use serde::Serialize;
use versioner_auth::{Credentials, mask_secret};
use versioner_types::{BuildType, ReleaseError};

/// Repository used while building a test distribution during snapshot builds.
pub const SNAPSHOT_REPOSITORY_URL: &str = "https://repo.gradle.org/gradle/ext-snapshots-local";

/// Repository used for every release-line build type.
pub const RELEASES_REPOSITORY_URL: &str = "https://dl.bintray.com/adammurdoch/maven";

/// Authentication scheme attached to the repository.
pub const BASIC_AUTHENTICATION: &str = "basic";

/// The authenticated remote repository of a build.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Repository {
    pub url: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub authentication: String,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &mask_secret(&self.password))
            .field("authentication", &self.authentication)
            .finish()
    }
}

/// URL of the repository serving this build type.
pub fn repository_url(build_type: BuildType) -> &'static str {
    if build_type.is_snapshot() {
        SNAPSHOT_REPOSITORY_URL
    } else {
        RELEASES_REPOSITORY_URL
    }
}

/// Select the remote repository, if the build uses one.
///
/// Credentials are asserted present before they are attached.
pub fn select_repository(
    build_type: BuildType,
    use_repo: bool,
    credentials: &Credentials,
) -> Result<Option<Repository>, ReleaseError> {
    if !use_repo {
        return Ok(None);
    }

    let (username, password) = credentials.assert_present()?;
    Ok(Some(Repository {
        url: repository_url(build_type).to_string(),
        username: username.to_string(),
        password: password.to_string(),
        authentication: BASIC_AUTHENTICATION.to_string(),
    }))
}
