use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use versioner_auth::Credentials;
use versioner_config::{Config, ProjectConfig, find_config, load_config_from_file};
use versioner_receipt::{
    BuildTimestamp, determine_timestamp, incoming_receipt_path, persist_timestamp, receipt_path,
};
use versioner_types::{BuildIntents, BuildType, Publication, ReleaseError, Reporter};
use versioner_upload::{LifecycleTasks, PublicationRules, TaskGraph, UploadLifecycleAggregator};
use versioner_version::{VersionCalculator, VersionDetails, VersionFacts};

use crate::repository::{Repository, select_repository};

/// Everything needed to configure one build.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Root of the build's source tree
    pub root: PathBuf,
    pub intents: BuildIntents,
    pub ignore_incoming_build_receipt: bool,
    pub versions: VersionFacts,
}

impl BuildOptions {
    /// Options from a merged configuration.
    pub fn from_config(root: &Path, intents: BuildIntents, config: &Config) -> Self {
        Self {
            root: root.to_path_buf(),
            intents,
            ignore_incoming_build_receipt: config.ignore_incoming_build_receipt(),
            versions: VersionFacts {
                next_version: config.next_version().map(String::from),
                next_snapshot: config.next_snapshot().map(String::from),
                use_repo: config.use_repo(),
            },
        }
    }
}

/// Load the nearest `.versioner.toml` at or above `root` and apply `overrides` on top of it.
pub fn load_build_config(root: &Path, overrides: &Config) -> Result<Config> {
    let file = match find_config(root) {
        Some(path) => load_config_from_file(&path)
            .with_context(|| format!("failed to load configuration for {}", root.display()))?,
        None => Config::default(),
    };
    Ok(file.merge(overrides))
}

/// Projects of the build; the root project alone when none are declared.
pub fn projects_or_root(config: &Config, root: &Path) -> Vec<ProjectConfig> {
    if !config.projects().is_empty() {
        return config.projects().to_vec();
    }

    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_string());
    vec![ProjectConfig {
        name,
        publications: Vec::new(),
    }]
}

/// Build-wide state, constructed once and handed to every project.
#[derive(Debug)]
pub struct BuildContext {
    root: PathBuf,
    build_type: BuildType,
    timestamp: BuildTimestamp,
    versions: VersionDetails,
    version: Arc<VersionCalculator>,
    receipt: Option<PathBuf>,
}

impl BuildContext {
    /// Resolve the build type, decide the timestamp, write the receipt for
    /// snapshot builds, and create the shared version.
    pub fn configure(opts: &BuildOptions, reporter: &mut dyn Reporter) -> Result<Self, ReleaseError> {
        let build_type = opts.intents.resolve()?;
        reporter.info(&format!("build type: {build_type}"));

        let versions = VersionDetails::from_facts(opts.versions.clone());
        let timestamp = determine_timestamp(
            opts.ignore_incoming_build_receipt,
            &incoming_receipt_path(&opts.root),
            reporter,
        )?;

        let receipt = if build_type.is_snapshot() {
            let path = receipt_path(&opts.root);
            persist_timestamp(&timestamp, &path)?;
            reporter.info(&format!("wrote build receipt {}", path.display()));
            Some(path)
        } else {
            None
        };

        let version = Arc::new(VersionCalculator::new(
            versions.clone(),
            build_type,
            timestamp.clone(),
        ));

        Ok(Self {
            root: opts.root.clone(),
            build_type,
            timestamp,
            versions,
            version,
            receipt,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn build_type(&self) -> BuildType {
        self.build_type
    }

    pub fn timestamp(&self) -> &BuildTimestamp {
        &self.timestamp
    }

    /// Shared version facts; may still be amended before the version is rendered.
    pub fn versions(&self) -> &VersionDetails {
        &self.versions
    }

    /// The build's version, shared by every project.
    pub fn version(&self) -> Arc<VersionCalculator> {
        Arc::clone(&self.version)
    }

    /// Receipt written by this build, if it is a snapshot build.
    pub fn receipt(&self) -> Option<&Path> {
        self.receipt.as_deref()
    }

    /// Render the shared version and report it.
    pub fn render_version(&self, reporter: &mut dyn Reporter) -> Result<String, ReleaseError> {
        let version = self.version.render()?;
        reporter.info(&format!("version: {version}"));
        Ok(version)
    }

    /// Attach version, repository and upload lifecycle tasks to a project.
    pub fn configure_project(
        &self,
        project: &ProjectConfig,
        rules: &dyn PublicationRules,
        credentials: &Credentials,
    ) -> Result<ConfiguredProject, ReleaseError> {
        let repository = select_repository(self.build_type, self.versions.use_repo(), credentials)?;

        let mut tasks = TaskGraph::new();
        register_upload_tasks(&mut tasks, &project.publications, rules, self.build_type);
        let lifecycle = UploadLifecycleAggregator::new(rules, self.build_type)
            .build(&mut tasks, &project.publications)?;

        Ok(ConfiguredProject {
            name: project.name.clone(),
            version: self.version(),
            repository,
            tasks,
            lifecycle,
        })
    }

    /// Configure every project and render the shared version.
    pub fn plan(
        &self,
        projects: &[ProjectConfig],
        rules: &dyn PublicationRules,
        credentials: &Credentials,
        reporter: &mut dyn Reporter,
    ) -> Result<BuildPlan, ReleaseError> {
        let repository = select_repository(self.build_type, self.versions.use_repo(), credentials)?;
        let configured = projects
            .iter()
            .map(|project| self.configure_project(project, rules, credentials))
            .collect::<Result<Vec<_>, _>>()?;

        let version = self.render_version(reporter)?;

        Ok(BuildPlan {
            build_type: self.build_type,
            timestamp: self.timestamp.to_string(),
            version,
            receipt: self.receipt.clone(),
            repository: repository.map(|r| r.url),
            projects: configured
                .into_iter()
                .map(|p| ProjectPlan {
                    name: p.name,
                    upload_main: p.lifecycle.main.into_iter().collect(),
                    upload_jni: p.lifecycle.other.into_iter().collect(),
                })
                .collect(),
        })
    }
}

/// Register each publication's upload task, as the publishing collaborator would.
pub fn register_upload_tasks(
    tasks: &mut TaskGraph,
    publications: &[Publication],
    rules: &dyn PublicationRules,
    build_type: BuildType,
) {
    for publication in publications {
        let name = rules.upload_task_name(publication, build_type);
        tasks.maybe_create(&name).group = Some("Publishing".to_string());
    }
}

/// A project after build-wide configuration was applied.
#[derive(Debug)]
pub struct ConfiguredProject {
    pub name: String,
    pub version: Arc<VersionCalculator>,
    pub repository: Option<Repository>,
    pub tasks: TaskGraph,
    pub lifecycle: LifecycleTasks,
}

/// Rendered summary of a configured build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildPlan {
    pub build_type: BuildType,
    pub timestamp: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    pub projects: Vec<ProjectPlan>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectPlan {
    pub name: String,
    pub upload_main: Vec<String>,
    pub upload_jni: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fs;
    use tempfile::tempdir;
    use versioner_receipt::{BUILD_TIMESTAMP_PROPERTY, parse_properties};
    use versioner_upload::{DefaultPublicationRules, UPLOAD_JNI_TASK, UPLOAD_MAIN_TASK};

    #[derive(Default)]
    struct CollectingReporter {
        infos: Vec<String>,
        warnings: Vec<String>,
    }

    impl Reporter for CollectingReporter {
        fn info(&mut self, msg: &str) {
            self.infos.push(msg.to_string());
        }

        fn warn(&mut self, msg: &str) {
            self.warnings.push(msg.to_string());
        }

        fn error(&mut self, _msg: &str) {}
    }

    fn options(root: &Path, intents: BuildIntents) -> BuildOptions {
        BuildOptions {
            root: root.to_path_buf(),
            intents,
            ignore_incoming_build_receipt: false,
            versions: VersionFacts {
                next_version: Some("1.2".to_string()),
                next_snapshot: Some("3".to_string()),
                use_repo: false,
            },
        }
    }

    fn snapshot() -> BuildIntents {
        BuildIntents {
            snapshot: true,
            ..Default::default()
        }
    }

    fn native_project() -> ProjectConfig {
        ProjectConfig {
            name: "native-platform".to_string(),
            publications: vec![
                Publication::new("main"),
                Publication::new("linux-amd64"),
                Publication::new("windows-amd64"),
            ],
        }
    }

    #[test]
    fn snapshot_build_writes_receipt_with_version_timestamp() {
        let td = tempdir().expect("tempdir");
        let mut reporter = CollectingReporter::default();

        let ctx = BuildContext::configure(&options(td.path(), snapshot()), &mut reporter).unwrap();

        let receipt = ctx.receipt().expect("receipt written");
        let props = parse_properties(&fs::read_to_string(receipt).expect("read"));
        assert_eq!(props[BUILD_TIMESTAMP_PROPERTY], ctx.timestamp().as_str());
        assert_eq!(
            ctx.version().render().unwrap(),
            format!("1.2-snapshot-{}", ctx.timestamp())
        );
    }

    #[test]
    fn non_snapshot_builds_write_no_receipt() {
        let td = tempdir().expect("tempdir");
        let mut reporter = CollectingReporter::default();
        let intents = BuildIntents {
            release: true,
            ..Default::default()
        };

        let ctx = BuildContext::configure(&options(td.path(), intents), &mut reporter).unwrap();

        assert!(ctx.receipt().is_none());
        assert!(!receipt_path(td.path()).exists());
        assert_eq!(ctx.version().render().unwrap(), "1.2");
    }

    #[test]
    fn consuming_build_replays_producer_timestamp() {
        let producer_root = tempdir().expect("tempdir");
        let mut reporter = CollectingReporter::default();
        let producer =
            BuildContext::configure(&options(producer_root.path(), snapshot()), &mut reporter).unwrap();

        // The consuming stage receives the producer's distributions.
        let consumer_root = tempdir().expect("tempdir");
        let incoming = incoming_receipt_path(consumer_root.path());
        fs::create_dir_all(incoming.parent().unwrap()).expect("mkdir");
        fs::copy(producer.receipt().unwrap(), &incoming).expect("copy");

        let mut reporter = CollectingReporter::default();
        let consumer =
            BuildContext::configure(&options(consumer_root.path(), snapshot()), &mut reporter).unwrap();

        assert_eq!(consumer.timestamp(), producer.timestamp());
        assert_eq!(consumer.version().render().unwrap(), producer.version().render().unwrap());
        assert_eq!(reporter.warnings.len(), 1);
    }

    #[test]
    fn ignoring_incoming_receipt_mints_fresh_timestamp() {
        let td = tempdir().expect("tempdir");
        let incoming = incoming_receipt_path(td.path());
        persist_timestamp(&BuildTimestamp::from("19990101000000+0000"), &incoming).expect("persist");

        let mut opts = options(td.path(), snapshot());
        opts.ignore_incoming_build_receipt = true;
        let mut reporter = CollectingReporter::default();
        let ctx = BuildContext::configure(&opts, &mut reporter).unwrap();

        assert_ne!(ctx.timestamp().as_str(), "19990101000000+0000");
        assert!(reporter.warnings.is_empty());
    }

    #[test]
    fn conflicting_intents_abort_before_any_io() {
        let td = tempdir().expect("tempdir");
        let intents = BuildIntents {
            snapshot: true,
            release: true,
            milestone: false,
        };
        let mut reporter = CollectingReporter::default();

        let err = BuildContext::configure(&options(td.path(), intents), &mut reporter).unwrap_err();

        assert!(matches!(err, ReleaseError::ConflictingBuildTypes { .. }));
        assert!(!receipt_path(td.path()).exists());
    }

    #[test]
    fn projects_share_one_version() {
        let td = tempdir().expect("tempdir");
        let mut reporter = CollectingReporter::default();
        let ctx = BuildContext::configure(&options(td.path(), BuildIntents::default()), &mut reporter).unwrap();

        let rules = DefaultPublicationRules;
        let a = ctx.configure_project(&native_project(), &rules, &Credentials::default()).unwrap();
        let b = ctx
            .configure_project(
                &ProjectConfig {
                    name: "testapp".to_string(),
                    publications: Vec::new(),
                },
                &rules,
                &Credentials::default(),
            )
            .unwrap();

        assert!(Arc::ptr_eq(&a.version, &b.version));

        // Facts amended after configuration are still honoured by the first render.
        ctx.versions().set_next_version("2.0");
        assert_eq!(a.version.render().unwrap(), "2.0-dev");
        assert_eq!(b.version.cached().as_deref(), Some("2.0-dev"));
    }

    #[test]
    fn configure_project_wires_lifecycle_tasks() {
        let td = tempdir().expect("tempdir");
        let mut reporter = CollectingReporter::default();
        let ctx = BuildContext::configure(&options(td.path(), snapshot()), &mut reporter).unwrap();

        let project = ctx
            .configure_project(&native_project(), &DefaultPublicationRules, &Credentials::default())
            .unwrap();

        assert!(project.repository.is_none());
        let main = project.tasks.dependencies_of(UPLOAD_MAIN_TASK).unwrap();
        let jni = project.tasks.dependencies_of(UPLOAD_JNI_TASK).unwrap();
        assert_eq!(main.len(), 1);
        assert_eq!(jni.len(), 2);
        assert!(main.contains("publishMainPublicationToSnapshotRepository"));
        assert!(jni.is_disjoint(main));
    }

    #[test]
    fn use_repo_without_credentials_fails_project_configuration() {
        let td = tempdir().expect("tempdir");
        let mut opts = options(td.path(), BuildIntents::default());
        opts.versions.use_repo = true;
        let mut reporter = CollectingReporter::default();
        let ctx = BuildContext::configure(&opts, &mut reporter).unwrap();

        let err = ctx
            .configure_project(&native_project(), &DefaultPublicationRules, &Credentials::default())
            .unwrap_err();
        assert!(matches!(err, ReleaseError::MissingCredentials { .. }));
    }

    #[test]
    fn plan_summarizes_build() {
        let td = tempdir().expect("tempdir");
        let mut opts = options(td.path(), BuildIntents {
            milestone: true,
            ..Default::default()
        });
        opts.versions.use_repo = true;
        let mut reporter = CollectingReporter::default();
        let ctx = BuildContext::configure(&opts, &mut reporter).unwrap();

        let plan = ctx
            .plan(
                &[native_project()],
                &DefaultPublicationRules,
                &Credentials::new("builder", "secret"),
                &mut reporter,
            )
            .unwrap();

        assert_eq!(plan.build_type, BuildType::Milestone);
        assert_eq!(plan.version, "1.2-milestone-3");
        assert_eq!(plan.repository.as_deref(), Some(crate::RELEASES_REPOSITORY_URL));
        assert_eq!(plan.projects[0].upload_main, vec!["uploadMainPublication"]);
        assert_eq!(
            plan.projects[0].upload_jni,
            vec!["uploadLinuxAmd64Publication", "uploadWindowsAmd64Publication"]
        );
        assert!(reporter.infos.iter().any(|m| m == "version: 1.2-milestone-3"));

        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["build_type"], "milestone");
        assert!(json.get("receipt").is_none());
    }

    #[test]
    fn plan_without_next_version_fails() {
        let td = tempdir().expect("tempdir");
        let mut opts = options(td.path(), BuildIntents::default());
        opts.versions.next_version = None;
        let mut reporter = CollectingReporter::default();
        let ctx = BuildContext::configure(&opts, &mut reporter).unwrap();

        let err = ctx
            .plan(&[], &DefaultPublicationRules, &Credentials::default(), &mut reporter)
            .unwrap_err();
        assert!(matches!(err, ReleaseError::MissingVersion));
    }

    #[test]
    fn options_from_config() {
        let mut config = Config::new();
        config.versions.next_version = Some("4.0".to_string());
        config.build.ignore_incoming_build_receipt = true;

        let opts = BuildOptions::from_config(Path::new("/work"), snapshot(), &config);
        assert_eq!(opts.root, PathBuf::from("/work"));
        assert!(opts.ignore_incoming_build_receipt);
        assert_eq!(opts.versions.next_version.as_deref(), Some("4.0"));
        assert!(opts.intents.snapshot);
    }

    #[test]
    fn load_build_config_applies_overrides() {
        let td = tempdir().expect("tempdir");
        fs::write(
            td.path().join(versioner_config::CONFIG_FILE),
            "[versions]\nnext_version = \"1.0\"\nnext_snapshot = \"2\"\n",
        )
        .expect("write");

        let mut overrides = Config::new();
        overrides.versions.next_version = Some("1.1".to_string());

        let config = load_build_config(td.path(), &overrides).unwrap();
        assert_eq!(config.next_version(), Some("1.1"));
        assert_eq!(config.next_snapshot(), Some("2"));
    }

    #[test]
    fn plan_json_output() {
        let td = tempdir().expect("tempdir");
        persist_timestamp(
            &BuildTimestamp::from("20240101120000+0000"),
            &incoming_receipt_path(td.path()),
        )
        .expect("persist");
        let intents = BuildIntents {
            release: true,
            ..Default::default()
        };
        let mut reporter = CollectingReporter::default();
        let ctx = BuildContext::configure(&options(td.path(), intents), &mut reporter).unwrap();

        let plan = ctx
            .plan(
                &[native_project()],
                &DefaultPublicationRules,
                &Credentials::default(),
                &mut reporter,
            )
            .unwrap();

        insta::assert_snapshot!(serde_json::to_string_pretty(&plan).unwrap(), @r#"
{
  "build_type": "release",
  "timestamp": "20240101120000+0000",
  "version": "1.2",
  "projects": [
    {
      "name": "native-platform",
      "upload_main": [
        "uploadMainPublication"
      ],
      "upload_jni": [
        "uploadLinuxAmd64Publication",
        "uploadWindowsAmd64Publication"
      ]
    }
  ]
}
"#);
    }

    proptest! {
        /// Property: every configured project holds the context's calculator and
        /// renders the same version, whatever the project names.
        #[test]
        fn configured_projects_share_calculator(
            names in proptest::collection::vec("[a-z][a-z0-9-]{0,8}", 0..6),
            build_type in proptest::sample::select(BuildType::ALL.to_vec()),
        ) {
            let td = tempdir().expect("tempdir");
            let intents = BuildIntents {
                release: build_type == BuildType::Release,
                milestone: build_type == BuildType::Milestone,
                snapshot: build_type == BuildType::Snapshot,
            };
            let mut reporter = CollectingReporter::default();
            let ctx = BuildContext::configure(&options(td.path(), intents), &mut reporter).unwrap();
            prop_assert_eq!(ctx.build_type(), build_type);

            let expected = ctx.version().render().unwrap();
            for name in names {
                let project = ProjectConfig {
                    name,
                    publications: vec![Publication::new("main")],
                };
                let configured = ctx
                    .configure_project(&project, &DefaultPublicationRules, &Credentials::default())
                    .unwrap();
                prop_assert!(Arc::ptr_eq(&configured.version, &ctx.version()));
                prop_assert_eq!(configured.version.render().unwrap(), expected.clone());
            }
        }
    }

    #[test]
    fn root_project_when_none_declared() {
        let projects = projects_or_root(&Config::new(), Path::new("/work/native-platform"));
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "native-platform");
        assert!(projects[0].publications.is_empty());
    }
}
