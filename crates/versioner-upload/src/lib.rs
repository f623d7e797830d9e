//! Upload lifecycle aggregation for versioner.
//!
//! Every publication of a project has its own upload task, owned by the
//! publishing collaborator. This crate wires those tasks under two lifecycle
//! tasks so callers can trigger "upload everything of one kind" as a unit:
//!
//! - `uploadMain` depends on the upload task of the main publication
//! - `uploadJni` depends on the upload tasks of every other publication
//!
//! How upload tasks are named and which publication counts as main are
//! decided by an injected [`PublicationRules`] implementation.
//!
//! # Example
//!
//! ```
//! use versioner_types::{BuildType, Publication};
//! use versioner_upload::{
//!     DefaultPublicationRules, PublicationRules, TaskGraph, UploadLifecycleAggregator,
//!     UPLOAD_JNI_TASK, UPLOAD_MAIN_TASK,
//! };
//!
//! let rules = DefaultPublicationRules;
//! let publications = vec![Publication::new("main"), Publication::new("linux-amd64")];
//!
//! let mut graph = TaskGraph::new();
//! for publication in &publications {
//!     graph.maybe_create(&rules.upload_task_name(publication, BuildType::Release));
//! }
//!
//! let aggregator = UploadLifecycleAggregator::new(&rules, BuildType::Release);
//! aggregator.build(&mut graph, &publications).expect("wire lifecycle");
//!
//! assert!(graph.dependencies_of(UPLOAD_MAIN_TASK).unwrap().contains("uploadMainPublication"));
//! assert!(graph.dependencies_of(UPLOAD_JNI_TASK).unwrap().contains("uploadLinuxAmd64Publication"));
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use versioner_types::{BuildType, Publication, PublicationKind, ReleaseError};

/// Lifecycle task depending on the main publication's upload
pub const UPLOAD_MAIN_TASK: &str = "uploadMain";

/// Lifecycle task depending on every other publication's upload
pub const UPLOAD_JNI_TASK: &str = "uploadJni";

/// Task group of both lifecycle tasks
pub const UPLOAD_GROUP: &str = "Upload";

/// Publication name treated as main when no explicit kind is given
pub const MAIN_PUBLICATION: &str = "main";

/// A named task and the tasks it depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Task {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Dependencies carry no ordering among themselves.
    pub dependencies: BTreeSet<String>,
}

impl Task {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

/// Registry of named tasks for one project.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskGraph {
    tasks: BTreeMap<String, Task>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the task, or return the existing one with that name.
    pub fn maybe_create(&mut self, name: &str) -> &mut Task {
        self.tasks
            .entry(name.to_string())
            .or_insert_with(|| Task::new(name))
    }

    /// Look up an existing task.
    pub fn named(&self, name: &str) -> Result<&Task, ReleaseError> {
        self.tasks.get(name).ok_or_else(|| ReleaseError::UnknownTask {
            name: name.to_string(),
        })
    }

    /// Make `task` depend on `dependency`. Both must exist.
    pub fn depends_on(&mut self, task: &str, dependency: &str) -> Result<(), ReleaseError> {
        self.named(dependency)?;
        let entry = self.tasks.get_mut(task).ok_or_else(|| ReleaseError::UnknownTask {
            name: task.to_string(),
        })?;
        entry.dependencies.insert(dependency.to_string());
        Ok(())
    }

    pub fn dependencies_of(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.tasks.get(name).map(|task| &task.dependencies)
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Naming and classification rules owned by the publishing collaborator.
pub trait PublicationRules {
    /// Name of the task uploading `publication` for this build type.
    ///
    /// Distinct publications may map to the same name (the default rules
    /// camel-case `linux-amd64` and `linux_amd64` alike); they must then share
    /// a classification.
    fn upload_task_name(&self, publication: &Publication, build_type: BuildType) -> String;

    /// Whether `publication` is the project's main publication.
    fn is_main(&self, publication: &Publication) -> bool;

    fn classify(&self, publication: &Publication) -> PublicationKind {
        if self.is_main(publication) {
            PublicationKind::Main
        } else {
            PublicationKind::Other
        }
    }
}

/// Snapshot builds upload through the snapshot repository publish task;
/// every other build type uses the release upload task.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPublicationRules;

impl PublicationRules for DefaultPublicationRules {
    fn upload_task_name(&self, publication: &Publication, build_type: BuildType) -> String {
        if build_type.is_snapshot() {
            snapshot_upload_task_name(publication)
        } else {
            release_upload_task_name(publication)
        }
    }

    fn is_main(&self, publication: &Publication) -> bool {
        match publication.kind {
            Some(kind) => kind == PublicationKind::Main,
            None => publication.name == MAIN_PUBLICATION,
        }
    }
}

/// `publish<Name>PublicationToSnapshotRepository`
pub fn snapshot_upload_task_name(publication: &Publication) -> String {
    format!(
        "publish{}PublicationToSnapshotRepository",
        camel_case(&publication.name)
    )
}

/// `upload<Name>Publication`
pub fn release_upload_task_name(publication: &Publication) -> String {
    format!("upload{}Publication", camel_case(&publication.name))
}

// "linux-amd64" -> "LinuxAmd64"
fn camel_case(name: &str) -> String {
    name.split(['-', '_', '.', ' '])
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Upload tasks wired under each lifecycle task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LifecycleTasks {
    pub main: BTreeSet<String>,
    pub other: BTreeSet<String>,
}

/// Wires per-publication upload tasks under the two lifecycle tasks.
pub struct UploadLifecycleAggregator<'a> {
    rules: &'a dyn PublicationRules,
    build_type: BuildType,
}

impl<'a> UploadLifecycleAggregator<'a> {
    pub fn new(rules: &'a dyn PublicationRules, build_type: BuildType) -> Self {
        Self { rules, build_type }
    }

    /// Create (or reuse) the lifecycle tasks and wire every publication's
    /// upload task under exactly one of them.
    ///
    /// Fails with [`ReleaseError::ConflictingUploadTask`] when two publications
    /// of different kinds map to the same upload task name.
    pub fn build(
        &self,
        graph: &mut TaskGraph,
        publications: &[Publication],
    ) -> Result<LifecycleTasks, ReleaseError> {
        let mut claimed: BTreeMap<String, PublicationKind> = BTreeMap::new();
        for publication in publications {
            let upload_task = self.rules.upload_task_name(publication, self.build_type);
            let kind = self.rules.classify(publication);
            match claimed.get(&upload_task) {
                Some(existing) if *existing != kind => {
                    return Err(ReleaseError::ConflictingUploadTask { task: upload_task });
                }
                Some(_) => {}
                None => {
                    claimed.insert(upload_task, kind);
                }
            }
        }

        ensure_lifecycle_tasks(graph);

        for (upload_task, kind) in &claimed {
            let lifecycle = match kind {
                PublicationKind::Main => UPLOAD_MAIN_TASK,
                PublicationKind::Other => UPLOAD_JNI_TASK,
            };
            graph.depends_on(lifecycle, upload_task)?;
        }

        Ok(LifecycleTasks {
            main: graph.dependencies_of(UPLOAD_MAIN_TASK).cloned().unwrap_or_default(),
            other: graph.dependencies_of(UPLOAD_JNI_TASK).cloned().unwrap_or_default(),
        })
    }
}

/// Create `uploadMain` and `uploadJni` unless they already exist.
pub fn ensure_lifecycle_tasks(graph: &mut TaskGraph) {
    let main = graph.maybe_create(UPLOAD_MAIN_TASK);
    main.group = Some(UPLOAD_GROUP.to_string());
    main.description = Some("Upload Main publication".to_string());

    let jni = graph.maybe_create(UPLOAD_JNI_TASK);
    jni.group = Some(UPLOAD_GROUP.to_string());
    jni.description = Some("Upload all JNI publications".to_string());
}
