//! Shared fixtures: an in-memory repository directory, synthetic POM
//! builders and a recording listener.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use jvdeps::artifact::version::{compare_versions, is_floating_version, range_contains};
use jvdeps::artifact::ArtifactCoordinates;
use jvdeps::pom::PomError;
use jvdeps::repository::{LocatedPom, RemoteRepository, RepositoryDirectory};
use jvdeps::{Artifact, DownloadError, ResolutionListener};

/// A dependency row for [`StubDirectory::put_pom`]:
/// `(group, artifact, version, scope, optional)`.
pub type DepRow<'a> = (&'a str, &'a str, &'a str, Option<&'a str>, bool);

/// In-memory repository directory. POMs are stored as XML text keyed by
/// `(group, artifact, version)`; every located POM binds the same stub
/// repository handle. Fetches are counted so tests can assert on cache
/// behavior.
pub struct StubDirectory {
    repository: Arc<RemoteRepository>,
    poms: Mutex<HashMap<(String, String, String), String>>,
    metadata: Mutex<HashMap<(String, String), Vec<String>>>,
    fetches: AtomicUsize,
}

impl StubDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            repository: Arc::new(
                RemoteRepository::new("stub", "https://stub.invalid/maven2")
                    .expect("stub repository"),
            ),
            poms: Mutex::new(HashMap::new()),
            metadata: Mutex::new(HashMap::new()),
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn repository(&self) -> Arc<RemoteRepository> {
        Arc::clone(&self.repository)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Stores a synthetic POM with plain dependency rows.
    pub fn put_pom(&self, group: &str, artifact: &str, version: &str, deps: &[DepRow<'_>]) {
        let mut deps_xml = String::new();
        if !deps.is_empty() {
            deps_xml.push_str("<dependencies>");
            for (dep_group, dep_artifact, dep_version, scope, optional) in deps {
                deps_xml.push_str("<dependency>");
                deps_xml.push_str(&format!("<groupId>{dep_group}</groupId>"));
                deps_xml.push_str(&format!("<artifactId>{dep_artifact}</artifactId>"));
                deps_xml.push_str(&format!("<version>{dep_version}</version>"));
                if let Some(scope) = scope {
                    deps_xml.push_str(&format!("<scope>{scope}</scope>"));
                }
                if *optional {
                    deps_xml.push_str("<optional>true</optional>");
                }
                deps_xml.push_str("</dependency>");
            }
            deps_xml.push_str("</dependencies>");
        }

        let pom = format!(
            r#"
            <project>
              <modelVersion>4.0.0</modelVersion>
              <groupId>{group}</groupId>
              <artifactId>{artifact}</artifactId>
              <version>{version}</version>
              {deps_xml}
            </project>
            "#
        );
        self.put_pom_xml(group, artifact, version, &pom);
    }

    /// Stores arbitrary POM XML (exclusions, dependencyManagement, BOMs).
    pub fn put_pom_xml(&self, group: &str, artifact: &str, version: &str, xml: &str) {
        self.poms.lock().unwrap().insert(
            (group.to_string(), artifact.to_string(), version.to_string()),
            xml.to_string(),
        );
    }

    /// Registers the version list served through `maven-metadata.xml`.
    pub fn put_metadata(&self, group: &str, artifact: &str, versions: &[&str]) {
        self.metadata.lock().unwrap().insert(
            (group.to_string(), artifact.to_string()),
            versions.iter().map(|version| version.to_string()).collect(),
        );
    }

    fn select_version(&self, coords: &ArtifactCoordinates) -> Option<String> {
        let versions = self
            .metadata
            .lock()
            .unwrap()
            .get(&(coords.group_id.clone(), coords.artifact_id.clone()))
            .cloned()?;
        let spec = coords.version.trim();

        let candidates: Vec<String> = if spec.is_empty()
            || spec.eq_ignore_ascii_case("LATEST")
            || spec.eq_ignore_ascii_case("RELEASE")
        {
            versions
        } else {
            versions
                .into_iter()
                .filter(|version| range_contains(spec, version))
                .collect()
        };

        candidates
            .into_iter()
            .max_by(|a, b| compare_versions(a, b))
    }

    fn locate(&self, coords: &ArtifactCoordinates) -> Result<LocatedPom, PomError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let mut pinned = coords.clone();
        if is_floating_version(&coords.version) {
            match self.select_version(coords) {
                Some(version) => pinned.version = version,
                None => {
                    return Err(PomError::VersionNotFound {
                        coordinates: coords.clone(),
                        reason: "メタデータに該当バージョンがありません".to_string(),
                    });
                }
            }
        }

        let key = (
            pinned.group_id.clone(),
            pinned.artifact_id.clone(),
            pinned.version.clone(),
        );
        let xml = self
            .poms
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| PomError::VersionNotFound {
                coordinates: pinned.clone(),
                reason: "スタブにPOMが登録されていません".to_string(),
            })?;

        Ok(LocatedPom {
            repository: Arc::clone(&self.repository),
            coordinates: pinned,
            xml,
        })
    }
}

impl RepositoryDirectory for StubDirectory {
    fn locate_pom<'a>(
        &'a self,
        coords: &'a ArtifactCoordinates,
    ) -> Pin<Box<dyn Future<Output = Result<LocatedPom, PomError>> + Send + 'a>> {
        let result = self.locate(coords);
        Box::pin(async move { result })
    }
}

/// Listener that records every event for later assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedEvent {
    Skip(String),
    Complete(String),
    NoDependencies(String),
    InvalidPom(String),
    VersionNotFound(String),
    Cycle(String),
    DownloadStart(String),
    DownloadEnd(String),
    DownloadError(String),
    Warning(String),
}

#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn contains(&self, expected: &RecordedEvent) -> bool {
        self.events.lock().unwrap().iter().any(|event| event == expected)
    }

    pub fn count_cycles(&self) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| matches!(event, RecordedEvent::Cycle(_)))
            .count()
    }

    fn push(&self, event: RecordedEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl ResolutionListener for RecordingListener {
    fn on_skipping_resolution(&self, artifact: &Artifact) {
        self.push(RecordedEvent::Skip(artifact.to_string()));
    }

    fn on_resolution_complete(&self, artifact: &Artifact, _direct_dependencies: usize) {
        self.push(RecordedEvent::Complete(artifact.to_string()));
    }

    fn on_dependencies_not_found(&self, artifact: &Artifact) {
        self.push(RecordedEvent::NoDependencies(artifact.to_string()));
    }

    fn on_invalid_pom(&self, artifact: &Artifact, _error: &PomError) {
        self.push(RecordedEvent::InvalidPom(artifact.to_string()));
    }

    fn on_version_not_found(&self, artifact: &Artifact) {
        self.push(RecordedEvent::VersionNotFound(artifact.to_string()));
    }

    fn on_cycle_detected(&self, artifact: &Artifact) {
        self.push(RecordedEvent::Cycle(artifact.to_string()));
    }

    fn on_download_start(&self, artifact: &Artifact) {
        self.push(RecordedEvent::DownloadStart(artifact.to_string()));
    }

    fn on_download_end(&self, artifact: &Artifact, _bytes: u64) {
        self.push(RecordedEvent::DownloadEnd(artifact.to_string()));
    }

    fn on_download_error(&self, artifact: &Artifact, _error: &DownloadError) {
        self.push(RecordedEvent::DownloadError(artifact.to_string()));
    }

    fn warning(&self, message: &str) {
        self.push(RecordedEvent::Warning(message.to_string()));
    }
}

/// Writes a root `pom.xml` declaring plain dependencies.
pub fn write_project_pom(dir: &Path, deps: &[DepRow<'_>]) {
    let mut deps_xml = String::new();
    if !deps.is_empty() {
        deps_xml.push_str("<dependencies>");
        for (group, artifact, version, scope, optional) in deps {
            deps_xml.push_str("<dependency>");
            deps_xml.push_str(&format!("<groupId>{group}</groupId>"));
            deps_xml.push_str(&format!("<artifactId>{artifact}</artifactId>"));
            deps_xml.push_str(&format!("<version>{version}</version>"));
            if let Some(scope) = scope {
                deps_xml.push_str(&format!("<scope>{scope}</scope>"));
            }
            if *optional {
                deps_xml.push_str("<optional>true</optional>");
            }
            deps_xml.push_str("</dependency>");
        }
        deps_xml.push_str("</dependencies>");
    }

    let pom = format!(
        r#"
        <project>
          <modelVersion>4.0.0</modelVersion>
          <groupId>com.example</groupId>
          <artifactId>app</artifactId>
          <version>1.0.0</version>
          {deps_xml}
        </project>
        "#
    );
    std::fs::write(dir.join("pom.xml"), pom).expect("write pom.xml");
}

/// Writes a root `pom.xml` with raw body XML (dependencyManagement etc.).
pub fn write_project_pom_xml(dir: &Path, body: &str) {
    let pom = format!(
        r#"
        <project>
          <modelVersion>4.0.0</modelVersion>
          <groupId>com.example</groupId>
          <artifactId>app</artifactId>
          <version>1.0.0</version>
          {body}
        </project>
        "#
    );
    std::fs::write(dir.join("pom.xml"), pom).expect("write pom.xml");
}
