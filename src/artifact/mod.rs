use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::repository::RemoteRepository;

pub mod version;

/// Mavenレジストリ内のグループID+アーティファクトIDの組み合わせ。
/// 競合解決とキャッシュのキーとして使う。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MavenCoordinates {
    pub group_id: String,
    pub artifact_id: String,
}

impl MavenCoordinates {
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
        }
    }

    pub fn group_path(&self) -> String {
        self.group_id.replace('.', "/")
    }

    pub fn path(&self) -> String {
        format!("{}/{}", self.group_path(), self.artifact_id)
    }

    /// `maven-metadata.xml` の相対パス。
    pub fn metadata_path(&self) -> String {
        format!("{}/maven-metadata.xml", self.path())
    }
}

impl fmt::Display for MavenCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group_id, self.artifact_id)
    }
}

/// バージョンや分類子を含む完全なアーティファクト座標。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactCoordinates {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub classifier: Option<String>,
}

impl ArtifactCoordinates {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: version.into(),
            classifier: None,
        }
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }

    pub fn classifier(&self) -> Option<&str> {
        self.classifier.as_deref()
    }

    pub fn maven_coordinates(&self) -> MavenCoordinates {
        MavenCoordinates::new(self.group_id.clone(), self.artifact_id.clone())
    }

    pub fn ga_key(&self) -> (String, String) {
        (self.group_id.clone(), self.artifact_id.clone())
    }

    fn group_path(&self) -> String {
        self.group_id.replace('.', "/")
    }

    fn version_path(&self) -> String {
        format!(
            "{}/{}/{}",
            self.group_path(),
            self.artifact_id,
            self.version
        )
    }

    fn file_basename(&self) -> String {
        match self.classifier() {
            Some(classifier) => format!("{}-{}-{}", self.artifact_id, self.version, classifier),
            None => format!("{}-{}", self.artifact_id, self.version),
        }
    }

    /// `{artifact}-{version}[-{classifier}].{extension}` 形式のファイル名。
    pub fn file_name(&self, extension: &str) -> String {
        format!("{}.{}", self.file_basename(), extension)
    }

    /// リポジトリルートからの相対パス（任意の拡張子）。
    pub fn artifact_path(&self, extension: &str) -> String {
        format!("{}/{}", self.version_path(), self.file_name(extension))
    }

    /// POMの相対パス。POMには分類子が付かない。
    pub fn pom_path(&self) -> String {
        format!(
            "{}/{}-{}.pom",
            self.version_path(),
            self.artifact_id,
            self.version
        )
    }

    pub fn checksum_path(&self, extension: &str, algorithm_extension: &str) -> String {
        format!("{}.{}", self.artifact_path(extension), algorithm_extension)
    }
}

impl fmt::Display for ArtifactCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(classifier) = &self.classifier {
            write!(
                f,
                "{}:{}:{}:{}",
                self.group_id, self.artifact_id, self.version, classifier
            )
        } else {
            write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)
        }
    }
}

/// 解決対象のアーティファクト。
///
/// Identity is the full coordinate tuple including the classifier; the
/// remaining fields (extension, packaging, repository binding, declared
/// exclusions) are attributes and do not participate in equality or hashing.
/// `repository` is bound by host discovery; `version` may hold `LATEST`,
/// `RELEASE` or a bracket range until metadata lookup pins it.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub coordinates: ArtifactCoordinates,
    pub extension: String,
    pub packaging: Option<String>,
    pub repository: Option<Arc<RemoteRepository>>,
    /// Exclusions declared on the dependency entry that produced this
    /// artifact. The walker unions these into the inherited set of the
    /// subtree below it.
    pub exclusions: Vec<MavenCoordinates>,
}

impl Artifact {
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        Self {
            coordinates: ArtifactCoordinates::new(group_id, artifact_id, ""),
            extension: "jar".to_string(),
            packaging: None,
            repository: None,
            exclusions: Vec::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.coordinates.version = version.into();
        self
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.coordinates.classifier = Some(classifier.into());
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn group_id(&self) -> &str {
        &self.coordinates.group_id
    }

    pub fn artifact_id(&self) -> &str {
        &self.coordinates.artifact_id
    }

    pub fn version(&self) -> &str {
        &self.coordinates.version
    }

    pub fn classifier(&self) -> Option<&str> {
        self.coordinates.classifier()
    }

    pub fn ga_key(&self) -> (String, String) {
        self.coordinates.ga_key()
    }

    /// `pom` パッケージングのアーティファクトにはダウンロードすべきJarがない。
    pub fn is_pom_packaging(&self) -> bool {
        self.packaging.as_deref() == Some("pom") || self.extension.eq_ignore_ascii_case("pom")
    }

    /// ダウンロード先のファイル名（フラットレイアウト用）。
    pub fn file_name(&self) -> String {
        self.coordinates.file_name(&self.extension)
    }

    /// バインド済みリポジトリに対する完全なダウンロードURL。
    pub fn download_url(&self) -> Option<String> {
        let repository = self.repository.as_ref()?;
        repository
            .artifact_url(&self.coordinates, &self.extension)
            .ok()
            .map(|url| url.to_string())
    }
}

impl PartialEq for Artifact {
    fn eq(&self, other: &Self) -> bool {
        self.coordinates == other.coordinates
    }
}

impl Eq for Artifact {}

impl Hash for Artifact {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.coordinates.hash(state);
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.coordinates.fmt(f)
    }
}
