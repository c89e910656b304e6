use quick_xml::de::from_reader;
use serde::Deserialize;
use thiserror::Error;

use crate::artifact::version::{compare_versions, is_version_range, range_contains};

/// Mavenリポジトリが提供する `maven-metadata.xml` の表現。
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MavenMetadata {
    #[serde(rename = "groupId")]
    pub group_id: String,
    #[serde(rename = "artifactId")]
    pub artifact_id: String,
    #[serde(default)]
    pub versioning: Option<Versioning>,
}

impl MavenMetadata {
    /// 利用可能なバージョン一覧を返す（空の場合は空ベクタ）。
    pub fn versions(&self) -> &[String] {
        self.versioning
            .as_ref()
            .map(|versioning| versioning.versions.items.as_slice())
            .unwrap_or_default()
    }

    /// 最も新しいリリースバージョンを返す。
    pub fn latest_release(&self) -> Option<&str> {
        self.versioning
            .as_ref()
            .and_then(|versioning| versioning.release.as_deref())
    }

    /// リポジトリが公開している最新版（スナップショット含む）を返す。
    pub fn latest(&self) -> Option<&str> {
        self.versioning
            .as_ref()
            .and_then(|versioning| versioning.latest.as_deref())
    }

    fn highest_listed(&self) -> Option<&str> {
        self.versions()
            .iter()
            .max_by(|a, b| compare_versions(a, b))
            .map(String::as_str)
    }

    /// Pins a floating version spec (`LATEST`, `RELEASE`, empty, or a bracket
    /// range) against the versions this metadata lists. Ranges select the
    /// highest contained version; `RELEASE` prefers the `<release>` field and
    /// `LATEST` the `<latest>` field, both falling back to the highest listed
    /// version.
    pub fn select(&self, spec: &str) -> Option<String> {
        let trimmed = spec.trim();
        if is_version_range(trimmed) {
            return self
                .versions()
                .iter()
                .filter(|version| range_contains(trimmed, version))
                .max_by(|a, b| compare_versions(a, b))
                .cloned();
        }

        let preferred = if trimmed.eq_ignore_ascii_case("RELEASE") {
            self.latest_release()
        } else {
            // LATEST and the empty marker both take the newest the repository offers.
            self.latest()
        };

        preferred
            .map(str::to_string)
            .or_else(|| self.highest_listed().map(str::to_string))
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Versioning {
    pub latest: Option<String>,
    pub release: Option<String>,
    #[serde(default)]
    pub versions: Versions,
    #[serde(rename = "lastUpdated")]
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Versions {
    #[serde(default)]
    #[serde(rename = "version")]
    pub items: Vec<String>,
}

/// `maven-metadata.xml` のパースエラー。
#[derive(Debug, Error)]
pub enum MetadataParseError {
    #[error("maven-metadata.xmlの解析に失敗しました: {0}")]
    Xml(#[from] quick_xml::DeError),
}

/// `maven-metadata.xml` を構造体へ変換する。
pub fn parse_metadata(bytes: &[u8]) -> Result<MavenMetadata, MetadataParseError> {
    from_reader(bytes).map_err(MetadataParseError::from)
}
