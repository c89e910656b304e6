//! Ordered repository registry and host discovery.
//!
//! The registry owns the configured remote endpoints and binds a coordinate
//! to the first repository that claims it. Discovery is sequential per
//! artifact (the order is the configured priority) but the walker runs many
//! discoveries in parallel.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use reqwest::Client;
use tracing::{debug, warn};

use crate::artifact::version::is_floating_version;
use crate::artifact::ArtifactCoordinates;
use crate::pom::{PomError, RepositoryDecl};
use crate::repository::defaults::DEFAULT_REPOSITORIES;
use crate::repository::{build_client, RemoteRepository, RepositoryError, RetryConfig};

/// ホスト探索の結果。リポジトリのバインドと取得済みPOMを運ぶ。
#[derive(Debug, Clone)]
pub struct LocatedPom {
    pub repository: Arc<RemoteRepository>,
    /// 要求座標。フローティング版（`LATEST`/`RELEASE`/範囲）は具体的な
    /// バージョンに固定されている。
    pub coordinates: ArtifactCoordinates,
    pub xml: String,
}

/// Network seam between the graph walker and the repository layer. The
/// production implementation is [`RepositoryRegistry`]; tests substitute an
/// in-memory directory.
pub trait RepositoryDirectory: Send + Sync {
    /// Finds the POM for a coordinate, trying each configured repository in
    /// order and resolving floating versions through `maven-metadata.xml`.
    fn locate_pom<'a>(
        &'a self,
        coords: &'a ArtifactCoordinates,
    ) -> Pin<Box<dyn Future<Output = Result<LocatedPom, PomError>> + Send + 'a>>;

    /// Registers repositories discovered in a POM's `<repositories>` section.
    fn register_repositories(&self, _declared: &[RepositoryDecl]) {}
}

/// 設定済みリモートリポジトリの順序付きリスト。
pub struct RepositoryRegistry {
    client: Client,
    retry: RetryConfig,
    repositories: Mutex<Vec<Arc<RemoteRepository>>>,
}

impl RepositoryRegistry {
    /// デフォルトのリポジトリ（Maven Central / Google / Jitpack）で初期化する。
    pub fn with_defaults() -> Result<Self, RepositoryError> {
        let registry = Self::empty()?;
        for default in DEFAULT_REPOSITORIES {
            registry.add(default.name, default.url)?;
        }
        Ok(registry)
    }

    /// リポジトリなしで初期化する（テストや特殊構成向け）。
    pub fn empty() -> Result<Self, RepositoryError> {
        Ok(Self {
            client: build_client()?,
            retry: RetryConfig::default(),
            repositories: Mutex::new(Vec::new()),
        })
    }

    /// リポジトリを末尾に追加する。URLが重複する場合は何もしない。
    pub fn add(
        &self,
        name: impl Into<String>,
        base_url: impl AsRef<str>,
    ) -> Result<(), RepositoryError> {
        let repository = RemoteRepository::with_client(
            name,
            base_url,
            self.client.clone(),
            self.retry,
        )?;
        let mut repositories = self.repositories.lock().expect("repository registry lock");
        if repositories
            .iter()
            .any(|existing| existing.base_url() == repository.base_url())
        {
            return Ok(());
        }
        repositories.push(Arc::new(repository));
        Ok(())
    }

    /// 現在のリポジトリ一覧のスナップショット。
    pub fn repositories(&self) -> Vec<Arc<RemoteRepository>> {
        self.repositories
            .lock()
            .expect("repository registry lock")
            .clone()
    }

    async fn locate(&self, coords: &ArtifactCoordinates) -> Result<LocatedPom, PomError> {
        let repositories = self.repositories();
        if repositories.is_empty() {
            return Err(PomError::VersionNotFound {
                coordinates: coords.clone(),
                reason: "リポジトリが1つも設定されていません".to_string(),
            });
        }

        if is_floating_version(&coords.version) {
            return self.locate_floating(coords, &repositories).await;
        }

        let mut last_error: Option<RepositoryError> = None;
        for repository in &repositories {
            match repository.fetch_pom(coords).await {
                Ok(xml) => {
                    debug!(artifact = %coords, repository = %repository.name(), "ホスト探索で一致");
                    return Ok(LocatedPom {
                        repository: repository.clone(),
                        coordinates: coords.clone(),
                        xml,
                    });
                }
                Err(error) if error.is_missing() => {
                    last_error = Some(error);
                }
                // The repository claimed the coordinate but served garbage.
                Err(error) => {
                    return Err(PomError::from_repository(coords, error));
                }
            }
        }

        Err(PomError::VersionNotFound {
            coordinates: coords.clone(),
            reason: match last_error {
                Some(error) => format!("どのリポジトリも座標を提供していません: {error}"),
                None => "どのリポジトリも座標を提供していません".to_string(),
            },
        })
    }

    /// `LATEST`/`RELEASE`/バージョン範囲をメタデータで固定してから取得する。
    async fn locate_floating(
        &self,
        coords: &ArtifactCoordinates,
        repositories: &[Arc<RemoteRepository>],
    ) -> Result<LocatedPom, PomError> {
        let ga = coords.maven_coordinates();
        let mut last_error: Option<RepositoryError> = None;

        for repository in repositories {
            let metadata = match repository.fetch_metadata(&ga).await {
                Ok(metadata) => metadata,
                Err(error) => {
                    last_error = Some(error);
                    continue;
                }
            };

            let Some(version) = metadata.select(&coords.version) else {
                debug!(
                    coordinates = %ga,
                    spec = %coords.version,
                    repository = %repository.name(),
                    "メタデータに条件を満たすバージョンがありません"
                );
                continue;
            };

            let mut pinned = coords.clone();
            pinned.version = version;
            match repository.fetch_pom(&pinned).await {
                Ok(xml) => {
                    debug!(
                        artifact = %pinned,
                        spec = %coords.version,
                        repository = %repository.name(),
                        "フローティングバージョンを固定"
                    );
                    return Ok(LocatedPom {
                        repository: repository.clone(),
                        coordinates: pinned,
                        xml,
                    });
                }
                Err(error) if error.is_missing() => {
                    last_error = Some(error);
                }
                Err(error) => {
                    return Err(PomError::from_repository(&pinned, error));
                }
            }
        }

        Err(PomError::VersionNotFound {
            coordinates: coords.clone(),
            reason: match last_error {
                Some(error) => {
                    format!("バージョン指定 '{}' を解決できません: {error}", coords.version)
                }
                None => format!("バージョン指定 '{}' を解決できません", coords.version),
            },
        })
    }
}

impl RepositoryDirectory for RepositoryRegistry {
    fn locate_pom<'a>(
        &'a self,
        coords: &'a ArtifactCoordinates,
    ) -> Pin<Box<dyn Future<Output = Result<LocatedPom, PomError>> + Send + 'a>> {
        Box::pin(self.locate(coords))
    }

    fn register_repositories(&self, declared: &[RepositoryDecl]) {
        for decl in declared {
            let name = decl.id.clone().unwrap_or_else(|| decl.url.clone());
            if let Err(error) = self.add(name, &decl.url) {
                warn!(url = %decl.url, error = %error, "POM宣言リポジトリを追加できません");
            }
        }
    }
}
