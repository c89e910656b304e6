//! Public façade: project resolution and artifact download.
//!
//! `ProjectResolver` wires the repository directory, the single-flight
//! cache and the event listener together. The collaborators are injected so
//! callers can substitute any of them; `new()` builds the default stack
//! (default repositories, fresh cache, tracing listener).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::artifact::Artifact;
use crate::download::{ArtifactDownloader, DownloadReport};
use crate::events::{ResolutionListener, TracingListener};
use crate::repository::{RepositoryDirectory, RepositoryError, RepositoryRegistry};
use crate::resolver::{reconcile, GraphWalker, ResolutionCache, DEFAULT_MAX_CONCURRENT_RESOLVES};

mod gradle;
mod maven;

/// 呼び出し側へ伝播する唯一の失敗。グラフ内部の失敗はイベントへ degrade する。
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("プロジェクトマニフェスト {path} を解釈できません: {reason}")]
    InvalidManifest { path: PathBuf, reason: String },
    #[error("出力ディレクトリを準備できません: {0}")]
    OutputDir(#[from] std::io::Error),
    #[error("リポジトリ層の初期化に失敗しました: {0}")]
    Repository(#[from] RepositoryError),
}

/// Resolves a project's transitive dependency closure and materializes
/// artifacts on disk.
pub struct ProjectResolver {
    directory: Arc<dyn RepositoryDirectory>,
    cache: Arc<ResolutionCache>,
    listener: Arc<dyn ResolutionListener>,
    max_concurrent: usize,
}

impl ProjectResolver {
    /// Default stack: Maven Central / Google / Jitpack, fresh cache,
    /// tracing-backed listener.
    pub fn new() -> Result<Self, RepositoryError> {
        Ok(Self::with_directory(Arc::new(
            RepositoryRegistry::with_defaults()?,
        )))
    }

    /// Uses a custom repository directory (or registry).
    pub fn with_directory(directory: Arc<dyn RepositoryDirectory>) -> Self {
        Self {
            directory,
            cache: ResolutionCache::new(),
            listener: Arc::new(TracingListener),
            max_concurrent: DEFAULT_MAX_CONCURRENT_RESOLVES,
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn ResolutionListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// The shared resolution cache. Subsequent `resolve` calls on the same
    /// instance reuse published results instead of refetching POMs.
    pub fn cache(&self) -> &Arc<ResolutionCache> {
        &self.cache
    }

    /// Resolves the project in `project_dir` to a deduplicated,
    /// version-reconciled artifact list.
    ///
    /// `pom.xml` takes precedence; a `build.gradle(.kts)` is used otherwise.
    /// A directory with neither manifest resolves to an empty list. Only a
    /// malformed root manifest is surfaced as an error; every failure
    /// inside the walk degrades the affected node and is reported through
    /// the listener.
    pub async fn resolve(
        &self,
        project_dir: impl AsRef<Path>,
    ) -> Result<Vec<Artifact>, ResolveError> {
        let project_dir = project_dir.as_ref();

        let direct = self.direct_dependencies(project_dir).await?;
        if direct.is_empty() {
            return Ok(Vec::new());
        }

        let walker = GraphWalker::new(
            Arc::clone(&self.directory),
            Arc::clone(&self.cache),
            Arc::clone(&self.listener),
        )
        .with_max_concurrent(self.max_concurrent);

        let (graph, roots) = walker.walk(direct).await;
        Ok(reconcile(&graph, &roots))
    }

    async fn direct_dependencies(
        &self,
        project_dir: &Path,
    ) -> Result<Vec<Artifact>, ResolveError> {
        let pom_path = project_dir.join("pom.xml");
        if pom_path.is_file() {
            let project = maven::load_project(&pom_path, self.directory.as_ref()).await?;
            if !project.repositories.is_empty() {
                self.directory.register_repositories(&project.repositories);
            }
            self.listener.info(&format!(
                "{} の直接依存 {} 件を解決します",
                project.root,
                project.direct.len()
            ));
            return Ok(project.direct);
        }

        if let Some(gradle_path) = gradle::find_manifest(project_dir) {
            let contents = std::fs::read_to_string(&gradle_path).map_err(|error| {
                ResolveError::InvalidManifest {
                    path: gradle_path.clone(),
                    reason: error.to_string(),
                }
            })?;
            let direct = gradle::parse_dependencies(&contents);
            self.listener.info(&format!(
                "{} の直接依存 {} 件を解決します",
                gradle_path.display(),
                direct.len()
            ));
            return Ok(direct);
        }

        Ok(Vec::new())
    }

    /// Downloads artifacts into `output_dir` using the flat
    /// `{artifact}-{version}[-{classifier}].{ext}` layout. Existing files
    /// are skipped; per-artifact failures are reported through the listener
    /// and the returned report without aborting the batch.
    pub async fn download(
        &self,
        output_dir: impl AsRef<Path>,
        artifacts: &[Artifact],
    ) -> Result<DownloadReport, ResolveError> {
        let downloader = ArtifactDownloader::new(Arc::clone(&self.listener))
            .with_max_concurrent(self.max_concurrent);
        let report = downloader
            .download_all(output_dir.as_ref(), artifacts)
            .await?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn directory_without_manifest_resolves_to_empty() {
        let temp = tempdir().expect("tempdir");
        let resolver = ProjectResolver::with_directory(Arc::new(
            RepositoryRegistry::empty().expect("registry"),
        ));
        let result = resolver.resolve(temp.path()).await.expect("resolve");
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn malformed_root_pom_is_an_invalid_manifest() {
        let temp = tempdir().expect("tempdir");
        std::fs::write(temp.path().join("pom.xml"), "<project><broken").expect("write pom");

        let resolver = ProjectResolver::with_directory(Arc::new(
            RepositoryRegistry::empty().expect("registry"),
        ));
        let result = resolver.resolve(temp.path()).await;
        assert!(matches!(
            result,
            Err(ResolveError::InvalidManifest { .. })
        ));
    }

    #[tokio::test]
    async fn gradle_manifest_without_dependencies_resolves_to_empty() {
        let temp = tempdir().expect("tempdir");
        std::fs::write(
            temp.path().join("build.gradle"),
            "plugins { id 'java' }\n",
        )
        .expect("write build.gradle");

        let resolver = ProjectResolver::with_directory(Arc::new(
            RepositoryRegistry::empty().expect("registry"),
        ));
        let result = resolver.resolve(temp.path()).await.expect("resolve");
        assert!(result.is_empty());
    }
}
