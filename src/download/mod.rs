//! Bulk artifact download.
//!
//! Materializes resolved artifacts into a flat directory
//! (`{artifact}-{version}[-{classifier}].{ext}`). Existing files are skipped
//! without issuing a request, `pom`-packaged artifacts have nothing to
//! download, and per-artifact failures are collected without aborting the
//! batch. Downloads run with bounded parallelism and are checksum-verified
//! when the repository publishes a checksum file.

use std::collections::VecDeque;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::artifact::{Artifact, ArtifactCoordinates};
use crate::events::ResolutionListener;
use crate::repository::{ChecksumAlgorithm, RepositoryError};

/// 同時ダウンロード数の既定値。
pub const DEFAULT_MAX_CONCURRENT_DOWNLOADS: usize = 8;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("リポジトリが未バインドのためダウンロードできません: {coordinates}")]
    RepositoryUnbound { coordinates: ArtifactCoordinates },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("チェックサム不一致: {coordinates} ({algorithm}, expected={expected}, actual={actual})")]
    ChecksumMismatch {
        coordinates: ArtifactCoordinates,
        algorithm: ChecksumAlgorithm,
        expected: String,
        actual: String,
    },
    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),
}

/// ダウンロード元の抽象。テストではインメモリ実装に差し替える。
pub trait ArtifactFetcher: Send + Sync {
    fn fetch<'a>(
        &'a self,
        artifact: &'a Artifact,
    ) -> Pin<Box<dyn Future<Output = Result<Bytes, DownloadError>> + Send + 'a>>;
}

/// Fetches from the artifact's bound repository, verifying against the first
/// checksum file the repository publishes (`.sha1`, `.sha256`, `.md5`).
/// Repositories without checksum files are tolerated.
#[derive(Debug, Default, Clone, Copy)]
pub struct RepositoryFetcher;

impl ArtifactFetcher for RepositoryFetcher {
    fn fetch<'a>(
        &'a self,
        artifact: &'a Artifact,
    ) -> Pin<Box<dyn Future<Output = Result<Bytes, DownloadError>> + Send + 'a>> {
        Box::pin(async move {
            let repository = artifact.repository.as_ref().ok_or_else(|| {
                DownloadError::RepositoryUnbound {
                    coordinates: artifact.coordinates.clone(),
                }
            })?;

            let bytes = repository
                .fetch_artifact(&artifact.coordinates, &artifact.extension)
                .await?;

            for algorithm in [
                ChecksumAlgorithm::Sha1,
                ChecksumAlgorithm::Sha256,
                ChecksumAlgorithm::Md5,
            ] {
                match repository
                    .fetch_checksum(&artifact.coordinates, &artifact.extension, algorithm)
                    .await
                {
                    Ok(expected) => {
                        let actual = algorithm.compute(bytes.as_ref());
                        if actual != expected {
                            return Err(DownloadError::ChecksumMismatch {
                                coordinates: artifact.coordinates.clone(),
                                algorithm,
                                expected,
                                actual,
                            });
                        }
                        return Ok(bytes);
                    }
                    Err(error) if error.is_missing() => continue,
                    Err(error) => {
                        warn!(
                            artifact = %artifact,
                            algorithm = %algorithm,
                            error = %error,
                            "チェックサム取得に失敗したため検証なしで続行します"
                        );
                        return Ok(bytes);
                    }
                }
            }

            debug!(artifact = %artifact, "チェックサムファイルが存在しないため検証をスキップ");
            Ok(bytes)
        })
    }
}

#[derive(Debug)]
pub struct DownloadOutcome {
    pub artifact: Artifact,
    pub path: PathBuf,
    pub bytes: u64,
}

#[derive(Debug)]
pub struct DownloadFailure {
    pub artifact: Artifact,
    pub error: DownloadError,
}

/// バッチ全体の結果。失敗があってもバッチは完走する。
#[derive(Debug, Default)]
pub struct DownloadReport {
    pub completed: Vec<DownloadOutcome>,
    pub skipped: Vec<Artifact>,
    pub failures: Vec<DownloadFailure>,
}

impl DownloadReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Bounded-parallel downloader over an [`ArtifactFetcher`].
pub struct ArtifactDownloader<F = RepositoryFetcher>
where
    F: ArtifactFetcher + Send + Sync + 'static,
{
    fetcher: Arc<F>,
    listener: Arc<dyn ResolutionListener>,
    max_concurrent: usize,
}

impl ArtifactDownloader<RepositoryFetcher> {
    pub fn new(listener: Arc<dyn ResolutionListener>) -> Self {
        Self::with_fetcher(Arc::new(RepositoryFetcher), listener)
    }
}

impl<F> ArtifactDownloader<F>
where
    F: ArtifactFetcher + Send + Sync + 'static,
{
    pub fn with_fetcher(fetcher: Arc<F>, listener: Arc<dyn ResolutionListener>) -> Self {
        Self {
            fetcher,
            listener,
            max_concurrent: DEFAULT_MAX_CONCURRENT_DOWNLOADS,
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Downloads every artifact into `output_dir`. Only directory creation
    /// errors surface as `Err`; per-artifact failures land in the report.
    pub async fn download_all(
        &self,
        output_dir: &Path,
        artifacts: &[Artifact],
    ) -> Result<DownloadReport, std::io::Error> {
        tokio::fs::create_dir_all(output_dir).await?;

        let mut report = DownloadReport::default();
        let mut queue: VecDeque<(Artifact, PathBuf)> = VecDeque::new();

        for artifact in artifacts {
            if artifact.is_pom_packaging() {
                debug!(artifact = %artifact, "pomパッケージングのためダウンロード対象外");
                report.skipped.push(artifact.clone());
                continue;
            }

            let target = output_dir.join(artifact.file_name());
            if target.exists() {
                self.listener
                    .info(&format!("{artifact} は取得済みです ({})", target.display()));
                report.skipped.push(artifact.clone());
                continue;
            }

            queue.push_back((artifact.clone(), target));
        }

        let mut join_set: JoinSet<Result<DownloadOutcome, DownloadFailure>> = JoinSet::new();
        while let Some((artifact, target)) = queue.pop_front() {
            let fetcher = Arc::clone(&self.fetcher);
            let listener = Arc::clone(&self.listener);
            join_set.spawn(async move {
                listener.on_download_start(&artifact);
                match download_single(fetcher.as_ref(), &artifact, &target).await {
                    Ok(bytes) => {
                        listener.on_download_end(&artifact, bytes);
                        Ok(DownloadOutcome {
                            artifact,
                            path: target,
                            bytes,
                        })
                    }
                    Err(error) => {
                        listener.on_download_error(&artifact, &error);
                        Err(DownloadFailure { artifact, error })
                    }
                }
            });

            if join_set.len() >= self.max_concurrent {
                consume_next(&mut join_set, &mut report).await;
            }
        }
        while !join_set.is_empty() {
            consume_next(&mut join_set, &mut report).await;
        }

        Ok(report)
    }
}

async fn download_single<F: ArtifactFetcher + ?Sized>(
    fetcher: &F,
    artifact: &Artifact,
    target: &Path,
) -> Result<u64, DownloadError> {
    let bytes = fetcher.fetch(artifact).await?;
    tokio::fs::write(target, bytes.as_ref()).await?;
    Ok(bytes.len() as u64)
}

async fn consume_next(
    join_set: &mut JoinSet<Result<DownloadOutcome, DownloadFailure>>,
    report: &mut DownloadReport,
) {
    if let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(Ok(outcome)) => report.completed.push(outcome),
            Ok(Err(failure)) => report.failures.push(failure),
            Err(join_error) => {
                warn!(error = %join_error, "ダウンロードタスクが異常終了しました");
            }
        }
    }
}
