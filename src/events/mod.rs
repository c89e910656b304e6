//! Resolution and download lifecycle observer.
//!
//! The walker and the downloader invoke the listener from multiple
//! concurrent tasks; implementations must be thread-safe. The default
//! implementation forwards everything to `tracing`.

use tracing::{error, info, warn};

use crate::artifact::Artifact;
use crate::download::DownloadError;
use crate::pom::PomError;

/// Observer for resolution and download lifecycle events.
///
/// All methods default to no-ops so implementations only override what they
/// care about.
pub trait ResolutionListener: Send + Sync {
    /// The artifact was already resolved (or is dominated by a newer cached
    /// version) and its subtree is not fetched again.
    fn on_skipping_resolution(&self, _artifact: &Artifact) {}

    /// The artifact's POM was fetched and its direct dependencies assigned.
    fn on_resolution_complete(&self, _artifact: &Artifact, _direct_dependencies: usize) {}

    /// The POM parsed cleanly but no dependency survived the scope filters.
    fn on_dependencies_not_found(&self, _artifact: &Artifact) {}

    /// The POM existed but could not be interpreted.
    fn on_invalid_pom(&self, _artifact: &Artifact, _error: &PomError) {}

    /// No configured repository serves the coordinate.
    fn on_version_not_found(&self, _artifact: &Artifact) {}

    /// A dependency edge closed a cycle and was dropped.
    fn on_cycle_detected(&self, _artifact: &Artifact) {}

    fn on_download_start(&self, _artifact: &Artifact) {}

    fn on_download_end(&self, _artifact: &Artifact, _bytes: u64) {}

    fn on_download_error(&self, _artifact: &Artifact, _error: &DownloadError) {}

    fn info(&self, _message: &str) {}

    fn warning(&self, _message: &str) {}

    fn error(&self, _message: &str) {}
}

/// 既定のリスナー。すべてのイベントを `tracing` へ流す。
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListener;

impl ResolutionListener for TracingListener {
    fn on_skipping_resolution(&self, artifact: &Artifact) {
        info!(artifact = %artifact, "解決済みのためスキップします");
    }

    fn on_resolution_complete(&self, artifact: &Artifact, direct_dependencies: usize) {
        info!(
            artifact = %artifact,
            direct = direct_dependencies,
            "依存解決が完了しました"
        );
    }

    fn on_dependencies_not_found(&self, artifact: &Artifact) {
        info!(artifact = %artifact, "依存が1件もありません");
    }

    fn on_invalid_pom(&self, artifact: &Artifact, error: &PomError) {
        warn!(artifact = %artifact, error = %error, "POMを解釈できません");
    }

    fn on_version_not_found(&self, artifact: &Artifact) {
        warn!(artifact = %artifact, "どのリポジトリからもPOMを取得できません");
    }

    fn on_cycle_detected(&self, artifact: &Artifact) {
        warn!(artifact = %artifact, "依存グラフに循環を検出。エッジを破棄します");
    }

    fn on_download_start(&self, artifact: &Artifact) {
        info!(artifact = %artifact, "ダウンロードを開始します");
    }

    fn on_download_end(&self, artifact: &Artifact, bytes: u64) {
        info!(artifact = %artifact, bytes, "ダウンロードが完了しました");
    }

    fn on_download_error(&self, artifact: &Artifact, error: &DownloadError) {
        warn!(artifact = %artifact, error = %error, "ダウンロードに失敗しました");
    }

    fn info(&self, message: &str) {
        info!("{message}");
    }

    fn warning(&self, message: &str) {
        warn!("{message}");
    }

    fn error(&self, message: &str) {
        error!("{message}");
    }
}

/// 何も記録しないリスナー。
#[derive(Debug, Default, Clone, Copy)]
pub struct NullListener;

impl ResolutionListener for NullListener {}
