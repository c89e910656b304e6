use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use reqwest::{Client, StatusCode, Url};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::ParseError;

use crate::artifact::{ArtifactCoordinates, MavenCoordinates};
use crate::pom::metadata::{self, MavenMetadata, MetadataParseError};

pub mod defaults;
pub mod registry;

pub use registry::{LocatedPom, RepositoryDirectory, RepositoryRegistry};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// リトライ挙動を制御する設定。
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl RetryConfig {
    pub fn new(base_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        let mut config = Self {
            base_delay,
            max_delay,
            max_attempts,
        };
        config.normalize();
        config
    }

    fn normalize(&mut self) {
        if self.max_attempts == 0 {
            self.max_attempts = 1;
        }
        if self.max_delay < self.base_delay {
            self.max_delay = self.base_delay;
        }
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(20);
        let base_ms = self.base_delay.as_millis() as u128;
        let multiplier = 1u128 << exp;
        let delay_ms = base_ms.saturating_mul(multiplier);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as u128);
        Duration::from_millis(capped_ms as u64)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(5), 5)
    }
}

/// チェックサムアルゴリズムの選択肢。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    Sha256,
    Sha1,
    Md5,
}

impl ChecksumAlgorithm {
    pub fn extension(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Sha256 => "sha256",
            ChecksumAlgorithm::Sha1 => "sha1",
            ChecksumAlgorithm::Md5 => "md5",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Sha256 => "SHA-256",
            ChecksumAlgorithm::Sha1 => "SHA-1",
            ChecksumAlgorithm::Md5 => "MD5",
        }
    }

    pub fn compute(&self, bytes: &[u8]) -> String {
        match self {
            ChecksumAlgorithm::Sha256 => format!("{:x}", Sha256::digest(bytes)),
            ChecksumAlgorithm::Sha1 => {
                let mut hasher = Sha1::new();
                hasher.update(bytes);
                format!("{:x}", hasher.finalize())
            }
            ChecksumAlgorithm::Md5 => format!("{:x}", md5::compute(bytes)),
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// リモートリポジトリに関するエラー種別。
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("リポジトリURL '{url}' が不正です: {source}")]
    InvalidUrl { url: String, source: ParseError },
    #[error("リポジトリURLの構築に失敗しました (base: {base}, path: {path}): {source}")]
    UrlJoin {
        base: String,
        path: String,
        source: ParseError,
    },
    #[error("HTTPクライアントの初期化に失敗しました: {source}")]
    ClientBuild { source: reqwest::Error },
    #[error("{resource} が見つかりません (HTTP {status})")]
    NotFound { resource: String, status: StatusCode },
    #[error("HTTP {status} が返されました: {resource}")]
    HttpStatus {
        resource: String,
        status: StatusCode,
    },
    #[error("リポジトリ通信に失敗しました: {source}")]
    Network { source: reqwest::Error },
    #[error("{resource} の内容が不正です: {message}")]
    InvalidResponse { resource: String, message: String },
    #[error("メタデータの解析に失敗しました ({coordinates}): {source}")]
    MetadataParse {
        coordinates: MavenCoordinates,
        source: MetadataParseError,
    },
}

impl RepositoryError {
    /// 「座標がこのリポジトリに存在しない」系の失敗かどうか。
    /// ホスト探索では次のリポジトリを試す判断に使う。
    pub fn is_missing(&self) -> bool {
        matches!(
            self,
            RepositoryError::NotFound { .. }
                | RepositoryError::HttpStatus { .. }
                | RepositoryError::Network { .. }
        )
    }
}

/// Maven Central などのHTTPリモートリポジトリ。
#[derive(Debug)]
pub struct RemoteRepository {
    name: String,
    base_url: Url,
    client: Client,
    retry: RetryConfig,
}

impl RemoteRepository {
    /// デフォルト設定でリポジトリクライアントを生成する。
    pub fn new(
        name: impl Into<String>,
        base_url: impl AsRef<str>,
    ) -> Result<Self, RepositoryError> {
        let client = build_client()?;
        Self::with_client(name, base_url, client, RetryConfig::default())
    }

    /// 既存のHTTPクライアント（共有コネクションプール）を利用する。
    pub fn with_client(
        name: impl Into<String>,
        base_url: impl AsRef<str>,
        client: Client,
        retry: RetryConfig,
    ) -> Result<Self, RepositoryError> {
        let mut base_url =
            Url::parse(base_url.as_ref()).map_err(|source| RepositoryError::InvalidUrl {
                url: base_url.as_ref().to_string(),
                source,
            })?;
        ensure_trailing_slash(&mut base_url);

        Ok(Self {
            name: name.into(),
            base_url,
            client,
            retry,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn pom_url(&self, coords: &ArtifactCoordinates) -> Result<Url, RepositoryError> {
        self.join_path(&coords.pom_path())
    }

    pub fn artifact_url(
        &self,
        coords: &ArtifactCoordinates,
        extension: &str,
    ) -> Result<Url, RepositoryError> {
        self.join_path(&coords.artifact_path(extension))
    }

    pub fn metadata_url(&self, coords: &MavenCoordinates) -> Result<Url, RepositoryError> {
        self.join_path(&coords.metadata_path())
    }

    /// POMのURLに対するHEADプローブ。2xxなら座標はこのリポジトリのもの。
    pub async fn probe(&self, coords: &ArtifactCoordinates) -> bool {
        let Ok(url) = self.pom_url(coords) else {
            return false;
        };
        match self.client.head(url.clone()).send().await {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                debug!(repository = %self.name, url = %url, error = %error, "HEADプローブ失敗");
                false
            }
        }
    }

    /// POMファイルを取得し、UTF-8文字列として返す。
    pub async fn fetch_pom(&self, coords: &ArtifactCoordinates) -> Result<String, RepositoryError> {
        let url = self.pom_url(coords)?;
        let resource = format!("pom {coords}");
        let bytes = self.request_bytes(url, &resource).await?;
        std::str::from_utf8(bytes.as_ref())
            .map(|text| text.to_owned())
            .map_err(|error| RepositoryError::InvalidResponse {
                resource,
                message: error.to_string(),
            })
    }

    /// `maven-metadata.xml` を取得して構造体へ変換する。
    pub async fn fetch_metadata(
        &self,
        coords: &MavenCoordinates,
    ) -> Result<MavenMetadata, RepositoryError> {
        let url = self.metadata_url(coords)?;
        let resource = format!("metadata {coords}");
        let bytes = self.request_bytes(url, &resource).await?;
        metadata::parse_metadata(bytes.as_ref()).map_err(|source| RepositoryError::MetadataParse {
            coordinates: coords.clone(),
            source,
        })
    }

    /// アーティファクト本体（jar等）をダウンロードする。
    pub async fn fetch_artifact(
        &self,
        coords: &ArtifactCoordinates,
        extension: &str,
    ) -> Result<Bytes, RepositoryError> {
        let url = self.artifact_url(coords, extension)?;
        let resource = format!("{extension} {coords}");
        self.request_bytes(url, &resource).await
    }

    /// 指定アルゴリズムのチェックサムファイルを取得し、正規化したハッシュ文字列を返す。
    pub async fn fetch_checksum(
        &self,
        coords: &ArtifactCoordinates,
        extension: &str,
        algorithm: ChecksumAlgorithm,
    ) -> Result<String, RepositoryError> {
        let url = self.join_path(&coords.checksum_path(extension, algorithm.extension()))?;
        let resource = format!("checksum {coords} ({algorithm})");
        let bytes = self.request_bytes(url, &resource).await?;
        let text =
            std::str::from_utf8(bytes.as_ref()).map_err(|error| {
                RepositoryError::InvalidResponse {
                    resource: resource.clone(),
                    message: error.to_string(),
                }
            })?;
        first_checksum_token(text).ok_or_else(|| RepositoryError::InvalidResponse {
            resource,
            message: format!("{}チェックサムが含まれていません", algorithm.description()),
        })
    }

    fn join_path(&self, relative: &str) -> Result<Url, RepositoryError> {
        self.base_url
            .join(relative)
            .map_err(|source| RepositoryError::UrlJoin {
                base: self.base_url.to_string(),
                path: relative.to_string(),
                source,
            })
    }

    /// GETを送り、成功すれば本文を返す。5xxと接続断・タイムアウトだけを
    /// 指数バックオフ付きで再試行する。4xxは即座に確定（再試行なし）。
    async fn request_bytes(&self, url: Url, resource: &str) -> Result<Bytes, RepositoryError> {
        let attempts = self.retry.max_attempts.max(1);
        let mut retryable_failure: Option<RepositoryError> = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                sleep(self.retry.delay_for_attempt(attempt - 1)).await;
            }
            debug!(
                attempt,
                attempts,
                repository = %self.name,
                target = %resource,
                url = %url,
                "リモートリポジトリへGETを送信します"
            );

            let response = match self.client.get(url.clone()).send().await {
                Ok(response) => response,
                Err(error) => {
                    let transient = error.is_connect() || error.is_timeout();
                    warn!(
                        attempt,
                        attempts,
                        target = %resource,
                        url = %url,
                        transient,
                        error = %error,
                        "転送エラーが発生しました"
                    );
                    if !transient {
                        return Err(RepositoryError::Network { source: error });
                    }
                    retryable_failure = Some(RepositoryError::Network { source: error });
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                // 接続段階のエラーと違い、本文の途中切断は内容不正として扱う。
                return response.bytes().await.map_err(|source| {
                    RepositoryError::InvalidResponse {
                        resource: resource.to_string(),
                        message: format!("本文の読み取りに失敗しました: {source}"),
                    }
                });
            }

            if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
                debug!(
                    status = %status,
                    target = %resource,
                    url = %url,
                    "座標がこのリポジトリに存在しません"
                );
                return Err(RepositoryError::NotFound {
                    resource: resource.to_string(),
                    status,
                });
            }

            if status.is_client_error() {
                warn!(
                    status = %status,
                    target = %resource,
                    url = %url,
                    "クライアントエラーを受信したため打ち切ります"
                );
                return Err(RepositoryError::HttpStatus {
                    resource: resource.to_string(),
                    status,
                });
            }

            // 5xxと想定外のステータスは一時障害とみなす。
            warn!(
                attempt,
                attempts,
                status = %status,
                target = %resource,
                url = %url,
                "サーバ側の失敗。バックオフ後にもう一度試します"
            );
            retryable_failure = Some(RepositoryError::HttpStatus {
                resource: resource.to_string(),
                status,
            });
        }

        Err(
            retryable_failure.unwrap_or_else(|| RepositoryError::HttpStatus {
                resource: resource.to_string(),
                status: StatusCode::INTERNAL_SERVER_ERROR,
            }),
        )
    }
}

impl fmt::Display for RemoteRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.base_url)
    }
}

pub(crate) fn build_client() -> Result<Client, RepositoryError> {
    Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        // Avoid HTTP/2 oddities against Maven Central; prefer HTTP/1.1.
        .http1_only()
        .user_agent(format!("jvdeps/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|source| RepositoryError::ClientBuild { source })
}

fn ensure_trailing_slash(url: &mut Url) {
    if !url.path().ends_with('/') {
        let mut path = url.path().to_string();
        path.push('/');
        url.set_path(&path);
    }
}

/// チェックサムファイルの本文からハッシュ値を取り出す。
/// `coreutils` 形式（`<hash>  <file>`）も裸のハッシュもあるため、
/// 最初の空白区切りトークンを小文字化して採用する。
fn first_checksum_token(body: &str) -> Option<String> {
    body.split_whitespace()
        .next()
        .map(str::to_ascii_lowercase)
}
