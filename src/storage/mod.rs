//! Object storage backends
//!
//! Every backend exposes the same five capabilities through
//! [`StorageBackend`]. The lifecycle wire format is tied to the backend via the
//! associated `Document` type, so choosing a backend once at start-up also
//! chooses the lifecycle normalizer.
//!
//! - `gcs`: Google Cloud Storage JSON API over `reqwest`
//! - `s3`: Amazon S3 (and compatibles) over `aws-sdk-s3`

pub mod gcs;
pub mod s3;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWriteExt};

use crate::archive::cleanup::remove_if_exists;
use crate::error::{ArchiveError, ArchiveResult};
use crate::lifecycle::LifecycleDocument;

pub use gcs::GcsBackend;
pub use s3::S3Backend;

/// Which backend family to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Gcs,
    S3,
}

impl BackendKind {
    /// Pick a backend from the credentials present in the environment
    ///
    /// A GCS access token selects GCS; anything else falls back to S3, whose
    /// SDK resolves its own credential chain.
    pub fn detect() -> Self {
        if std::env::var_os(gcs::ACCESS_TOKEN_ENV).is_some() {
            Self::Gcs
        } else {
            Self::S3
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Gcs => write!(f, "gcs"),
            BackendKind::S3 => write!(f, "s3"),
        }
    }
}

/// One entry of a bucket listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub last_modified: DateTime<Utc>,
}

/// A downloaded archive on local disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedArchive {
    /// Path of the archive file
    pub file: PathBuf,
    /// Directory the archive was written into
    pub dir: PathBuf,
}

/// Capabilities the backup and restore pipelines need from a bucket
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Lifecycle wire format spoken by this backend
    type Document: LifecycleDocument;

    /// Fetch the bucket's current lifecycle document
    async fn get_lifecycle(&self, bucket: &str) -> ArchiveResult<Self::Document>;

    /// Replace the bucket's lifecycle document, returning what the bucket now holds
    async fn set_lifecycle(
        &self,
        bucket: &str,
        document: &Self::Document,
    ) -> ArchiveResult<Self::Document>;

    /// List every object whose key starts with `prefix`
    async fn list_by_prefix(&self, bucket: &str, prefix: &str) -> ArchiveResult<Vec<ObjectSummary>>;

    /// Download `key` to `destination`; `None` when the object does not exist
    async fn download(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
    ) -> ArchiveResult<Option<DownloadedArchive>>;

    /// Upload the local file `source` as `key`
    async fn upload(&self, bucket: &str, source: &Path, key: &str) -> ArchiveResult<()>;
}

/// Local file name for a downloaded object key
///
/// Path separators in the key are flattened so the download always lands
/// directly inside the target directory.
pub fn local_name_for_key(key: &str) -> String {
    key.replace(['/', '\\'], "_")
}

/// Stream an object body into `destination`
///
/// An empty body counts as no archive: the file is removed again and `None`
/// is returned.
pub(crate) async fn save_download<R>(
    mut body: R,
    destination: &Path,
) -> ArchiveResult<Option<DownloadedArchive>>
where
    R: AsyncRead + Unpin,
{
    let mut file = tokio::fs::File::create(destination).await.map_err(|e| {
        ArchiveError::Io(format!("Failed to create {}: {}", destination.display(), e))
    })?;
    let written = tokio::io::copy(&mut body, &mut file).await.map_err(|e| {
        ArchiveError::Storage(format!(
            "failed to stream object to {}: {}",
            destination.display(),
            e
        ))
    })?;
    file.flush().await?;
    drop(file);

    if written == 0 {
        remove_if_exists(destination)?;
        return Ok(None);
    }

    Ok(Some(DownloadedArchive {
        file: destination.to_path_buf(),
        dir: destination
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    }))
}
