//! Local archive handling
//!
//! Everything that touches the local side of a backup lives here:
//!
//! - `selector`: picks the files to back up using glob patterns
//! - `manifest`: the `info.json` file packaged alongside them
//! - `tarball`: gzip-compressed tar packing and unpacking
//! - `cleanup`: removes local archives on every exit path

pub mod cleanup;
pub mod manifest;
pub mod selector;
pub mod tarball;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::ArchiveResult;
use crate::storage::DownloadedArchive;

pub use cleanup::ArtifactGuard;
pub use manifest::{Manifest, MANIFEST_FILE_NAME};
pub use selector::GlobSelector;
pub use tarball::TarGzPackager;

/// Enumerates the files a backup should include
#[async_trait]
pub trait FileSelector: Send + Sync {
    /// Absolute paths of regular files under `base_dir` matching any pattern
    async fn select(&self, base_dir: &Path, patterns: &[String]) -> ArchiveResult<Vec<PathBuf>>;
}

/// Creates and extracts archive files
#[async_trait]
pub trait Packager: Send + Sync {
    /// Pack `files` (all under `base_dir`) into `destination_dir/archive_name`
    ///
    /// Entries are stored relative to `base_dir`. Returns the archive path.
    async fn pack(
        &self,
        base_dir: &Path,
        files: &[PathBuf],
        archive_name: &str,
        destination_dir: &Path,
    ) -> ArchiveResult<PathBuf>;

    /// Extract `archive` into `target_dir`, returning the extracted paths
    async fn unpack(&self, target_dir: &Path, archive: &DownloadedArchive) -> ArchiveResult<Vec<PathBuf>>;
}
