//! Path management for cloud-archive
//!
//! All local paths derive from two settings:
//!
//! - `base_path`: working directory; packed and downloaded archives are
//!   staged here, outside the data directory, so an archive never contains
//!   itself
//! - `data_path`: the directory that is backed up and restored into,
//!   relative to `base_path` unless absolute

use std::path::{Path, PathBuf};

use crate::archive::MANIFEST_FILE_NAME;
use crate::error::ArchiveError;
use crate::storage::local_name_for_key;

use super::Settings;

/// Manages all local paths used by a backup or restore
#[derive(Debug, Clone)]
pub struct ArchivePaths {
    base_dir: PathBuf,
    data_dir: PathBuf,
}

impl ArchivePaths {
    pub fn new(base_dir: impl Into<PathBuf>, data_path: impl AsRef<Path>) -> Self {
        let base_dir = base_dir.into();
        let data_dir = base_dir.join(data_path);
        Self { base_dir, data_dir }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.base_path, &settings.data_path)
    }

    /// Get the base directory
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Get the directory that is archived and restored into
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get the path of the manifest inside the data directory
    pub fn manifest_file(&self) -> PathBuf {
        self.data_dir.join(MANIFEST_FILE_NAME)
    }

    /// Get the directory local archives are written to
    pub fn staging_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Get the local path a downloaded object is written to
    pub fn download_path(&self, key: &str) -> PathBuf {
        self.staging_dir().join(local_name_for_key(key))
    }

    /// Ensure the base and data directories exist
    pub fn ensure_directories(&self) -> Result<(), ArchiveError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| ArchiveError::Io(format!("Failed to create base directory: {}", e)))?;

        std::fs::create_dir_all(&self.data_dir)
            .map_err(|e| ArchiveError::Io(format!("Failed to create data directory: {}", e)))?;

        Ok(())
    }
}
