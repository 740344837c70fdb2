//! Backup and restore orchestration
//!
//! # Architecture
//!
//! The pipelines consist of two main components:
//!
//! - `BackupManager`: enforces bucket lifecycle, packs the data directory and
//!   uploads the archive
//! - `RestoreManager`: finds an archive, downloads it, unpacks it into the
//!   data directory and checks it against its manifest
//!
//! Both are generic over the [`StorageBackend`](crate::storage::StorageBackend)
//! and take their other collaborators (file selector, packager, clock, event
//! sink) as trait objects so they can be swapped out in tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use cloud_archive::backup::{BackupManager, RestoreManager};
//! use cloud_archive::config::Settings;
//! use cloud_archive::storage::GcsBackend;
//!
//! let backend = GcsBackend::from_env()?;
//! let outcome = BackupManager::new(settings.clone(), backend.clone()).backup().await?;
//! println!("uploaded {}", outcome.archive.remote_key);
//!
//! // Later, restore the newest archive
//! let restored = RestoreManager::new(settings, backend).restore().await?;
//! println!("restored {} files", restored.files.len());
//! ```

mod manager;
mod restore;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use manager::{BackupManager, BackupOutcome};
pub use restore::{RestoreManager, RestoreOutcome};

/// An archive produced by a backup or fetched by a restore
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveMetadata {
    /// Where the archive lived on local disk (removed once the run ends)
    pub local_path: PathBuf,
    /// Object key in the bucket
    pub remote_key: String,
    /// Archived files, relative to the data directory
    pub files: Vec<String>,
    /// When the archive was created
    pub created_at: DateTime<Utc>,
}
