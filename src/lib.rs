//! cloud-archive - directory backups to GCS or S3 buckets
//!
//! This library provides the core of the `cloud-archive` tool: it archives a
//! local directory into a bucket, restores the newest (or a named) archive,
//! and keeps the bucket's lifecycle rules in line with configured retention
//! and cold-storage limits.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Settings and local path management
//! - `error`: Custom error types
//! - `naming`: Archive name templates and the clock they resolve against
//! - `lifecycle`: Lifecycle documents for both bucket families and the reconciler
//! - `storage`: The storage backend trait and its GCS and S3 implementations
//! - `archive`: File selection, manifest, tarball packing and cleanup
//! - `backup`: Backup and restore orchestration
//! - `events`: Pipeline events and their `tracing` observer
//! - `cli`: Command-line handlers
//!
//! # Example
//!
//! ```rust,ignore
//! use cloud_archive::backup::BackupManager;
//! use cloud_archive::config::Settings;
//! use cloud_archive::storage::S3Backend;
//!
//! let mut settings = Settings::default();
//! settings.storage.bucket = "nightly-backups".into();
//! settings.limits.delete_after = 30;
//!
//! let outcome = BackupManager::new(settings, S3Backend::from_env().await)
//!     .backup()
//!     .await?;
//! ```

pub mod archive;
pub mod backup;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod naming;
pub mod storage;

#[cfg(test)]
pub mod testing;

pub use error::{ArchiveError, ArchiveResult};
