//! Pipeline events and their observers
//!
//! The backup and restore pipelines never log directly. They report what
//! happened as [`ArchiveEvent`] values to an [`EventSink`]; the binary installs
//! [`TracingSink`], which renders each event through `tracing`.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::lifecycle::{Reconciliation, RetentionPolicy};

/// Something worth reporting that happened during a backup or restore
#[derive(Debug, Clone, PartialEq)]
pub enum ArchiveEvent {
    /// The bucket lifecycle already matched the configured limits
    LifecycleUnchanged { bucket: String, policy: RetentionPolicy },
    /// The bucket lifecycle was rewritten
    LifecycleUpdated { bucket: String, policy: RetentionPolicy },
    /// Files were selected for the archive
    FilesSelected { path: PathBuf, count: usize },
    /// The manifest could not be written; packaging is expected to fail next
    ManifestWriteFailed { path: PathBuf, reason: String },
    /// The archive was created locally
    ArchivePacked { path: PathBuf, files: usize },
    /// The archive reached the bucket
    ArchiveUploaded { bucket: String, key: String },
    /// A local archive could not be removed
    CleanupFailed { path: PathBuf, reason: String },
    /// A restore picked the archive to download
    ArchiveResolved { key: String, latest: bool },
    /// The archive was downloaded
    ArchiveDownloaded { bucket: String, key: String },
    /// The archive was unpacked and checked against its manifest
    ArchiveRestored { path: PathBuf, files: usize },
}

impl ArchiveEvent {
    /// Event describing a finished lifecycle reconciliation
    pub fn from_reconciliation(bucket: &str, reconciliation: &Reconciliation) -> Self {
        match reconciliation {
            Reconciliation::Unchanged(policy) => ArchiveEvent::LifecycleUnchanged {
                bucket: bucket.to_string(),
                policy: *policy,
            },
            Reconciliation::Updated { applied, .. } => ArchiveEvent::LifecycleUpdated {
                bucket: bucket.to_string(),
                policy: *applied,
            },
        }
    }
}

/// Receives pipeline events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ArchiveEvent);
}

/// Renders events as `tracing` records
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: ArchiveEvent) {
        match event {
            ArchiveEvent::LifecycleUnchanged { bucket, policy } => {
                debug!(%bucket, %policy, "Lifecycle settings already up to date")
            }
            ArchiveEvent::LifecycleUpdated { bucket, policy } => {
                info!(%bucket, %policy, "Lifecycle settings updated")
            }
            ArchiveEvent::FilesSelected { path, count } => {
                info!(path = %path.display(), count, "Selected files for backup")
            }
            ArchiveEvent::ManifestWriteFailed { path, reason } => warn!(
                path = %path.display(),
                "Failed to write metadata (zip creation and upload will fail): {}",
                reason
            ),
            ArchiveEvent::ArchivePacked { path, files } => {
                info!(path = %path.display(), files, "Created tarball")
            }
            ArchiveEvent::ArchiveUploaded { bucket, key } => {
                info!(%bucket, %key, "Uploaded tarball; backup completed successfully")
            }
            ArchiveEvent::CleanupFailed { path, reason } => {
                warn!(path = %path.display(), "Could not remove local archive: {}", reason)
            }
            ArchiveEvent::ArchiveResolved { key, latest } => {
                info!(%key, latest, "Selected archive to restore")
            }
            ArchiveEvent::ArchiveDownloaded { bucket, key } => {
                info!(%bucket, %key, "Downloaded tarball")
            }
            ArchiveEvent::ArchiveRestored { path, files } => {
                info!(path = %path.display(), files, "Restore complete")
            }
        }
    }
}
