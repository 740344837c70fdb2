//! Backup manager for cloud-archive
//!
//! Runs one backup: enforce the bucket lifecycle, select the files, write the
//! manifest, pack everything into a `.tgz` and upload it. Stages run strictly
//! in order and the first failure ends the run.

use std::path::PathBuf;

use crate::archive::{
    ArtifactGuard, FileSelector, GlobSelector, Manifest, Packager, TarGzPackager,
};
use crate::config::{ArchivePaths, Settings};
use crate::error::{ArchiveError, ArchiveResult};
use crate::events::{ArchiveEvent, EventSink, TracingSink};
use crate::lifecycle::{LifecycleReconciler, Reconciliation};
use crate::naming::{self, Clock, SystemClock};
use crate::storage::{local_name_for_key, StorageBackend};

use super::ArchiveMetadata;

/// Result of a successful backup
#[derive(Debug, Clone, PartialEq)]
pub struct BackupOutcome {
    /// The uploaded archive
    pub archive: ArchiveMetadata,
    /// Files that went into the archive, manifest excluded
    pub files: Vec<PathBuf>,
    /// What lifecycle enforcement did to the bucket
    pub lifecycle: Reconciliation,
}

/// Creates archives of the data directory and uploads them
pub struct BackupManager<B: StorageBackend> {
    settings: Settings,
    paths: ArchivePaths,
    backend: B,
    selector: Box<dyn FileSelector>,
    packager: Box<dyn Packager>,
    clock: Box<dyn Clock>,
    events: Box<dyn EventSink>,
}

impl<B: StorageBackend> BackupManager<B> {
    /// Create a BackupManager with the default selector, packager, clock and sink
    pub fn new(settings: Settings, backend: B) -> Self {
        let paths = ArchivePaths::from_settings(&settings);
        Self {
            settings,
            paths,
            backend,
            selector: Box::new(GlobSelector),
            packager: Box::new(TarGzPackager::default()),
            clock: Box::new(SystemClock),
            events: Box::new(TracingSink),
        }
    }

    pub fn with_selector(mut self, selector: impl FileSelector + 'static) -> Self {
        self.selector = Box::new(selector);
        self
    }

    pub fn with_packager(mut self, packager: impl Packager + 'static) -> Self {
        self.packager = Box::new(packager);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_events(mut self, events: impl EventSink + 'static) -> Self {
        self.events = Box::new(events);
        self
    }

    pub fn paths(&self) -> &ArchivePaths {
        &self.paths
    }

    /// Run the backup
    pub async fn backup(&self) -> ArchiveResult<BackupOutcome> {
        self.paths.ensure_directories()?;

        let bucket = self.settings.storage.bucket.as_str();
        let lifecycle = LifecycleReconciler::new(&self.backend, bucket, self.settings.limits.policy())
            .enforce()
            .await?;
        self.events
            .emit(ArchiveEvent::from_reconciliation(bucket, &lifecycle));

        let data_dir = self.paths.data_dir();
        let files = self
            .selector
            .select(data_dir, &self.settings.patterns)
            .await
            .map_err(|e| ArchiveError::Selection {
                path: data_dir.display().to_string(),
                patterns: self.settings.patterns_display(),
                cause: e.to_string(),
            })?;
        self.events.emit(ArchiveEvent::FilesSelected {
            path: data_dir.to_path_buf(),
            count: files.len(),
        });

        let created_at = self.clock.now_utc();
        let manifest = Manifest::new(data_dir, &files, created_at);
        let manifest_path = self.paths.manifest_file();
        if let Err(e) = manifest.write(&manifest_path) {
            // packing is left to fail on the missing manifest
            self.events.emit(ArchiveEvent::ManifestWriteFailed {
                path: manifest_path.clone(),
                reason: e.to_string(),
            });
        }

        let remote_key = naming::resolve(&self.settings.file_name, created_at);
        let local_name = local_name_for_key(&remote_key);
        let mut contents = files.clone();
        contents.push(manifest_path);

        let mut staged = ArtifactGuard::new(
            self.paths.staging_dir().join(&local_name),
            self.events.as_ref(),
        );
        let archive_path = self
            .packager
            .pack(data_dir, &contents, &local_name, self.paths.staging_dir())
            .await
            .map_err(|e| ArchiveError::Packaging(e.to_string()))?;
        staged.track(&archive_path);
        self.events.emit(ArchiveEvent::ArchivePacked {
            path: archive_path.clone(),
            files: contents.len(),
        });

        self.backend
            .upload(bucket, &archive_path, &remote_key)
            .await
            .map_err(|e| ArchiveError::Upload(e.to_string()))?;
        self.events.emit(ArchiveEvent::ArchiveUploaded {
            bucket: bucket.to_string(),
            key: remote_key.clone(),
        });
        drop(staged);

        Ok(BackupOutcome {
            archive: ArchiveMetadata {
                local_path: archive_path,
                remote_key,
                files: manifest.files,
                created_at,
            },
            files,
            lifecycle,
        })
    }
}
