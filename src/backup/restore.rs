//! Backup restoration for cloud-archive
//!
//! Resolves which archive to restore (configured name or the newest one under
//! the template's prefix), downloads it, unpacks it into the data directory
//! and checks the result against the packaged manifest. Every failure comes
//! back wrapped as `Restore attempt failed with: ...`.

use std::path::PathBuf;

use crate::archive::cleanup::remove_if_exists;
use crate::archive::{ArtifactGuard, Manifest, Packager, TarGzPackager};
use crate::config::{ArchivePaths, Settings};
use crate::error::{ArchiveError, ArchiveResult};
use crate::events::{ArchiveEvent, EventSink, TracingSink};
use crate::lifecycle::LifecycleReconciler;
use crate::naming;
use crate::storage::StorageBackend;

use super::ArchiveMetadata;

const EMPTY_DOWNLOAD: &str = "tarball is empty or write failed.";

/// Result of a successful restore
#[derive(Debug, Clone, PartialEq)]
pub struct RestoreOutcome {
    /// Directory the archive was restored into
    pub path: PathBuf,
    /// The restored archive
    pub archive: ArchiveMetadata,
    /// Restored files, relative to `path`
    pub files: Vec<String>,
}

impl RestoreOutcome {
    /// Get a one-line summary of the restore
    pub fn summary(&self) -> String {
        format!(
            "Restored {} file(s) from '{}' (created {}) into {}",
            self.files.len(),
            self.archive.remote_key,
            self.archive.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.path.display()
        )
    }
}

/// Restores archives from the bucket into the data directory
pub struct RestoreManager<B: StorageBackend> {
    settings: Settings,
    paths: ArchivePaths,
    backend: B,
    packager: Box<dyn Packager>,
    events: Box<dyn EventSink>,
}

impl<B: StorageBackend> RestoreManager<B> {
    /// Create a RestoreManager with the default packager and sink
    pub fn new(settings: Settings, backend: B) -> Self {
        let paths = ArchivePaths::from_settings(&settings);
        Self {
            settings,
            paths,
            backend,
            packager: Box::new(TarGzPackager::default()),
            events: Box::new(TracingSink),
        }
    }

    pub fn with_packager(mut self, packager: impl Packager + 'static) -> Self {
        self.packager = Box::new(packager);
        self
    }

    pub fn with_events(mut self, events: impl EventSink + 'static) -> Self {
        self.events = Box::new(events);
        self
    }

    pub fn paths(&self) -> &ArchivePaths {
        &self.paths
    }

    /// Run the restore
    pub async fn restore(&self) -> ArchiveResult<RestoreOutcome> {
        self.run().await.map_err(ArchiveError::restore)
    }

    /// The archive key to restore: the configured name, else the newest match
    pub async fn resolve_key(&self) -> ArchiveResult<String> {
        if let Some(name) = self.configured_archive() {
            self.events.emit(ArchiveEvent::ArchiveResolved {
                key: name.to_string(),
                latest: false,
            });
            return Ok(name.to_string());
        }

        let bucket = self.settings.storage.bucket.as_str();
        let prefix = naming::listing_prefix(&self.settings.file_name);
        let key = LifecycleReconciler::new(&self.backend, bucket, self.settings.limits.policy())
            .latest(prefix)
            .await?
            .ok_or_else(|| ArchiveError::Resolution {
                bucket: bucket.to_string(),
                prefix: prefix.to_string(),
            })?;

        self.events.emit(ArchiveEvent::ArchiveResolved {
            key: key.clone(),
            latest: true,
        });
        Ok(key)
    }

    fn configured_archive(&self) -> Option<&str> {
        self.settings
            .storage
            .archive
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    async fn run(&self) -> ArchiveResult<RestoreOutcome> {
        let key = self.resolve_key().await?;
        let bucket = self.settings.storage.bucket.as_str();

        self.paths.ensure_directories()?;
        let destination = self.paths.download_path(&key);
        let _downloaded_file = ArtifactGuard::new(&destination, self.events.as_ref());

        let downloaded = self
            .backend
            .download(bucket, &key, &destination)
            .await
            .map_err(|e| ArchiveError::Download(e.to_string()))?
            .ok_or_else(|| ArchiveError::Corrupt(EMPTY_DOWNLOAD.to_string()))?;
        self.events.emit(ArchiveEvent::ArchiveDownloaded {
            bucket: bucket.to_string(),
            key: key.clone(),
        });

        // only a manifest shipped in this archive may validate it
        let manifest_path = self.paths.manifest_file();
        remove_if_exists(&manifest_path)?;

        let data_dir = self.paths.data_dir();
        self.packager
            .unpack(data_dir, &downloaded)
            .await
            .map_err(|e| ArchiveError::Corrupt(e.to_string()))?;

        let manifest = Manifest::read(&manifest_path)
            .map_err(|e| ArchiveError::Corrupt(format!("manifest unreadable: {}", e)))?;
        let missing = manifest.missing_files(data_dir);
        if !missing.is_empty() {
            return Err(ArchiveError::Corrupt(format!(
                "files listed in the manifest are missing: {}",
                missing.join(", ")
            )));
        }

        self.events.emit(ArchiveEvent::ArchiveRestored {
            path: data_dir.to_path_buf(),
            files: manifest.files.len(),
        });

        Ok(RestoreOutcome {
            path: data_dir.to_path_buf(),
            archive: ArchiveMetadata {
                local_path: downloaded.file,
                remote_key: key,
                files: manifest.files.clone(),
                created_at: manifest.created_on,
            },
            files: manifest.files,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::BackupManager;
    use crate::lifecycle::GcsBucketLifecycle;
    use crate::naming::FixedClock;
    use crate::testing::{summary, DownloadBehavior, MockBackend, MockPackager, RecordingSink};
    use chrono::{TimeZone, Utc};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    type Backend = MockBackend<GcsBucketLifecycle>;

    fn settings(base: &Path) -> Settings {
        let mut settings = Settings::default();
        settings.base_path = base.to_path_buf();
        settings.storage.bucket = "backups".into();
        settings
    }

    fn create_test_env(
        settings_fn: impl FnOnce(&mut Settings),
    ) -> (RestoreManager<Backend>, Backend, MockPackager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut settings = settings(temp_dir.path());
        settings_fn(&mut settings);

        let backend = MockBackend::new(GcsBucketLifecycle::default());
        let packager = MockPackager::default();
        let manager = RestoreManager::new(settings, backend.clone())
            .with_packager(packager.clone())
            .with_events(RecordingSink::default());
        (manager, backend, packager, temp_dir)
    }

    fn manifest_for(manager: &RestoreManager<Backend>, files: &[&str]) -> Manifest {
        let data_dir = manager.paths().data_dir();
        let paths: Vec<PathBuf> = files.iter().map(|f| data_dir.join(f)).collect();
        Manifest::new(
            data_dir,
            &paths,
            Utc.with_ymd_and_hms(2018, 10, 10, 12, 10, 10).unwrap(),
        )
    }

    /// Lay out what a successful unpack would leave behind
    fn seed_data_dir(manager: &RestoreManager<Backend>, packager: &MockPackager, files: &[&str]) {
        let data_dir = manager.paths().data_dir();
        fs::create_dir_all(data_dir).unwrap();
        for file in files {
            fs::write(data_dir.join(file), "restored").unwrap();
        }
        let manifest = serde_json::to_vec(&manifest_for(manager, files)).unwrap();
        packager.extracting(&manager.paths().manifest_file(), &manifest);
    }

    #[tokio::test]
    async fn test_explicit_name_skips_listing() {
        let (manager, backend, packager, _temp) =
            create_test_env(|s| s.storage.archive = Some("archive_2018-10-09.tgz".into()));
        backend.set_download(DownloadBehavior::Payload(b"tgz".to_vec()));
        seed_data_dir(&manager, &packager, &["one.txt"]);

        let outcome = manager.restore().await.unwrap();

        assert!(backend.list_calls().is_empty());
        assert_eq!(backend.download_calls(), vec!["archive_2018-10-09.tgz"]);
        assert_eq!(outcome.archive.remote_key, "archive_2018-10-09.tgz");
        assert_eq!(outcome.files, vec!["one.txt"]);
    }

    #[tokio::test]
    async fn test_restores_latest_archive() {
        let (manager, backend, packager, _temp) = create_test_env(|_| {});
        backend.set_objects(vec![
            summary("archive_2018-10-08.tgz", "2018-10-08T00:00:00Z"),
            summary("archive_2018-10-10.tgz", "2018-10-10T00:00:00Z"),
            summary("archive_2018-10-09.tgz", "2018-10-09T00:00:00Z"),
        ]);
        backend.set_download(DownloadBehavior::Payload(b"tgz".to_vec()));
        seed_data_dir(&manager, &packager, &["one.txt", "two.txt"]);

        let outcome = manager.restore().await.unwrap();

        assert_eq!(backend.list_calls(), vec!["archive_"]);
        assert_eq!(backend.download_calls(), vec!["archive_2018-10-10.tgz"]);
        assert_eq!(packager.unpack_calls().len(), 1);
        assert_eq!(outcome.files.len(), 2);
        assert!(!outcome.archive.local_path.exists());
        assert!(outcome.summary().contains("archive_2018-10-10.tgz"));
    }

    #[tokio::test]
    async fn test_empty_download_never_unpacks() {
        let (manager, backend, packager, _temp) =
            create_test_env(|s| s.storage.archive = Some("archive.tgz".into()));
        backend.set_download(DownloadBehavior::Missing);

        let err = manager.restore().await.unwrap_err();

        assert!(err.is_corrupt());
        assert!(err.to_string().contains("tarball was missing or corrupt"));
        assert_eq!(
            err.to_string(),
            "Restore attempt failed with: The tarball was missing or corrupt: \
             tarball is empty or write failed."
        );
        assert!(packager.unpack_calls().is_empty());
    }

    #[tokio::test]
    async fn test_download_failure_is_wrapped() {
        let (manager, backend, packager, _temp) =
            create_test_env(|s| s.storage.archive = Some("archive.tgz".into()));
        backend.set_download(DownloadBehavior::Fail("connection reset".into()));

        let err = manager.restore().await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "Restore attempt failed with: Failed to download file - Storage error: connection reset"
        );
        assert!(packager.unpack_calls().is_empty());
    }

    #[tokio::test]
    async fn test_nothing_to_restore() {
        let (manager, _backend, _packager, _temp) = create_test_env(|_| {});

        let err = manager.restore().await.unwrap_err();

        assert!(matches!(
            err,
            ArchiveError::Restore(ref inner) if matches!(**inner, ArchiveError::Resolution { .. })
        ));
    }

    #[tokio::test]
    async fn test_listing_failure_is_wrapped() {
        let (manager, backend, _packager, _temp) = create_test_env(|_| {});
        backend.fail_list("throttled");

        let err = manager.restore().await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "Restore attempt failed with: Could not determine latest file from bucket \
             'backups': Storage error: throttled"
        );
    }

    #[tokio::test]
    async fn test_unpack_failure_removes_download() {
        let (manager, backend, packager, _temp) =
            create_test_env(|s| s.storage.archive = Some("archive.tgz".into()));
        backend.set_download(DownloadBehavior::Payload(b"garbage".to_vec()));
        packager.fail_unpack("invalid gzip header");

        let err = manager.restore().await.unwrap_err();

        assert!(err.is_corrupt());
        assert!(err.to_string().ends_with("invalid gzip header"));
        assert!(!manager.paths().download_path("archive.tgz").exists());
    }

    #[tokio::test]
    async fn test_missing_manifest_file_is_corrupt() {
        let (manager, backend, packager, _temp) =
            create_test_env(|s| s.storage.archive = Some("archive.tgz".into()));
        backend.set_download(DownloadBehavior::Payload(b"tgz".to_vec()));
        seed_data_dir(&manager, &packager, &["one.txt", "two.txt"]);
        fs::remove_file(manager.paths().data_dir().join("two.txt")).unwrap();

        let err = manager.restore().await.unwrap_err();

        assert!(err.is_corrupt());
        assert!(err.to_string().ends_with("two.txt"));
    }

    #[tokio::test]
    async fn test_archive_without_manifest_ignores_earlier_one() {
        let (manager, backend, _packager, _temp) =
            create_test_env(|s| s.storage.archive = Some("archive.tgz".into()));
        backend.set_download(DownloadBehavior::Payload(b"tgz".to_vec()));
        let data_dir = manager.paths().data_dir();
        fs::create_dir_all(data_dir).unwrap();
        fs::write(data_dir.join("one.txt"), "from an earlier backup").unwrap();
        manifest_for(&manager, &["one.txt"])
            .write(&manager.paths().manifest_file())
            .unwrap();

        let err = manager.restore().await.unwrap_err();

        assert!(err.is_corrupt());
        assert!(err.to_string().contains("manifest unreadable"));
        assert!(!manager.paths().manifest_file().exists());
    }

    #[tokio::test]
    async fn test_backup_then_restore_round_trip() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let clock = FixedClock(Utc.with_ymd_and_hms(2018, 10, 10, 12, 10, 10).unwrap());

        let source_settings = settings(source.path());
        let data_dir = ArchivePaths::from_settings(&source_settings)
            .data_dir()
            .to_path_buf();
        fs::create_dir_all(data_dir.join("nested")).unwrap();
        fs::write(data_dir.join("one.txt"), "first").unwrap();
        fs::write(data_dir.join("nested").join("two.txt"), "second").unwrap();

        // the mock keeps no uploaded bytes, so pack the same files again to serve them
        let packed = TempDir::new().unwrap();
        let backend = MockBackend::new(GcsBucketLifecycle::default());
        let outcome = BackupManager::new(source_settings, backend.clone())
            .with_clock(clock)
            .with_events(RecordingSink::default())
            .backup()
            .await
            .unwrap();
        let mut contents = outcome.files.clone();
        contents.push(data_dir.join(crate::archive::MANIFEST_FILE_NAME));
        let archive = TarGzPackager::default()
            .pack(&data_dir, &contents, "copy.tgz", packed.path())
            .await
            .unwrap();

        backend.set_objects(vec![summary(
            &outcome.archive.remote_key,
            "2018-10-10T12:10:11Z",
        )]);
        backend.set_download(DownloadBehavior::Payload(fs::read(archive).unwrap()));

        let restored = RestoreManager::new(settings(target.path()), backend)
            .with_events(RecordingSink::default())
            .restore()
            .await
            .unwrap();

        assert_eq!(restored.files, vec!["nested/two.txt", "one.txt"]);
        assert_eq!(
            fs::read_to_string(restored.path.join("nested").join("two.txt")).unwrap(),
            "second"
        );
        assert_eq!(restored.archive.created_at, clock.0);
    }
}
