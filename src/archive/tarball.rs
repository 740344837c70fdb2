//! gzip-compressed tar archives

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Archive, Builder};

use crate::error::{ArchiveError, ArchiveResult};
use crate::storage::DownloadedArchive;

use super::manifest::relative_name;
use super::Packager;

/// Packs files into `.tgz` archives and extracts them again
#[derive(Debug, Clone, Copy)]
pub struct TarGzPackager {
    level: Compression,
}

impl Default for TarGzPackager {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl TarGzPackager {
    pub fn with_level(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }

    fn pack_blocking(
        &self,
        base_dir: &Path,
        files: &[PathBuf],
        archive_path: &Path,
    ) -> ArchiveResult<()> {
        let file = File::create(archive_path).map_err(|e| {
            ArchiveError::Io(format!("Failed to create {}: {}", archive_path.display(), e))
        })?;

        let encoder = GzEncoder::new(BufWriter::new(file), self.level);
        let mut builder = Builder::new(encoder);
        builder.follow_symlinks(true);

        for path in files {
            let name = relative_name(base_dir, path);
            builder.append_path_with_name(path, &name).map_err(|e| {
                ArchiveError::Io(format!("Failed to add {} to archive: {}", path.display(), e))
            })?;
        }

        let encoder = builder
            .into_inner()
            .map_err(|e| ArchiveError::Io(format!("Failed to finish archive: {}", e)))?;
        let mut writer = encoder
            .finish()
            .map_err(|e| ArchiveError::Io(format!("Failed to compress archive: {}", e)))?;
        writer.flush()?;

        Ok(())
    }

    fn unpack_blocking(target_dir: &Path, archive_file: &Path) -> ArchiveResult<Vec<PathBuf>> {
        let file = File::open(archive_file).map_err(|e| {
            ArchiveError::Io(format!("Failed to open {}: {}", archive_file.display(), e))
        })?;

        fs::create_dir_all(target_dir)?;

        let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));
        archive.set_overwrite(true);

        let mut extracted = Vec::new();
        let entries = archive
            .entries()
            .map_err(|e| ArchiveError::Io(format!("Unpacking tarball failed with error: {}", e)))?;
        for entry in entries {
            let mut entry = entry
                .map_err(|e| ArchiveError::Io(format!("Unpacking tarball failed with error: {}", e)))?;
            let name = entry
                .path()
                .map_err(|e| ArchiveError::Io(format!("Invalid entry path: {}", e)))?
                .into_owned();

            let unpacked = entry
                .unpack_in(target_dir)
                .map_err(|e| ArchiveError::Io(format!("Unpacking tarball failed with error: {}", e)))?;
            if unpacked {
                extracted.push(target_dir.join(name));
            }
        }

        Ok(extracted)
    }
}

#[async_trait]
impl Packager for TarGzPackager {
    async fn pack(
        &self,
        base_dir: &Path,
        files: &[PathBuf],
        archive_name: &str,
        destination_dir: &Path,
    ) -> ArchiveResult<PathBuf> {
        let packager = *self;
        let base_dir = base_dir.to_path_buf();
        let files = files.to_vec();
        let archive_path = destination_dir.join(archive_name);

        let target = archive_path.clone();
        tokio::task::spawn_blocking(move || packager.pack_blocking(&base_dir, &files, &target))
            .await
            .map_err(|e| ArchiveError::Io(format!("Packing task failed: {}", e)))??;

        Ok(archive_path)
    }

    async fn unpack(&self, target_dir: &Path, archive: &DownloadedArchive) -> ArchiveResult<Vec<PathBuf>> {
        let target_dir = target_dir.to_path_buf();
        let archive_file = archive.file.clone();

        tokio::task::spawn_blocking(move || Self::unpack_blocking(&target_dir, &archive_file))
            .await
            .map_err(|e| ArchiveError::Io(format!("Unpacking task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_pack_and_unpack() {
        let source = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();

        fs::write(source.path().join("one.txt"), "first").unwrap();
        fs::create_dir(source.path().join("nested")).unwrap();
        fs::write(source.path().join("nested").join("two.txt"), "second").unwrap();
        let files = vec![
            source.path().join("one.txt"),
            source.path().join("nested").join("two.txt"),
        ];

        let packager = TarGzPackager::default();
        let archive_path = packager
            .pack(source.path(), &files, "archive.tgz", staging.path())
            .await
            .unwrap();
        assert_eq!(archive_path, staging.path().join("archive.tgz"));
        assert!(archive_path.exists());

        let downloaded = DownloadedArchive {
            file: archive_path,
            dir: staging.path().to_path_buf(),
        };
        let extracted = packager.unpack(target.path(), &downloaded).await.unwrap();

        assert_eq!(extracted.len(), 2);
        assert_eq!(fs::read_to_string(target.path().join("one.txt")).unwrap(), "first");
        assert_eq!(
            fs::read_to_string(target.path().join("nested").join("two.txt")).unwrap(),
            "second"
        );
    }

    #[tokio::test]
    async fn test_pack_missing_file_fails() {
        let source = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();

        let result = TarGzPackager::default()
            .pack(
                source.path(),
                &[source.path().join("absent.txt")],
                "archive.tgz",
                staging.path(),
            )
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_unpack_rejects_garbage() {
        let staging = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let bogus = staging.path().join("bogus.tgz");
        fs::write(&bogus, "this is not a tarball").unwrap();

        let downloaded = DownloadedArchive {
            file: bogus,
            dir: staging.path().to_path_buf(),
        };
        let result = TarGzPackager::with_level(1).unpack(target.path(), &downloaded).await;

        assert!(result.is_err());
    }
}
