//! Glob-based file selection

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::error::{ArchiveError, ArchiveResult};

use super::manifest::{relative_name, MANIFEST_FILE_NAME};
use super::FileSelector;

/// Walks a directory and keeps regular files matching any of the patterns
///
/// Patterns are matched against the path relative to the base directory and
/// `*` does not cross `/`, so `*.txt` only matches top-level files while
/// `**/*.txt` matches at any depth. A manifest left over from an earlier run
/// is never selected.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobSelector;

impl GlobSelector {
    fn select_blocking(base_dir: &Path, patterns: &[String]) -> ArchiveResult<Vec<PathBuf>> {
        let globset = build_globset(patterns)?;

        if !base_dir.is_dir() {
            return Err(ArchiveError::Io(format!(
                "{} is not a directory",
                base_dir.display()
            )));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(base_dir).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(|e| ArchiveError::Io(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = relative_name(base_dir, entry.path());
            if relative == MANIFEST_FILE_NAME {
                continue;
            }
            if globset.is_match(&relative) {
                files.push(entry.into_path());
            }
        }

        Ok(files)
    }
}

#[async_trait]
impl FileSelector for GlobSelector {
    async fn select(&self, base_dir: &Path, patterns: &[String]) -> ArchiveResult<Vec<PathBuf>> {
        let base_dir = base_dir.to_path_buf();
        let patterns = patterns.to_vec();
        tokio::task::spawn_blocking(move || Self::select_blocking(&base_dir, &patterns))
            .await
            .map_err(|e| ArchiveError::Io(format!("File selection task failed: {}", e)))?
    }
}

fn build_globset(patterns: &[String]) -> ArchiveResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| ArchiveError::Config(format!("Invalid glob pattern '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| ArchiveError::Config(format!("Invalid glob patterns: {}", e)))
}
