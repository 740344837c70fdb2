//! Removal of local archive files
//!
//! Packed and downloaded archives are temporary. [`ArtifactGuard`] deletes the
//! file when it goes out of scope, so the archive is gone whether the upload
//! or unpack that follows succeeds, fails, or unwinds.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::events::{ArchiveEvent, EventSink};

/// Deletes local files when dropped
pub struct ArtifactGuard<'a> {
    paths: Vec<PathBuf>,
    events: &'a dyn EventSink,
}

impl<'a> ArtifactGuard<'a> {
    pub fn new(path: impl Into<PathBuf>, events: &'a dyn EventSink) -> Self {
        Self {
            paths: vec![path.into()],
            events,
        }
    }

    /// Also remove `path` on drop
    pub fn track(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl Drop for ArtifactGuard<'_> {
    fn drop(&mut self) {
        for path in &self.paths {
            if let Err(e) = remove_if_exists(path) {
                self.events.emit(ArchiveEvent::CleanupFailed {
                    path: path.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
}

/// Remove `path`; a file that is already gone is not an error
pub fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
