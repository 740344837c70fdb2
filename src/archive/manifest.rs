//! Archive manifest (`info.json`)
//!
//! Written into the data directory right before packaging and shipped inside
//! the archive, so a restore can report and verify what it brought back.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ArchiveError, ArchiveResult};

pub const MANIFEST_FILE_NAME: &str = "info.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Archived files, relative to the data directory
    pub files: Vec<String>,
    /// When the archive was created (UTC)
    #[serde(with = "rfc3339_millis")]
    pub created_on: DateTime<Utc>,
}

impl Manifest {
    /// Build a manifest for `files` located under `base_dir`
    pub fn new(base_dir: &Path, files: &[PathBuf], created_on: DateTime<Utc>) -> Self {
        Self {
            files: files.iter().map(|file| relative_name(base_dir, file)).collect(),
            created_on,
        }
    }

    /// Write the manifest as JSON to `path`
    pub fn write(&self, path: &Path) -> ArchiveResult<()> {
        let json = serde_json::to_string(self)
            .map_err(|e| ArchiveError::Json(format!("Failed to serialize manifest: {}", e)))?;
        fs::write(path, json)
            .map_err(|e| ArchiveError::Io(format!("Failed to write {}: {}", path.display(), e)))
    }

    /// Read a manifest previously written with [`Manifest::write`]
    pub fn read(path: &Path) -> ArchiveResult<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ArchiveError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&contents)
            .map_err(|e| ArchiveError::Json(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Listed files that are not present under `base_dir`
    pub fn missing_files(&self, base_dir: &Path) -> Vec<String> {
        self.files
            .iter()
            .filter(|name| !base_dir.join(name).is_file())
            .cloned()
            .collect()
    }
}

/// Path of `file` relative to `base_dir`, with `/` separators
pub fn relative_name(base_dir: &Path, file: &Path) -> String {
    let relative = file.strip_prefix(base_dir).unwrap_or(file);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

mod rfc3339_millis {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
