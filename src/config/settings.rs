//! Settings for cloud-archive
//!
//! Settings start from defaults, may be loaded from a JSON file, and are then
//! overridden by command-line flags or their environment variables (see
//! `cli::SettingsArgs`).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ArchiveError;
use crate::lifecycle::RetentionPolicy;
use crate::storage::BackendKind;

/// Bucket and archive selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Backend family; detected from the environment when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendKind>,

    /// Bucket holding the archives
    pub bucket: String,

    /// Archive to restore instead of the latest one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive: Option<String>,
}

/// Bucket retention limits in days; 0 leaves that rule alone
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionLimits {
    /// Delete archives this many days after creation
    pub delete_after: u32,
    /// Move archives to cold storage this many days after creation
    pub coldline_after: u32,
}

impl RetentionLimits {
    pub fn policy(&self) -> RetentionPolicy {
        RetentionPolicy::from_limits(self.delete_after, self.coldline_after)
    }
}

/// Settings for one backup or restore run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Directory the data path is resolved against
    #[serde(default = "default_base_path")]
    pub base_path: PathBuf,

    /// Directory (relative to `base_path`) that is backed up and restored into
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,

    /// Archive name template, e.g. `archive_{{date}}.tgz`
    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// Glob patterns selecting the files to back up
    #[serde(default = "default_patterns")]
    pub patterns: Vec<String>,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub limits: RetentionLimits,
}

fn default_base_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_data_path() -> PathBuf {
    PathBuf::from("archive")
}

fn default_file_name() -> String {
    "archive_{{date}}.tgz".to_string()
}

fn default_patterns() -> Vec<String> {
    vec!["**/*".to_string()]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
            data_path: default_data_path(),
            file_name: default_file_name(),
            patterns: default_patterns(),
            storage: StorageSettings::default(),
            limits: RetentionLimits::default(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file
    pub fn load(path: &Path) -> Result<Self, ArchiveError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ArchiveError::Io(format!(
                "Failed to read settings file {}: {}",
                path.display(),
                e
            ))
        })?;

        serde_json::from_str(&contents).map_err(|e| {
            ArchiveError::Config(format!(
                "Failed to parse settings file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Load settings from `path` if given, otherwise start from defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ArchiveError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Save settings to disk
    pub fn save(&self, path: &Path) -> Result<(), ArchiveError> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| ArchiveError::Config(format!("Failed to serialize settings: {}", e)))?;

        std::fs::write(path, contents)
            .map_err(|e| ArchiveError::Io(format!("Failed to write settings file: {}", e)))
    }

    /// Check that the settings are usable for talking to a bucket
    pub fn validate(&self) -> Result<(), ArchiveError> {
        if self.storage.bucket.trim().is_empty() {
            return Err(ArchiveError::Config(
                "no bucket configured; set OBJECT_STORE or --bucket".into(),
            ));
        }
        if self.file_name.trim().is_empty() {
            return Err(ArchiveError::Config("archive file name template is empty".into()));
        }
        if self.patterns.iter().all(|p| p.trim().is_empty()) {
            return Err(ArchiveError::Config("no file patterns configured".into()));
        }
        Ok(())
    }

    /// Backend to use, detecting it from the environment when not configured
    pub fn backend(&self) -> BackendKind {
        self.storage.backend.unwrap_or_else(BackendKind::detect)
    }

    /// Patterns joined for display in messages
    pub fn patterns_display(&self) -> String {
        self.patterns.join(", ")
    }
}

/// Split a comma separated pattern list, dropping empty entries
pub fn split_patterns(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
