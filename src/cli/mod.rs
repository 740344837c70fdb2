//! CLI command handlers
//!
//! This module contains the implementation of CLI commands, bridging the clap
//! argument parsing with the backup, restore and lifecycle layers. The storage
//! backend is chosen once here and every handler is generic over it.

pub mod backup;
pub mod lifecycle;

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::config::settings::split_patterns;
use crate::config::Settings;
use crate::error::ArchiveResult;
use crate::storage::{BackendKind, GcsBackend, S3Backend, StorageBackend};

pub use backup::{handle_backup_command, handle_restore_command};
pub use lifecycle::{handle_latest_command, handle_lifecycle_command, LifecycleCommands};

/// Top-level commands
#[derive(Subcommand)]
pub enum Command {
    /// Enforce lifecycle, archive the data directory and upload it
    Backup,

    /// Download an archive and unpack it into the data directory
    Restore,

    /// Inspect or enforce the bucket lifecycle
    #[command(subcommand)]
    Lifecycle(LifecycleCommands),

    /// Print the key of the newest archive in the bucket
    Latest,
}

/// Settings overrides; every flag can also be set through its environment variable
#[derive(Debug, Default, Args)]
pub struct SettingsArgs {
    /// JSON settings file loaded before flags and environment are applied
    #[arg(long, global = true, env = "CLOUD_ARCHIVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory the data path is resolved against
    #[arg(long, global = true, env = "BASE_PATH")]
    pub base_path: Option<PathBuf>,

    /// Directory to back up and restore into
    #[arg(long, global = true, env = "DATA_PATH")]
    pub data_path: Option<PathBuf>,

    /// Archive name template, e.g. "archive_{{date}}.tgz"
    #[arg(long, global = true, env = "FILE_NAME_FORMAT")]
    pub file_name_format: Option<String>,

    /// Comma separated glob patterns selecting the files to back up
    #[arg(long, global = true, env = "FILE_PATTERNS")]
    pub patterns: Option<String>,

    /// Bucket holding the archives
    #[arg(long, global = true, env = "OBJECT_STORE")]
    pub bucket: Option<String>,

    /// Archive to restore instead of the newest one
    #[arg(long, global = true, env = "FILE_NAME")]
    pub archive: Option<String>,

    /// Delete archives this many days after creation (0 leaves the rule alone)
    #[arg(long, global = true, env = "DISCARD_AFTER")]
    pub discard_after: Option<u32>,

    /// Move archives to cold storage after this many days (0 leaves the rule alone)
    #[arg(long, global = true, env = "COLDLINE_AFTER")]
    pub coldline_after: Option<u32>,

    /// Storage backend; detected from the environment when omitted
    #[arg(long, global = true, env = "STORAGE_BACKEND", value_enum)]
    pub backend: Option<BackendKind>,
}

impl SettingsArgs {
    /// Load the settings file (if any) and apply the overrides on top
    pub fn load(&self) -> ArchiveResult<Settings> {
        let settings = Settings::load_or_default(self.config.as_deref())?;
        Ok(self.apply(settings))
    }

    /// Apply every override that was given
    pub fn apply(&self, mut settings: Settings) -> Settings {
        if let Some(base_path) = &self.base_path {
            settings.base_path = base_path.clone();
        }
        if let Some(data_path) = &self.data_path {
            settings.data_path = data_path.clone();
        }
        if let Some(format) = &self.file_name_format {
            settings.file_name = format.clone();
        }
        if let Some(patterns) = &self.patterns {
            settings.patterns = split_patterns(patterns);
        }
        if let Some(bucket) = &self.bucket {
            settings.storage.bucket = bucket.clone();
        }
        if let Some(archive) = &self.archive {
            settings.storage.archive = Some(archive.clone());
        }
        if let Some(days) = self.discard_after {
            settings.limits.delete_after = days;
        }
        if let Some(days) = self.coldline_after {
            settings.limits.coldline_after = days;
        }
        if let Some(backend) = self.backend {
            settings.storage.backend = Some(backend);
        }
        settings
    }
}

/// Validate the settings, connect to the configured backend and run `command`
pub async fn dispatch(command: Command, settings: Settings) -> ArchiveResult<()> {
    settings.validate()?;

    match settings.backend() {
        BackendKind::Gcs => run(command, settings, GcsBackend::from_env()?).await,
        BackendKind::S3 => run(command, settings, S3Backend::from_env().await).await,
    }
}

async fn run<B: StorageBackend>(command: Command, settings: Settings, backend: B) -> ArchiveResult<()> {
    match command {
        Command::Backup => handle_backup_command(settings, backend).await,
        Command::Restore => handle_restore_command(settings, backend).await,
        Command::Lifecycle(cmd) => handle_lifecycle_command(&settings, &backend, cmd).await,
        Command::Latest => handle_latest_command(&settings, &backend).await,
    }
}
