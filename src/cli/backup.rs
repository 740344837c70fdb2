//! Backup and restore CLI commands

use crate::backup::{BackupManager, RestoreManager};
use crate::config::Settings;
use crate::error::ArchiveResult;
use crate::storage::StorageBackend;

/// Handle the backup command
pub async fn handle_backup_command<B: StorageBackend>(settings: Settings, backend: B) -> ArchiveResult<()> {
    let bucket = settings.storage.bucket.clone();
    let manager = BackupManager::new(settings, backend);

    println!("Backing up {}...", manager.paths().data_dir().display());
    let outcome = manager.backup().await?;

    println!("Backup complete!");
    println!("Archive: {}", outcome.archive.remote_key);
    println!("Bucket:  {}", bucket);
    println!("Files:   {}", outcome.files.len());
    println!("Lifecycle: {}", outcome.lifecycle.policy());

    Ok(())
}

/// Handle the restore command
pub async fn handle_restore_command<B: StorageBackend>(settings: Settings, backend: B) -> ArchiveResult<()> {
    let manager = RestoreManager::new(settings, backend);

    println!("Restoring into {}...", manager.paths().data_dir().display());
    let outcome = manager.restore().await?;

    println!("Restore complete!");
    println!("{}", outcome.summary());

    Ok(())
}
