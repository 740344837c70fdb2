//! Lifecycle and listing CLI commands
//!
//! Both talk to the bucket directly through the reconciler without touching
//! the local data directory.

use clap::Subcommand;

use crate::config::Settings;
use crate::error::ArchiveResult;
use crate::lifecycle::{LifecycleReconciler, Reconciliation};
use crate::naming;
use crate::storage::StorageBackend;

/// Lifecycle subcommands
#[derive(Subcommand)]
pub enum LifecycleCommands {
    /// Show the bucket's current retention policy
    Show,

    /// Bring the bucket's lifecycle in line with the configured limits
    Enforce,
}

/// Handle a lifecycle command
pub async fn handle_lifecycle_command<B: StorageBackend>(
    settings: &Settings,
    backend: &B,
    cmd: LifecycleCommands,
) -> ArchiveResult<()> {
    let bucket = settings.storage.bucket.as_str();
    let reconciler = LifecycleReconciler::new(backend, bucket, settings.limits.policy());

    match cmd {
        LifecycleCommands::Show => {
            let current = reconciler.current().await?;
            println!("Bucket:     {}", bucket);
            println!("Current:    {}", current);
            println!("Configured: {}", settings.limits.policy());
        }

        LifecycleCommands::Enforce => match reconciler.enforce().await? {
            Reconciliation::Unchanged(policy) => {
                println!("Lifecycle for '{}' already up to date ({})", bucket, policy);
            }
            Reconciliation::Updated { applied, .. } => {
                println!("Lifecycle for '{}' updated: {}", bucket, applied);
            }
        },
    }

    Ok(())
}

/// Handle the latest command
pub async fn handle_latest_command<B: StorageBackend>(settings: &Settings, backend: &B) -> ArchiveResult<()> {
    let bucket = settings.storage.bucket.as_str();
    let prefix = naming::listing_prefix(&settings.file_name);
    let reconciler = LifecycleReconciler::new(backend, bucket, settings.limits.policy());

    match reconciler.latest(prefix).await? {
        Some(key) => println!("{}", key),
        None => {
            println!("No archives found in '{}' with prefix '{}'.", bucket, prefix);
        }
    }

    Ok(())
}
