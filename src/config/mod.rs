//! Configuration module for cloud-archive
//!
//! This module provides:
//! - Settings loaded from defaults, a JSON file and the environment
//! - Local path resolution for the data directory and staged archives

pub mod paths;
pub mod settings;

pub use paths::ArchivePaths;
pub use settings::Settings;
