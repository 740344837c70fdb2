//! Custom error types for cloud-archive
//!
//! Every stage of the backup and restore pipelines maps its failure onto one
//! variant here. Wrapping is additive: each variant prefixes its own stage
//! description and keeps the inner cause text untouched.

use thiserror::Error;

/// The main error type for cloud-archive operations
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Raw failure reported by a storage backend
    #[error("Storage error: {0}")]
    Storage(String),

    /// Reading or writing the bucket lifecycle failed
    #[error("Failed to enforce lifecycle settings for '{bucket}': {cause}")]
    Lifecycle { bucket: String, cause: String },

    /// Listing the bucket to find the latest archive failed
    #[error("Could not determine latest file from bucket '{bucket}': {cause}")]
    Listing { bucket: String, cause: String },

    /// No archive could be identified for a restore
    #[error("No archive found in bucket '{bucket}' with prefix '{prefix}'")]
    Resolution { bucket: String, prefix: String },

    /// Enumerating the files to back up failed
    #[error("File selection failed for '{path}' with pattern '{patterns}': {cause}")]
    Selection {
        path: String,
        patterns: String,
        cause: String,
    },

    /// Creating the archive failed
    #[error("Zipping files for upload failed; backup cannot continue: {0}")]
    Packaging(String),

    /// Uploading the archive failed
    #[error("Failed to upload tarball to configured object store; backup has failed: {0}")]
    Upload(String),

    /// Downloading the archive failed
    #[error("Failed to download file - {0}")]
    Download(String),

    /// The downloaded archive was absent or could not be unpacked
    #[error("The tarball was missing or corrupt: {0}")]
    Corrupt(String),

    /// Outer wrapper for every restore failure
    #[error("Restore attempt failed with: {0}")]
    Restore(Box<ArchiveError>),
}

impl ArchiveError {
    /// Wrap an error as a failed restore attempt
    pub fn restore(inner: ArchiveError) -> Self {
        Self::Restore(Box::new(inner))
    }

    /// Check if this is a lifecycle error
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::Lifecycle { .. })
    }

    /// Check if this error (or the error it wraps) is a corruption error
    pub fn is_corrupt(&self) -> bool {
        match self {
            Self::Corrupt(_) => true,
            Self::Restore(inner) => inner.is_corrupt(),
            _ => false,
        }
    }
}

impl From<std::io::Error> for ArchiveError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ArchiveError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for cloud-archive operations
pub type ArchiveResult<T> = Result<T, ArchiveError>;
