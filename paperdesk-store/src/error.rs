//! Storage layer errors

use thiserror::Error;

/// Errors that can occur in the storage layer
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error (reading a stored snapshot)
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Snapshot written by an incompatible version
    #[error("Unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version found on disk
        found: u32,
        /// Version this build writes
        expected: u32,
    },
}
