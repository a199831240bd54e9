//! Error types for blockpack
//!
//! Provides a unified error type for all archive operations.

use thiserror::Error;

/// Result type alias using PackError
pub type Result<T> = std::result::Result<T, PackError>;

/// Unified error type for blockpack operations
#[derive(Debug, Error)]
pub enum PackError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot read input {path}: {source}")]
    Input {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write output {path}: {source}")]
    Output {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // -------------------------------------------------------------------------
    // Container Format Errors
    // -------------------------------------------------------------------------
    #[error("Invalid container format: {0}")]
    Format(String),

    #[error("Container corruption detected: {0}")]
    Corrupt(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Capacity Errors
    // -------------------------------------------------------------------------
    #[error("Capacity exhausted: {what} (limit {limit})")]
    Capacity { what: &'static str, limit: usize },

    // -------------------------------------------------------------------------
    // Entry Errors
    // -------------------------------------------------------------------------
    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Invalid entry name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PackError {
    /// Whether this error must abort the whole operation.
    ///
    /// Per-item problems (a missing name, an unreadable input file) are
    /// recorded in the batch report; everything touching the container's
    /// own consistency stops the invocation.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            PackError::NotFound(_)
                | PackError::InvalidName { .. }
                | PackError::Input { .. }
                | PackError::Output { .. }
        )
    }
}

impl From<bincode::Error> for PackError {
    fn from(err: bincode::Error) -> Self {
        PackError::Serialization(err.to_string())
    }
}
