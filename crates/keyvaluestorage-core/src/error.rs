//! Error types for the storage backends.
//!
//! Every backend reports failures through [`StorageError`]. Logical no-ops
//! (reading or removing an absent key) are never errors.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Main error type for storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    // Backing store errors
    #[error("Backing store error: {message}")]
    BackingStore {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Shared by every caller that was coalesced onto the same failed load.
    #[error("Snapshot load failed: {0}")]
    LoadFailed(#[source] Arc<StorageError>),

    // Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Lock poisoned: {0}")]
    Lock(String),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl StorageError {
    /// Create a backing store error without an underlying cause.
    pub fn backing_store(message: impl Into<String>) -> Self {
        StorageError::BackingStore {
            message: message.into(),
            source: None,
        }
    }

    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        StorageError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Check if retrying the same operation may succeed.
    ///
    /// A failed snapshot load leaves the cache unloaded, so the next call
    /// issues a fresh fetch.
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::BackingStore { .. }
            | StorageError::Io { .. }
            | StorageError::LoadFailed(_) => true,
            _ => false,
        }
    }
}
