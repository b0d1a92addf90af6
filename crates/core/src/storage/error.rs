//! Error types for the storage module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Object not found.
    #[error("Object not found: {key}")]
    NotFound { key: String },

    /// Failed to write an object.
    #[error("Failed to save {key}: {reason}")]
    SaveFailed { key: String, reason: String },

    /// Failed to copy an object.
    #[error("Failed to copy {from} to {to}: {reason}")]
    CopyFailed {
        from: String,
        to: String,
        reason: String,
    },

    /// Failed to delete an object.
    #[error("Failed to delete {key}: {reason}")]
    DeleteFailed { key: String, reason: String },

    /// Failed to fetch an object to a local path.
    #[error("Failed to retrieve {key} to {destination}: {reason}")]
    RetrieveFailed {
        key: String,
        destination: PathBuf,
        reason: String,
    },

    /// Directory or filename would escape the storage root.
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn save_failed(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::SaveFailed {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    pub fn delete_failed(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::DeleteFailed {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    pub fn copy_failed(from: impl Into<String>, to: impl Into<String>, reason: impl ToString) -> Self {
        Self::CopyFailed {
            from: from.into(),
            to: to.into(),
            reason: reason.to_string(),
        }
    }

    pub fn retrieve_failed(
        key: impl Into<String>,
        destination: PathBuf,
        reason: impl ToString,
    ) -> Self {
        Self::RetrieveFailed {
            key: key.into(),
            destination,
            reason: reason.to_string(),
        }
    }

    /// Whether this error means the object is absent.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
