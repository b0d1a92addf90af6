//! Types for the orchestrator.

use thiserror::Error;

use crate::config::ConfigError;
use crate::state::FileState;
use crate::storage::StorageError;

/// Errors returned by orchestrator operations.
#[derive(Debug, Error)]
pub enum OperationError {
    /// Pre-processing rejected the file; no version work ran.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The resolved options are unusable.
    #[error("invalid options: {0}")]
    Options(#[from] ConfigError),

    /// Sequential mode only: the whole operation exceeded its deadline.
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// At least one version failed. Carries the aggregate state, including
    /// the versions that succeeded.
    #[error("{} version(s) failed", .0.errors().len())]
    Versions(Box<FileState>),

    /// The version id is not part of the state's configured versions.
    #[error("unknown version: {0}")]
    UnknownVersion(String),

    /// The canonical version cannot be regenerated.
    #[error("version is not regeneratable: {0}")]
    NotRegeneratable(String),

    /// A single-object storage call failed (retrieve, url).
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The unit of work ended without producing a result (panic, abort).
    #[error("operation aborted: {0}")]
    Aborted(String),
}

impl OperationError {
    /// The aggregate state of a partially failed operation.
    pub fn state(&self) -> Option<&FileState> {
        match self {
            Self::Versions(state) => Some(state),
            _ => None,
        }
    }

    /// Consumes the error, returning the aggregate state if there is one.
    pub fn into_state(self) -> Option<FileState> {
        match self {
            Self::Versions(state) => Some(*state),
            _ => None,
        }
    }
}
