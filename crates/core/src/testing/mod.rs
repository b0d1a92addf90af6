//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the storage and transform
//! executor traits, so orchestrator behaviour can be tested without real
//! backends or conversion programs.
//!
//! # Example
//!
//! ```rust,ignore
//! use quiver_core::testing::{MockExecutor, MockStorage};
//!
//! let storage = MockStorage::new();
//! let executor = MockExecutor::new();
//!
//! // Configure failures
//! storage.fail_saves_of("coffee_thumb.jpg").await;
//! executor.fail_program("convert", "convert: no decode delegate").await;
//!
//! // Use in an Orchestrator...
//! ```

mod mock_executor;
mod mock_storage;

pub use mock_executor::{MockExecutor, RecordedInvocation};
pub use mock_storage::{MockStorage, RecordedCall};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};

    use crate::config::Options;

    /// Writes `contents` to `dir/name` and returns the path.
    pub async fn source_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        let _ = tokio::fs::write(&path, contents).await;
        path
    }

    /// Options for `versions` with temp files kept under `dir/tmp`.
    pub fn options(dir: &Path, versions: &[&str]) -> Options {
        Options::default()
            .with_versions(versions.iter().copied())
            .with_temp_dir(dir.join("tmp"))
    }
}
