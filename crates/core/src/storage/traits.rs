//! Storage abstraction trait.

use async_trait::async_trait;
use std::path::Path;

use super::error::StorageResult;
use super::types::StorageOptions;

/// The contract every storage backend satisfies.
///
/// Objects are addressed by `(directory, filename)`; `opts` carries the
/// merged backend-specific options for the call.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Returns the name of this backend.
    fn name(&self) -> &str;

    /// Persists the file at `source` as `directory/filename`.
    async fn save(
        &self,
        directory: &str,
        filename: &str,
        source: &Path,
        opts: &StorageOptions,
    ) -> StorageResult<()>;

    /// Removes `directory/filename`. Deleting an absent object succeeds.
    async fn delete(&self, directory: &str, filename: &str, opts: &StorageOptions)
        -> StorageResult<()>;

    /// Copies `directory/filename` to `to_directory/to_filename`.
    async fn copy(
        &self,
        directory: &str,
        filename: &str,
        to_directory: &str,
        to_filename: &str,
        opts: &StorageOptions,
    ) -> StorageResult<()>;

    /// Writes the contents of `directory/filename` to `destination`.
    async fn retrieve(
        &self,
        directory: &str,
        filename: &str,
        destination: &Path,
        opts: &StorageOptions,
    ) -> StorageResult<()>;

    /// Builds a reference URI for the object.
    ///
    /// Pure for most backends; async so signing backends can call a signer.
    async fn build_uri(
        &self,
        directory: &str,
        filename: &str,
        opts: &StorageOptions,
    ) -> StorageResult<String>;
}
