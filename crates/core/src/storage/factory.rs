//! Storage backend construction.

use std::sync::Arc;

use super::config::{StorageBackend, StorageConfig};
use super::error::StorageResult;
use super::local::LocalStorage;
use super::memory::MemoryStorage;
use super::traits::Storage;

/// Creates the backend identified by `backend`, configured from `config`.
pub fn create_storage(
    backend: StorageBackend,
    config: &StorageConfig,
) -> StorageResult<Arc<dyn Storage>> {
    tracing::info!(backend = backend.as_str(), "Initializing storage backend");
    match backend {
        StorageBackend::Local => {
            std::fs::create_dir_all(&config.local.base_path)?;
            Ok(Arc::new(LocalStorage::new(config.local.clone())))
        }
        StorageBackend::Memory => Ok(Arc::new(MemoryStorage::new())),
    }
}
