//! In-memory storage backend.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::error::{StorageError, StorageResult};
use super::traits::Storage;
use super::types::{object_key, StorageOptions};

/// Keeps objects in a shared map keyed by `directory/filename`.
///
/// Clones share the same objects. URIs are built as `memory://key`, or
/// under the `base_uri` option when given.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    objects: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents of an object, if present.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }

    /// All stored keys in order.
    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    /// Inserts an object directly, bypassing `save`.
    pub async fn insert(&self, key: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.objects.write().await.insert(key.into(), data.into());
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    fn name(&self) -> &str {
        "memory"
    }

    async fn save(
        &self,
        directory: &str,
        filename: &str,
        source: &Path,
        _opts: &StorageOptions,
    ) -> StorageResult<()> {
        let key = object_key(directory, filename);
        let data = tokio::fs::read(source)
            .await
            .map_err(|e| StorageError::save_failed(&key, e))?;
        self.objects.write().await.insert(key, data);
        Ok(())
    }

    async fn delete(
        &self,
        directory: &str,
        filename: &str,
        _opts: &StorageOptions,
    ) -> StorageResult<()> {
        self.objects
            .write()
            .await
            .remove(&object_key(directory, filename));
        Ok(())
    }

    async fn copy(
        &self,
        directory: &str,
        filename: &str,
        to_directory: &str,
        to_filename: &str,
        _opts: &StorageOptions,
    ) -> StorageResult<()> {
        let from = object_key(directory, filename);
        let mut objects = self.objects.write().await;
        let data = objects
            .get(&from)
            .cloned()
            .ok_or_else(|| StorageError::not_found(&from))?;
        objects.insert(object_key(to_directory, to_filename), data);
        Ok(())
    }

    async fn retrieve(
        &self,
        directory: &str,
        filename: &str,
        destination: &Path,
        _opts: &StorageOptions,
    ) -> StorageResult<()> {
        let key = object_key(directory, filename);
        let data = self
            .get(&key)
            .await
            .ok_or_else(|| StorageError::not_found(&key))?;
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(destination, data)
            .await
            .map_err(|e| StorageError::retrieve_failed(&key, destination.to_path_buf(), e))
    }

    async fn build_uri(
        &self,
        directory: &str,
        filename: &str,
        opts: &StorageOptions,
    ) -> StorageResult<String> {
        let key = object_key(directory, filename);
        Ok(match opts.get("base_uri").and_then(|v| v.as_str()) {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), key),
            None => format!("memory://{}", key),
        })
    }
}
