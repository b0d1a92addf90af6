//! Mock storage backend for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::storage::{object_key, MemoryStorage, Storage, StorageError, StorageOptions, StorageResult};

/// A recorded storage call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// `save`, `delete`, `copy` or `retrieve`.
    pub operation: &'static str,
    /// Object key the call addressed (the source key for copies).
    pub key: String,
    /// Options the call received.
    pub opts: StorageOptions,
    /// Whether the call succeeded.
    pub success: bool,
}

/// Mock implementation of the Storage trait.
///
/// Objects live in a `MemoryStorage`; on top of it the mock can:
/// - Track calls for assertions
/// - Fail saves of given filenames
/// - Fail the next call with a given error
/// - Simulate latency on every call
///
/// Clones share objects, recorded calls and failure settings.
///
/// # Example
///
/// ```rust,ignore
/// use quiver_core::testing::MockStorage;
///
/// let storage = MockStorage::new();
/// storage.fail_saves_of("coffee_thumb.jpg").await;
///
/// // ... run an orchestrator with Arc::new(storage.clone()) ...
///
/// assert_eq!(storage.saved_keys().await, vec!["coffee.jpg"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockStorage {
    objects: MemoryStorage,
    /// Recorded calls.
    calls: Arc<RwLock<Vec<RecordedCall>>>,
    /// Filenames whose saves fail.
    failing_saves: Arc<RwLock<HashSet<String>>>,
    /// If set, the next call will fail with this error.
    next_error: Arc<RwLock<Option<StorageError>>>,
    /// Simulated duration of every call.
    latency: Option<Duration>,
}

impl MockStorage {
    /// Create a new mock storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// The objects stored so far.
    pub fn objects(&self) -> &MemoryStorage {
        &self.objects
    }

    /// Get all recorded calls.
    pub async fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls.read().await.clone()
    }

    /// Keys of successful saves, in call order.
    pub async fn saved_keys(&self) -> Vec<String> {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| c.operation == "save" && c.success)
            .map(|c| c.key.clone())
            .collect()
    }

    /// Clear recorded calls.
    pub async fn clear_recorded(&self) {
        self.calls.write().await.clear();
    }

    /// Makes every save of `filename` fail.
    pub async fn fail_saves_of(&self, filename: impl Into<String>) {
        self.failing_saves.write().await.insert(filename.into());
    }

    /// Configure the next call to fail with the given error.
    pub async fn set_next_error(&self, error: StorageError) {
        *self.next_error.write().await = Some(error);
    }

    /// Applies latency and the pending error.
    async fn before_call(&self) -> StorageResult<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match self.next_error.write().await.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn record<T>(
        &self,
        operation: &'static str,
        key: String,
        opts: &StorageOptions,
        result: StorageResult<T>,
    ) -> StorageResult<T> {
        self.calls.write().await.push(RecordedCall {
            operation,
            key,
            opts: opts.clone(),
            success: result.is_ok(),
        });
        result
    }
}

#[async_trait]
impl Storage for MockStorage {
    fn name(&self) -> &str {
        "mock"
    }

    async fn save(
        &self,
        directory: &str,
        filename: &str,
        source: &Path,
        opts: &StorageOptions,
    ) -> StorageResult<()> {
        let key = object_key(directory, filename);
        let result = match self.before_call().await {
            Ok(()) => {
                if self.failing_saves.read().await.contains(filename) {
                    Err(StorageError::save_failed(&key, "injected failure"))
                } else {
                    self.objects.save(directory, filename, source, opts).await
                }
            }
            Err(e) => Err(e),
        };
        self.record("save", key, opts, result).await
    }

    async fn delete(
        &self,
        directory: &str,
        filename: &str,
        opts: &StorageOptions,
    ) -> StorageResult<()> {
        let result = match self.before_call().await {
            Ok(()) => self.objects.delete(directory, filename, opts).await,
            Err(e) => Err(e),
        };
        self.record("delete", object_key(directory, filename), opts, result)
            .await
    }

    async fn copy(
        &self,
        directory: &str,
        filename: &str,
        to_directory: &str,
        to_filename: &str,
        opts: &StorageOptions,
    ) -> StorageResult<()> {
        let result = match self.before_call().await {
            Ok(()) => {
                self.objects
                    .copy(directory, filename, to_directory, to_filename, opts)
                    .await
            }
            Err(e) => Err(e),
        };
        self.record("copy", object_key(directory, filename), opts, result)
            .await
    }

    async fn retrieve(
        &self,
        directory: &str,
        filename: &str,
        destination: &Path,
        opts: &StorageOptions,
    ) -> StorageResult<()> {
        let result = match self.before_call().await {
            Ok(()) => {
                self.objects
                    .retrieve(directory, filename, destination, opts)
                    .await
            }
            Err(e) => Err(e),
        };
        self.record("retrieve", object_key(directory, filename), opts, result)
            .await
    }

    async fn build_uri(
        &self,
        directory: &str,
        filename: &str,
        opts: &StorageOptions,
    ) -> StorageResult<String> {
        self.objects.build_uri(directory, filename, opts).await
    }
}
