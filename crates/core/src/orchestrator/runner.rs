//! Orchestrator implementation.
//!
//! Every public operation builds on the same per-version pipeline:
//! - store: validate once, then transform, post-process, name and save each version
//! - delete / copy: name each version, then call the storage contract
//! - regenerate: store again for a subset of versions of a restored state
//! - retrieve / url: name one version, then a single storage call

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::Options;
use crate::definition::Definition;
use crate::metrics;
use crate::state::{FileState, Source, VersionId};
use crate::storage::Storage;
use crate::transform::TransformExecutor;

use super::execution::run_versions;
use super::pipeline::{remove_temp_files, temp_file_path, Operation, Pipeline};
use super::types::OperationError;

/// Drives files of one attachment type through their version pipelines.
pub struct Orchestrator<D: Definition> {
    pipeline: Pipeline<D>,
}

impl<D: Definition> Orchestrator<D> {
    /// Create a new orchestrator.
    pub fn new(
        definition: D,
        storage: Arc<dyn Storage>,
        executor: Arc<dyn TransformExecutor>,
    ) -> Self {
        Self {
            pipeline: Pipeline::new(Arc::new(definition), storage, executor),
        }
    }

    pub fn definition(&self) -> &D {
        self.pipeline.definition()
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        self.pipeline.storage()
    }

    /// Stores `source` and every version configured in `options`.
    ///
    /// Returns `OperationError::Versions` if any version failed; the state
    /// it carries still holds the versions that were stored.
    pub async fn store(
        &self,
        source: Source,
        scope: serde_json::Value,
        options: Options,
    ) -> Result<FileState, OperationError> {
        let start = Instant::now();
        options.validate()?;

        if source.filename().is_empty() {
            return Err(OperationError::Validation("empty filename".to_string()));
        }
        let source_path = source
            .materialize(&options.temp_dir)
            .await
            .map_err(|e| OperationError::Validation(e.to_string()))?;
        let keep_temp_files = options.keep_temp_files;

        let state = FileState::new(source.filename(), options)
            .with_source_path(source_path.clone())
            .with_scope(scope);

        let result = match self.pipeline.definition().validate(&state) {
            Ok(()) => {
                let versions = state.version_ids();
                run_versions(&self.pipeline, Operation::Store, state, &versions).await
            }
            Err(reason) => {
                warn!(filename = state.filename(), reason = %reason, "File rejected");
                Err(OperationError::Validation(reason))
            }
        };

        if source.is_in_memory() && !keep_temp_files {
            remove_temp_files(std::slice::from_ref(&source_path)).await;
        }
        self.finish("store", start, result)
    }

    /// Deletes every version of `state` from storage.
    ///
    /// Absent objects are not an error, so deleting twice succeeds twice.
    pub async fn delete(&self, state: FileState) -> Result<FileState, OperationError> {
        let start = Instant::now();
        let state = state.without_source();
        let versions = state.version_ids();
        let result = run_versions(&self.pipeline, Operation::Delete, state, &versions).await;
        self.finish("delete", start, result)
    }

    /// Downloads one version to `destination`, or to a fresh temp file.
    pub async fn retrieve(
        &self,
        state: &FileState,
        version: &str,
        destination: Option<PathBuf>,
    ) -> Result<PathBuf, OperationError> {
        let start = Instant::now();
        let version = self.known_version(state, version)?;
        let location = self.pipeline.locate(state, &version);
        let options = state.options();

        let destination = match destination {
            Some(path) => path,
            None => {
                tokio::fs::create_dir_all(&options.temp_dir)
                    .await
                    .map_err(crate::storage::StorageError::from)?;
                let extension = Path::new(&location.filename)
                    .extension()
                    .map(|e| format!(".{}", e.to_string_lossy()))
                    .unwrap_or_default();
                temp_file_path(&options.temp_dir, &extension)
            }
        };

        let retrieve = self.pipeline.storage().retrieve(
            &location.directory,
            &location.filename,
            &destination,
            &location.opts,
        );
        let result = tokio::time::timeout(options.timeout(), retrieve)
            .await
            .map_err(|_| OperationError::Timeout {
                timeout_ms: options.timeout_ms,
            })?;
        metrics::record_storage("retrieve", result.is_ok());
        result?;

        metrics::OPERATION_DURATION
            .with_label_values(&["retrieve"])
            .observe(start.elapsed().as_secs_f64());
        debug!(version = %version, destination = %destination.display(), "Version retrieved");
        Ok(destination)
    }

    /// Copies every version of `from` to the locations resolved for `to`.
    ///
    /// `to` is typically `from` restored under a different scope.
    pub async fn copy(&self, from: &FileState, to: FileState) -> Result<FileState, OperationError> {
        let start = Instant::now();
        let to = to.without_source();
        let versions = to.version_ids();
        let operation = Operation::Copy(Arc::new(from.clone()));
        let result = run_versions(&self.pipeline, operation, to, &versions).await;
        self.finish("copy", start, result)
    }

    /// Re-runs the store pipeline for `versions` of a restored state.
    ///
    /// The original is fetched from storage; versions not listed keep their
    /// state untouched.
    pub async fn regenerate(
        &self,
        state: FileState,
        versions: &[VersionId],
    ) -> Result<FileState, OperationError> {
        let start = Instant::now();
        let mut selected: Vec<VersionId> = Vec::with_capacity(versions.len());
        for version in versions {
            if version.is_original() {
                return Err(OperationError::NotRegeneratable(version.to_string()));
            }
            let version = self.known_version(&state, version.as_str())?;
            if !selected.contains(&version) {
                selected.push(version);
            }
        }

        let source = self.retrieve(&state, VersionId::ORIGINAL, None).await?;
        let keep_temp_files = state.options().keep_temp_files;
        let state = state.with_source_path(source.clone());

        info!(
            filename = state.filename(),
            versions = ?selected,
            "Regenerating versions"
        );
        let result = run_versions(&self.pipeline, Operation::Store, state, &selected).await;

        if !keep_temp_files {
            remove_temp_files(std::slice::from_ref(&source)).await;
        }
        self.finish("regenerate", start, result)
    }

    /// Reference URL of one version.
    pub async fn url(&self, state: &FileState, version: &str) -> Result<String, OperationError> {
        let version = self.known_version(state, version)?;
        let location = self.pipeline.locate(state, &version);
        let uri = self
            .pipeline
            .storage()
            .build_uri(&location.directory, &location.filename, &location.opts)
            .await?;
        Ok(uri)
    }

    /// Reference URLs of every configured version.
    pub async fn urls(&self, state: &FileState) -> Result<BTreeMap<VersionId, String>, OperationError> {
        let mut urls = BTreeMap::new();
        for version in state.version_ids() {
            let url = self.url(state, version.as_str()).await?;
            urls.insert(version, url);
        }
        Ok(urls)
    }

    fn known_version(&self, state: &FileState, version: &str) -> Result<VersionId, OperationError> {
        if state.has_version(version) {
            Ok(VersionId::from(version))
        } else {
            Err(OperationError::UnknownVersion(version.to_string()))
        }
    }

    /// Turns an aggregate state into the operation result.
    fn finish(
        &self,
        operation: &str,
        start: Instant,
        result: Result<FileState, OperationError>,
    ) -> Result<FileState, OperationError> {
        metrics::OPERATION_DURATION
            .with_label_values(&[operation])
            .observe(start.elapsed().as_secs_f64());

        let state = result?;
        if state.is_ok() {
            info!(
                definition = self.pipeline.definition().name(),
                operation,
                filename = state.filename(),
                versions = state.versions().len(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Operation completed"
            );
            Ok(state)
        } else {
            warn!(
                definition = self.pipeline.definition().name(),
                operation,
                filename = state.filename(),
                failed = state.errors().len(),
                "Operation completed with failed versions"
            );
            Err(OperationError::Versions(Box::new(state)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::DefaultDefinition;
    use crate::state::Stage;
    use crate::storage::{LocalStorage, LocalStorageConfig, MemoryStorage};
    use crate::testing::MockExecutor;
    use crate::transform::Transform;
    use serde_json::json;
    use tempfile::TempDir;

    struct Avatar;

    impl Definition for Avatar {
        fn transform(&self, _state: &FileState, version: &VersionId) -> Option<Transform> {
            (version.as_str() == "thumb").then(|| Transform::command("convert", "-thumbnail 100x100>"))
        }

        fn storage_dir(&self, state: &FileState, _version: &VersionId) -> String {
            state
                .scope
                .get("id")
                .map(|id| id.to_string())
                .unwrap_or_default()
        }
    }

    fn options(temp: &TempDir) -> Options {
        Options::default()
            .with_versions(["original", "thumb"])
            .with_temp_dir(temp.path().join("tmp"))
    }

    fn orchestrator(storage: &MemoryStorage) -> Orchestrator<Avatar> {
        Orchestrator::new(
            Avatar,
            Arc::new(storage.clone()),
            Arc::new(MockExecutor::new()),
        )
    }

    #[tokio::test]
    async fn test_store_bytes() {
        let temp = TempDir::new().unwrap();
        let storage = MemoryStorage::new();
        let orchestrator = orchestrator(&storage);

        let state = orchestrator
            .store(
                Source::bytes("coffee.jpg", b"beans".to_vec()),
                json!({"id": 42}),
                options(&temp),
            )
            .await
            .unwrap();

        assert!(state.is_ok());
        assert_eq!(storage.get("42/coffee.jpg").await.unwrap(), b"beans");
        assert_eq!(storage.get("42/coffee_thumb.jpg").await.unwrap(), b"beans");

        // The spilled upload is gone.
        let spilled = state.source_path.as_ref().unwrap();
        assert!(!spilled.exists());
    }

    #[tokio::test]
    async fn test_store_rejects_empty_filename() {
        let temp = TempDir::new().unwrap();
        let orchestrator = orchestrator(&MemoryStorage::new());

        let err = orchestrator
            .store(Source::bytes("", b"x".to_vec()), json!({}), options(&temp))
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::Validation(_)));
    }

    #[tokio::test]
    async fn test_store_rejects_invalid_options() {
        let temp = TempDir::new().unwrap();
        let orchestrator = orchestrator(&MemoryStorage::new());

        let err = orchestrator
            .store(
                Source::bytes("coffee.jpg", b"x".to_vec()),
                json!({}),
                options(&temp).with_timeout_ms(0),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::Options(_)));
    }

    #[tokio::test]
    async fn test_validation_hook_aborts() {
        struct PdfOnly;
        impl Definition for PdfOnly {
            fn validate(&self, state: &FileState) -> Result<(), String> {
                crate::definition::defaults::validate_extension(state, &["pdf"])
            }
        }

        let temp = TempDir::new().unwrap();
        let storage = MemoryStorage::new();
        let orchestrator = Orchestrator::new(
            PdfOnly,
            Arc::new(storage.clone()),
            Arc::new(MockExecutor::new()),
        );

        let err = orchestrator
            .store(
                Source::bytes("coffee.jpg", b"x".to_vec()),
                json!({}),
                options(&temp),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::Validation(_)));
        assert!(storage.keys().await.is_empty());

        // The materialized upload is removed on rejection too.
        let mut entries = tokio::fs::read_dir(temp.path().join("tmp")).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_version_returns_partial_state() {
        let temp = TempDir::new().unwrap();
        let storage = MemoryStorage::new();
        let executor = MockExecutor::new();
        executor.fail_program("convert", "convert: no decode delegate").await;
        let orchestrator = Orchestrator::new(Avatar, Arc::new(storage.clone()), Arc::new(executor));

        let err = orchestrator
            .store(
                Source::bytes("coffee.jpg", b"beans".to_vec()),
                json!({"id": 1}),
                options(&temp),
            )
            .await
            .unwrap_err();

        let state = err.into_state().unwrap();
        assert!(state.version("original").unwrap().stored);
        let errors = &state.errors()["thumb"];
        assert_eq!(errors[0].stage, Stage::Transform);
        assert_eq!(errors[0].reason, "convert: no decode delegate");
        assert_eq!(storage.keys().await, vec!["1/coffee.jpg"]);
    }

    #[tokio::test]
    async fn test_url_scenario() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new(LocalStorageConfig::default().with_base_path(temp.path()));
        let orchestrator = Orchestrator::new(Avatar, Arc::new(storage), Arc::new(MockExecutor::new()));

        let state = FileState::new(
            "coffee.jpg",
            options(&temp).with_storage_opt("base_uri", "http://example.com"),
        )
        .with_scope(json!({"id": 42}));

        let url = orchestrator.url(&state, "original").await.unwrap();
        assert_eq!(url, "http://example.com/42/coffee.jpg");

        let urls = orchestrator.urls(&state).await.unwrap();
        assert_eq!(urls["thumb"], "http://example.com/42/coffee_thumb.jpg");

        assert!(matches!(
            orchestrator.url(&state, "large").await,
            Err(OperationError::UnknownVersion(_))
        ));
    }

    #[tokio::test]
    async fn test_retrieve_to_temp_file() {
        let temp = TempDir::new().unwrap();
        let storage = MemoryStorage::new();
        storage.insert("7/coffee.jpg", b"beans".to_vec()).await;
        let orchestrator = orchestrator(&storage);

        let state = FileState::new("coffee.jpg", options(&temp)).with_scope(json!({"id": 7}));
        let path = orchestrator.retrieve(&state, "original", None).await.unwrap();

        assert!(path.starts_with(temp.path().join("tmp")));
        assert_eq!(path.extension().unwrap(), "jpg");
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"beans");
    }

    #[tokio::test]
    async fn test_retrieve_missing_object() {
        let temp = TempDir::new().unwrap();
        let orchestrator = orchestrator(&MemoryStorage::new());
        let state = FileState::new("coffee.jpg", options(&temp));

        let err = orchestrator
            .retrieve(&state, "original", Some(temp.path().join("out.jpg")))
            .await
            .unwrap_err();
        match err {
            OperationError::Storage(e) => assert!(e.is_not_found()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_regenerate_rejects_original() {
        let temp = TempDir::new().unwrap();
        let orchestrator = orchestrator(&MemoryStorage::new());
        let state = FileState::new("coffee.jpg", options(&temp));

        let err = orchestrator
            .regenerate(state, &[VersionId::original()])
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::NotRegeneratable(_)));
    }

    #[tokio::test]
    async fn test_regenerate_unknown_version() {
        let temp = TempDir::new().unwrap();
        let orchestrator = orchestrator(&MemoryStorage::new());
        let state = FileState::new("coffee.jpg", options(&temp));

        let err = orchestrator
            .regenerate(state, &[VersionId::from("large")])
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::UnknownVersion(_)));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let storage = MemoryStorage::new();
        let orchestrator = orchestrator(&storage);

        let state = orchestrator
            .store(
                Source::bytes("coffee.jpg", b"beans".to_vec()),
                json!({"id": 3}),
                options(&temp),
            )
            .await
            .unwrap();
        assert_eq!(storage.keys().await.len(), 2);

        let deleted = orchestrator.delete(state.clone()).await.unwrap();
        assert!(storage.keys().await.is_empty());
        assert!(deleted.source_path.is_none());

        assert!(orchestrator.delete(state).await.is_ok());
    }

    #[tokio::test]
    async fn test_default_definition_stores_original_only() {
        let temp = TempDir::new().unwrap();
        let storage = MemoryStorage::new();
        let orchestrator = Orchestrator::new(
            DefaultDefinition,
            Arc::new(storage.clone()),
            Arc::new(MockExecutor::new()),
        );

        let options = Options::default().with_temp_dir(temp.path().join("tmp"));
        orchestrator
            .store(Source::bytes("notes.txt", b"hi".to_vec()), json!(null), options)
            .await
            .unwrap();
        assert_eq!(storage.keys().await, vec!["notes.txt"]);
    }
}
