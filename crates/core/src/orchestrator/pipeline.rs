//! The per-version stage pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::definition::Definition;
use crate::metrics;
use crate::state::{FileState, StageError, VersionId};
use crate::storage::{merge_options, object_names, Storage, StorageOptions};
use crate::transform::{Transform, TransformError, TransformExecutor, TransformOutput};

/// What a pipeline run does with each version.
#[derive(Clone)]
pub(crate) enum Operation {
    /// Transform, post-process, name and save.
    Store,
    /// Name and delete.
    Delete,
    /// Name on both sides and copy from the given state.
    Copy(Arc<FileState>),
}

/// One stage of a version pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    ResolveTransform,
    Transform,
    Postprocess,
    StorageDir,
    Filename,
    StorageOpts,
    Persist,
    Delete,
    Copy,
}

impl Step {
    fn as_str(&self) -> &'static str {
        match self {
            Self::ResolveTransform => "resolve_transform",
            Self::Transform => "transform",
            Self::Postprocess => "postprocess",
            Self::StorageDir => "storage_dir",
            Self::Filename => "filename",
            Self::StorageOpts => "storage_opts",
            Self::Persist => "persist",
            Self::Delete => "delete",
            Self::Copy => "copy",
        }
    }
}

impl Operation {
    /// The stages of this operation, in order.
    pub(crate) fn steps(&self) -> &'static [Step] {
        match self {
            Self::Store => &[
                Step::ResolveTransform,
                Step::Transform,
                Step::Postprocess,
                Step::StorageDir,
                Step::Filename,
                Step::StorageOpts,
                Step::Persist,
            ],
            Self::Delete => &[
                Step::ResolveTransform,
                Step::StorageDir,
                Step::Filename,
                Step::StorageOpts,
                Step::Delete,
            ],
            Self::Copy(_) => &[
                Step::ResolveTransform,
                Step::StorageDir,
                Step::Filename,
                Step::StorageOpts,
                Step::Copy,
            ],
        }
    }

    /// The state a copy reads from.
    pub(crate) fn copy_source(&self) -> Option<&FileState> {
        match self {
            Self::Copy(from) => Some(from.as_ref()),
            _ => None,
        }
    }

    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Store => "store",
            Self::Delete => "delete",
            Self::Copy(_) => "copy",
        }
    }
}

/// Where a version lives in storage.
#[derive(Debug, Clone)]
pub(crate) struct Location {
    pub directory: String,
    pub filename: String,
    pub opts: StorageOptions,
}

/// Runs stages against a `FileState` owned by the current unit of work.
pub(crate) struct Pipeline<D: Definition> {
    definition: Arc<D>,
    storage: Arc<dyn Storage>,
    executor: Arc<dyn TransformExecutor>,
}

impl<D: Definition> Clone for Pipeline<D> {
    fn clone(&self) -> Self {
        Self {
            definition: Arc::clone(&self.definition),
            storage: Arc::clone(&self.storage),
            executor: Arc::clone(&self.executor),
        }
    }
}

impl<D: Definition> Pipeline<D> {
    pub(crate) fn new(
        definition: Arc<D>,
        storage: Arc<dyn Storage>,
        executor: Arc<dyn TransformExecutor>,
    ) -> Self {
        Self {
            definition,
            storage,
            executor,
        }
    }

    pub(crate) fn definition(&self) -> &D {
        &self.definition
    }

    pub(crate) fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Runs every stage of `operation` for one version, stopping at the first failure.
    pub(crate) async fn run_version(
        &self,
        operation: &Operation,
        state: &mut FileState,
        version: &VersionId,
        cancel: &CancellationToken,
    ) -> Result<(), StageError> {
        for step in operation.steps() {
            self.run_step(*step, operation, state, version, cancel)
                .await?;
        }
        Ok(())
    }

    /// Runs one stage for one version.
    pub(crate) async fn run_step(
        &self,
        step: Step,
        operation: &Operation,
        state: &mut FileState,
        version: &VersionId,
        cancel: &CancellationToken,
    ) -> Result<(), StageError> {
        if cancel.is_cancelled() {
            return Err(StageError::timeout());
        }
        debug!(
            definition = self.definition.name(),
            operation = operation.as_str(),
            version = %version,
            step = step.as_str(),
            "Running stage"
        );

        match step {
            Step::ResolveTransform => {
                let transform = self.definition.transform(state, version);
                if let Some(version_state) = state.version_mut(version) {
                    if let Some(extension) = transform.as_ref().and_then(Transform::forced_extension) {
                        version_state.extension = Some(extension);
                    }
                    version_state.transform = transform;
                }
                Ok(())
            }
            Step::Transform => self.transform(state, version, cancel).await,
            Step::Postprocess => {
                let version_state = state.version(version.as_str()).cloned().unwrap_or_default();
                let processed = self
                    .definition
                    .postprocess(version_state, version, state)
                    .await
                    .map_err(StageError::postprocess)?;
                state.put_version(version, processed);
                Ok(())
            }
            Step::StorageDir => {
                let directory = self.definition.storage_dir(state, version);
                if let Some(version_state) = state.version_mut(version) {
                    version_state.storage_dir = Some(directory);
                }
                Ok(())
            }
            Step::Filename => {
                let filename = self.definition.filename(state, version);
                if let Some(version_state) = state.version_mut(version) {
                    version_state.filename = Some(filename);
                }
                Ok(())
            }
            Step::StorageOpts => {
                let opts = self.resolve_opts(state, version);
                if let Some(version_state) = state.version_mut(version) {
                    version_state.storage_opts = opts;
                }
                Ok(())
            }
            Step::Persist => self.persist(state, version).await,
            Step::Delete => self.delete(state, version).await,
            Step::Copy => {
                let from = operation.copy_source().ok_or_else(|| {
                    StageError::storage(format!("{} has no state to copy from", operation.as_str()))
                })?;
                self.copy(from, state, version).await
            }
        }
    }

    /// Base options overlaid with the version's own.
    fn resolve_opts(&self, state: &FileState, version: &VersionId) -> StorageOptions {
        merge_options(
            &state.options().storage_opts,
            &self.definition.storage_opts(state, version),
        )
    }

    /// Resolves the storage location of a version without running a pipeline.
    ///
    /// A restored state does not know forced extensions, so they are taken
    /// from the version's transform instruction.
    pub(crate) fn locate(&self, state: &FileState, version: &VersionId) -> Location {
        let forced = state
            .version(version.as_str())
            .filter(|v| v.extension.is_none())
            .and_then(|_| self.definition.transform(state, version))
            .and_then(|t| t.forced_extension());

        let resolved;
        let state = match forced {
            Some(extension) => {
                let mut copy = state.clone();
                if let Some(version_state) = copy.version_mut(version) {
                    version_state.extension = Some(extension);
                }
                resolved = copy;
                &resolved
            }
            None => state,
        };

        Location {
            directory: self.definition.storage_dir(state, version),
            filename: self.definition.filename(state, version),
            opts: self.resolve_opts(state, version),
        }
    }

    async fn transform(
        &self,
        state: &mut FileState,
        version: &VersionId,
        cancel: &CancellationToken,
    ) -> Result<(), StageError> {
        let Some(transform) = state
            .version(version.as_str())
            .and_then(|v| v.transform.clone())
        else {
            return Ok(());
        };
        let source = state
            .source_path
            .clone()
            .ok_or_else(|| StageError::transform("no source file"))?;

        let (output, forced_extension) = match transform {
            Transform::Function(f) => {
                let output = tokio::select! {
                    output = f(source) => output.map_err(StageError::transform)?,
                    _ = cancel.cancelled() => return Err(StageError::timeout()),
                };
                (output, None)
            }
            Transform::Command {
                program,
                args,
                extension,
            } => {
                let forced_extension = extension.map(|e| format!(".{}", e));
                let extension = forced_extension
                    .clone()
                    .unwrap_or_else(|| state.extension().to_string());
                let dest = temp_file_path(&state.options().temp_dir, &extension);
                tokio::fs::create_dir_all(&state.options().temp_dir)
                    .await
                    .map_err(|e| StageError::transform(format!("failed to create temp dir: {}", e)))?;

                let argv = args.resolve(&source, &dest);
                self.executor
                    .execute(&program, &argv, cancel)
                    .await
                    .map_err(|e| match e {
                        TransformError::Cancelled => StageError::timeout(),
                        other => StageError::transform(other.reason()),
                    })?;

                if !tokio::fs::try_exists(&dest).await.unwrap_or(false) {
                    let err = TransformError::MissingOutput {
                        path: dest.display().to_string(),
                    };
                    return Err(StageError::transform(err.reason()));
                }
                (TransformOutput::Single(dest), forced_extension)
            }
        };

        if output.is_empty() {
            return Err(StageError::transform("transform produced no output"));
        }
        debug!(version = %version, outputs = output.len(), "Transform finished");

        if let Some(version_state) = state.version_mut(version) {
            version_state.temp_path = Some(output);
            version_state.extension = forced_extension;
        }
        Ok(())
    }

    async fn persist(&self, state: &mut FileState, version: &VersionId) -> Result<(), StageError> {
        let version_state = state.version(version.as_str()).cloned().unwrap_or_default();
        let paths = version_state.effective_paths(state.source_path.as_ref());
        if paths.is_empty() {
            return Err(StageError::storage("no file to store"));
        }

        let directory = version_state.storage_dir.clone().unwrap_or_default();
        let filename = version_state
            .filename
            .clone()
            .ok_or_else(|| StageError::storage("filename not resolved"))?;
        let names = object_names(&filename, paths.len());

        for (path, name) in paths.iter().zip(&names) {
            let result = self
                .storage
                .save(&directory, name, path, &version_state.storage_opts)
                .await;
            metrics::record_storage("save", result.is_ok());
            result.map_err(|e| StageError::storage(e.to_string()))?;
        }

        if !state.options().keep_temp_files {
            if let Some(output) = &version_state.temp_path {
                remove_temp_files(&disposable_outputs(state, output)).await;
            }
        }
        if let Some(version_state) = state.version_mut(version) {
            version_state.stored = true;
        }
        Ok(())
    }

    async fn delete(&self, state: &mut FileState, version: &VersionId) -> Result<(), StageError> {
        let version_state = state.version(version.as_str()).cloned().unwrap_or_default();
        let directory = version_state.storage_dir.clone().unwrap_or_default();
        let filename = version_state
            .filename
            .clone()
            .ok_or_else(|| StageError::storage("filename not resolved"))?;

        for name in object_names(&filename, version_state.object_count()) {
            let result = self
                .storage
                .delete(&directory, &name, &version_state.storage_opts)
                .await;
            metrics::record_storage("delete", result.is_ok());
            result.map_err(|e| StageError::storage(e.to_string()))?;
        }

        if let Some(version_state) = state.version_mut(version) {
            version_state.stored = false;
        }
        Ok(())
    }

    async fn copy(
        &self,
        from: &FileState,
        state: &mut FileState,
        version: &VersionId,
    ) -> Result<(), StageError> {
        let count = from
            .version(version.as_str())
            .map(|v| v.object_count())
            .ok_or_else(|| {
                StageError::storage(format!("{} is not a version of the source file", version))
            })?;
        let source = self.locate(from, version);

        let version_state = state.version(version.as_str()).cloned().unwrap_or_default();
        let to_directory = version_state.storage_dir.clone().unwrap_or_default();
        let to_filename = version_state
            .filename
            .clone()
            .ok_or_else(|| StageError::storage("filename not resolved"))?;

        let from_names = object_names(&source.filename, count);
        let to_names = object_names(&to_filename, count);
        for (from_name, to_name) in from_names.iter().zip(&to_names) {
            let result = self
                .storage
                .copy(
                    &source.directory,
                    from_name,
                    &to_directory,
                    to_name,
                    &version_state.storage_opts,
                )
                .await;
            metrics::record_storage("copy", result.is_ok());
            result.map_err(|e| StageError::storage(e.to_string()))?;
        }

        if let Some(version_state) = state.version_mut(version) {
            version_state.stored = true;
            if count > 1 {
                // Keeps the object count for later delete/copy of the new copy.
                version_state.temp_path = from
                    .version(version.as_str())
                    .and_then(|v| v.temp_path.clone());
            }
        }
        Ok(())
    }
}

/// A fresh, uuid-named path under `temp_dir`.
pub(crate) fn temp_file_path(temp_dir: &Path, extension: &str) -> PathBuf {
    temp_dir.join(format!("{}{}", Uuid::new_v4(), extension))
}

/// Outputs the engine may delete after a save.
///
/// Only files under `temp_dir` qualify, and never the source itself: a
/// function transform may hand back the caller's file or one it still owns.
fn disposable_outputs(state: &FileState, output: &TransformOutput) -> Vec<PathBuf> {
    let temp_dir = &state.options().temp_dir;
    output
        .paths()
        .iter()
        .filter(|path| path.starts_with(temp_dir))
        .filter(|path| state.source_path.as_deref() != Some(path.as_path()))
        .cloned()
        .collect()
}

/// Removes transform outputs; failures are logged.
pub(crate) async fn remove_temp_files(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = tokio::fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), "Failed to remove temp file: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use crate::definition::DefaultDefinition;
    use crate::state::Stage;
    use crate::storage::MemoryStorage;
    use crate::testing::MockExecutor;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        storage: MemoryStorage,
        executor: Arc<MockExecutor>,
        state: FileState,
    }

    async fn fixture(versions: &[&str]) -> Fixture {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("coffee.jpg");
        tokio::fs::write(&source, b"beans").await.unwrap();
        let options = Options::default()
            .with_versions(versions.iter().copied())
            .with_temp_dir(temp.path().join("tmp"));
        let state = FileState::new("coffee.jpg", options).with_source_path(source);
        Fixture {
            _temp: temp,
            storage: MemoryStorage::new(),
            executor: Arc::new(MockExecutor::new()),
            state,
        }
    }

    fn pipeline<D: Definition>(definition: D, fixture: &Fixture) -> Pipeline<D> {
        Pipeline::new(
            Arc::new(definition),
            Arc::new(fixture.storage.clone()),
            fixture.executor.clone(),
        )
    }

    struct Thumb;

    impl Definition for Thumb {
        fn transform(&self, _state: &FileState, version: &VersionId) -> Option<Transform> {
            (version.as_str() == "thumb")
                .then(|| Transform::command("convert", "-thumbnail 100x100>").with_extension("png"))
        }
    }

    /// `copy` hands back the source, `upper` writes a new file, `scan` fails.
    struct Functions;

    impl Definition for Functions {
        fn transform(&self, state: &FileState, version: &VersionId) -> Option<Transform> {
            let temp_dir = state.options().temp_dir.clone();
            match version.as_str() {
                "copy" => Some(Transform::function(|path| async move {
                    Ok(TransformOutput::Single(path))
                })),
                "upper" => Some(Transform::function(move |path| {
                    let temp_dir = temp_dir.clone();
                    async move {
                        let data = tokio::fs::read(&path).await.map_err(|e| e.to_string())?;
                        tokio::fs::create_dir_all(&temp_dir)
                            .await
                            .map_err(|e| e.to_string())?;
                        let dest = temp_dir.join("upper.jpg");
                        tokio::fs::write(&dest, data.to_ascii_uppercase())
                            .await
                            .map_err(|e| e.to_string())?;
                        Ok(TransformOutput::Single(dest))
                    }
                })),
                "scan" => Some(Transform::function(|_| async move {
                    Err("unreadable scan".to_string())
                })),
                _ => None,
            }
        }
    }

    /// `pages` splits the source into two outputs; `dir` comes from the scope.
    struct Pages;

    impl Definition for Pages {
        fn transform(&self, state: &FileState, version: &VersionId) -> Option<Transform> {
            let temp_dir = state.options().temp_dir.clone();
            (version.as_str() == "pages").then(|| {
                Transform::function(move |_| {
                    let temp_dir = temp_dir.clone();
                    async move {
                        tokio::fs::create_dir_all(&temp_dir)
                            .await
                            .map_err(|e| e.to_string())?;
                        let mut pages = Vec::new();
                        for n in 1..=2 {
                            let page = temp_dir.join(format!("page{}.jpg", n));
                            tokio::fs::write(&page, format!("page {}", n))
                                .await
                                .map_err(|e| e.to_string())?;
                            pages.push(page);
                        }
                        Ok(TransformOutput::Multiple(pages))
                    }
                })
            })
        }

        fn storage_dir(&self, state: &FileState, _version: &VersionId) -> String {
            state
                .scope
                .get("dir")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        }
    }

    #[tokio::test]
    async fn test_store_without_transform() {
        let mut fixture = fixture(&["original"]).await;
        let pipeline = pipeline(DefaultDefinition, &fixture);
        let original = VersionId::original();

        pipeline
            .run_version(&Operation::Store, &mut fixture.state, &original, &CancellationToken::new())
            .await
            .unwrap();

        let version = fixture.state.version("original").unwrap();
        assert!(version.stored);
        assert!(version.temp_path.is_none());
        assert_eq!(version.filename.as_deref(), Some("coffee.jpg"));
        assert_eq!(fixture.storage.get("coffee.jpg").await.unwrap(), b"beans");
        assert_eq!(fixture.executor.invocations().await.len(), 0);
    }

    #[tokio::test]
    async fn test_store_with_command_transform() {
        let mut fixture = fixture(&["original", "thumb"]).await;
        let pipeline = pipeline(Thumb, &fixture);
        let thumb = VersionId::from("thumb");

        pipeline
            .run_version(&Operation::Store, &mut fixture.state, &thumb, &CancellationToken::new())
            .await
            .unwrap();

        let version = fixture.state.version("thumb").unwrap();
        assert_eq!(version.extension.as_deref(), Some(".png"));
        assert_eq!(version.filename.as_deref(), Some("coffee_thumb.png"));
        assert!(fixture.storage.contains("coffee_thumb.png").await);

        let invocations = fixture.executor.invocations().await;
        assert_eq!(invocations[0].program, "convert");
        assert_eq!(invocations[0].args[1], "-thumbnail");
        assert!(invocations[0].args[3].ends_with(".png"));

        // Outputs are removed once saved.
        let output = &version.temp_path.as_ref().unwrap().paths()[0];
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_transform_failure_short_circuits() {
        let mut fixture = fixture(&["original", "thumb"]).await;
        fixture.executor.fail_program("convert", "convert: corrupt image").await;
        let pipeline = pipeline(Thumb, &fixture);
        let thumb = VersionId::from("thumb");

        let err = pipeline
            .run_version(&Operation::Store, &mut fixture.state, &thumb, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.stage, Stage::Transform);
        assert_eq!(err.reason, "convert: corrupt image");
        assert!(fixture.storage.keys().await.is_empty());
        assert!(fixture.state.version("thumb").unwrap().filename.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_unit_stops() {
        let mut fixture = fixture(&["original"]).await;
        let pipeline = pipeline(DefaultDefinition, &fixture);
        let token = CancellationToken::new();
        token.cancel();

        let err = pipeline
            .run_version(&Operation::Store, &mut fixture.state, &VersionId::original(), &token)
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_locate_merges_options() {
        let mut fixture = fixture(&["original"]).await;
        fixture.state = FileState::new(
            "coffee.jpg",
            Options::default().with_storage_opt("base_uri", "http://example.com"),
        );
        let pipeline = pipeline(DefaultDefinition, &fixture);

        let location = pipeline.locate(&fixture.state, &VersionId::original());
        assert_eq!(location.directory, "");
        assert_eq!(location.filename, "coffee.jpg");
        assert_eq!(location.opts["base_uri"], "http://example.com");
    }

    #[tokio::test]
    async fn test_restored_state_uses_forced_extension() {
        let mut fixture = fixture(&["original", "thumb"]).await;
        fixture.state = FileState::new(
            "coffee.jpg",
            Options::default().with_versions(["original", "thumb"]),
        );
        fixture.storage.insert("coffee_thumb.png", b"small".to_vec()).await;
        let pipeline = pipeline(Thumb, &fixture);
        let thumb = VersionId::from("thumb");

        let location = pipeline.locate(&fixture.state, &thumb);
        assert_eq!(location.filename, "coffee_thumb.png");

        pipeline
            .run_version(&Operation::Delete, &mut fixture.state, &thumb, &CancellationToken::new())
            .await
            .unwrap();
        assert!(!fixture.storage.contains("coffee_thumb.png").await);
        assert_eq!(fixture.executor.invocation_count().await, 0);
    }

    #[tokio::test]
    async fn test_identity_function_keeps_source() {
        let mut fixture = fixture(&["original", "copy"]).await;
        let pipeline = pipeline(Functions, &fixture);
        let source = fixture.state.source_path.clone().unwrap();

        pipeline
            .run_version(
                &Operation::Store,
                &mut fixture.state,
                &VersionId::from("copy"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(fixture.state.version("copy").unwrap().stored);
        assert_eq!(fixture.storage.get("coffee_copy.jpg").await.unwrap(), b"beans");
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_function_output_is_stored() {
        let mut fixture = fixture(&["original", "upper"]).await;
        let pipeline = pipeline(Functions, &fixture);

        pipeline
            .run_version(
                &Operation::Store,
                &mut fixture.state,
                &VersionId::from("upper"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(fixture.storage.get("coffee_upper.jpg").await.unwrap(), b"BEANS");
        // Written under temp_dir, so removed once saved.
        let output = &fixture.state.version("upper").unwrap().temp_path.as_ref().unwrap().paths()[0];
        assert!(!output.exists());
        assert_eq!(fixture.executor.invocation_count().await, 0);
    }

    #[tokio::test]
    async fn test_function_error_is_recorded_as_transform() {
        let mut fixture = fixture(&["original", "scan"]).await;
        let pipeline = pipeline(Functions, &fixture);

        let err = pipeline
            .run_version(
                &Operation::Store,
                &mut fixture.state,
                &VersionId::from("scan"),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.stage, Stage::Transform);
        assert_eq!(err.reason, "unreadable scan");
        assert!(fixture.storage.keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_multiple_outputs_store_delete_and_copy() {
        let mut fixture = fixture(&["original", "pages"]).await;
        let pipeline = pipeline(Pages, &fixture);
        let pages = VersionId::from("pages");
        let token = CancellationToken::new();

        pipeline
            .run_version(&Operation::Store, &mut fixture.state, &pages, &token)
            .await
            .unwrap();
        assert_eq!(fixture.state.version("pages").unwrap().object_count(), 2);
        assert_eq!(fixture.storage.get("coffee_pages.jpg").await.unwrap(), b"page 1");
        assert_eq!(fixture.storage.get("coffee_pages-2.jpg").await.unwrap(), b"page 2");

        let operation = Operation::Copy(Arc::new(fixture.state.clone()));
        let mut copied = FileState::new("coffee.jpg", fixture.state.options().clone())
            .with_scope(serde_json::json!({"dir": "archive"}));
        pipeline
            .run_version(&operation, &mut copied, &pages, &token)
            .await
            .unwrap();
        assert_eq!(
            fixture.storage.get("archive/coffee_pages.jpg").await.unwrap(),
            b"page 1"
        );
        assert_eq!(
            fixture.storage.get("archive/coffee_pages-2.jpg").await.unwrap(),
            b"page 2"
        );

        pipeline
            .run_version(&Operation::Delete, &mut fixture.state, &pages, &token)
            .await
            .unwrap();
        assert!(!fixture.storage.contains("coffee_pages.jpg").await);
        assert!(!fixture.storage.contains("coffee_pages-2.jpg").await);
        assert!(fixture.storage.contains("archive/coffee_pages-2.jpg").await);
    }

    #[tokio::test]
    async fn test_copy_step_requires_copy_source() {
        let mut fixture = fixture(&["original"]).await;
        let pipeline = pipeline(DefaultDefinition, &fixture);

        let err = pipeline
            .run_step(
                Step::Copy,
                &Operation::Store,
                &mut fixture.state,
                &VersionId::original(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.stage, Stage::Storage);
        assert!(err.reason.contains("no state to copy from"));
        assert!(fixture.storage.keys().await.is_empty());
    }
}
