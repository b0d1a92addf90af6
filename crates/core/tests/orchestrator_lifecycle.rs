//! Orchestrator lifecycle integration tests.
//!
//! These tests run real child processes through `CommandExecutor` and store
//! into a `LocalStorage` rooted in a temp dir:
//! store -> url -> retrieve -> regenerate -> copy -> delete

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tempfile::TempDir;

use quiver_core::{
    restore, save, Args, CommandExecutor, Definition, FileState, LocalStorage, OperationError,
    Options, Orchestrator, SaveFormat, Source, Stage, StageError, Transform, VersionId,
};

/// `thumb` copies the source, `slow` sleeps first, `broken` exits non-zero.
/// Everything lands under the scope's `id`.
struct Gallery;

impl Definition for Gallery {
    fn name(&self) -> &str {
        "gallery"
    }

    fn transform(&self, _state: &FileState, version: &VersionId) -> Option<Transform> {
        match version.as_str() {
            "thumb" => Some(Transform::command("cp", "")),
            "preview" => Some(Transform::command("cp", "").with_extension("png")),
            "slow" => Some(Transform::command(
                "sh",
                Args::placement(|source, dest| {
                    vec![
                        "-c".to_string(),
                        "sleep 5; cp \"$0\" \"$1\"".to_string(),
                        source.display().to_string(),
                        dest.display().to_string(),
                    ]
                }),
            )),
            "broken" => Some(Transform::command(
                "sh",
                Args::placement(|_, _| {
                    vec!["-c".to_string(), "echo 'bad input' >&2; exit 3".to_string()]
                }),
            )),
            _ => None,
        }
    }

    fn storage_dir(&self, state: &FileState, _version: &VersionId) -> String {
        match state.scope.get("id") {
            Some(id) => id.to_string(),
            None => String::new(),
        }
    }
}

/// Test helper owning the storage root and the uploaded file.
struct TestHarness {
    temp_dir: TempDir,
    source: PathBuf,
    orchestrator: Orchestrator<Gallery>,
}

impl TestHarness {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let source = temp_dir.path().join("upload/coffee.jpg");
        tokio::fs::create_dir_all(source.parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(&source, b"espresso").await.unwrap();

        let storage = Arc::new(LocalStorage::at(temp_dir.path().join("store")));
        let executor = Arc::new(CommandExecutor::with_defaults());
        let orchestrator = Orchestrator::new(Gallery, storage, executor);

        Self {
            temp_dir,
            source,
            orchestrator,
        }
    }

    fn options(&self, versions: &[&str]) -> Options {
        Options::default()
            .with_versions(versions.iter().copied())
            .with_temp_dir(self.temp_dir.path().join("tmp"))
    }

    fn stored(&self, key: &str) -> PathBuf {
        self.temp_dir.path().join("store").join(key)
    }

    async fn store(&self, versions: &[&str]) -> Result<FileState, OperationError> {
        self.orchestrator
            .store(
                Source::path(&self.source),
                json!({"id": 42}),
                self.options(versions),
            )
            .await
    }
}

#[tokio::test]
async fn test_store_produces_every_version() {
    let harness = TestHarness::new().await;

    let state = harness.store(&["original", "thumb"]).await.unwrap();

    assert!(state.errors().is_empty());
    assert_eq!(
        state.version_ids(),
        vec![VersionId::original(), VersionId::from("thumb")]
    );

    let thumb = state.version("thumb").unwrap();
    assert!(thumb.stored);
    assert_eq!(thumb.storage_dir.as_deref(), Some("42"));
    assert_eq!(thumb.filename.as_deref(), Some("coffee_thumb.jpg"));

    let original = tokio::fs::read(harness.stored("42/coffee.jpg")).await.unwrap();
    let copy = tokio::fs::read(harness.stored("42/coffee_thumb.jpg")).await.unwrap();
    assert_eq!(original, b"espresso");
    assert_eq!(copy, b"espresso");
}

#[tokio::test]
async fn test_failed_version_does_not_affect_siblings() {
    let harness = TestHarness::new().await;

    let err = harness
        .store(&["original", "thumb", "broken"])
        .await
        .unwrap_err();
    let state = err.into_state().expect("state of a partial failure");

    assert_eq!(state.errors().len(), 1);
    let errors = &state.errors()["broken"];
    assert_eq!(errors[0].stage, Stage::Transform);
    assert!(errors[0].reason.contains("bad input"));
    assert!(!state.version("broken").unwrap().stored);

    let thumb = state.version("thumb").unwrap();
    assert!(thumb.stored);
    assert_eq!(thumb.storage_dir.as_deref(), Some("42"));
    assert!(harness.stored("42/coffee_thumb.jpg").exists());
    assert!(!harness.stored("42/coffee_broken.jpg").exists());
}

#[tokio::test]
async fn test_slow_version_times_out_alone() {
    let harness = TestHarness::new().await;
    let options = harness
        .options(&["original", "thumb", "slow"])
        .with_timeout_ms(500);

    let start = Instant::now();
    let err = harness
        .orchestrator
        .store(Source::path(&harness.source), json!({"id": 42}), options)
        .await
        .unwrap_err();

    // The sleeping child is killed at the deadline.
    assert!(start.elapsed() < Duration::from_secs(4));

    let state = err.into_state().unwrap();
    assert_eq!(state.errors().len(), 1);
    assert_eq!(state.errors()["slow"], vec![StageError::timeout()]);
    assert!(state.version("thumb").unwrap().stored);
    assert!(state.version("original").unwrap().stored);
    assert!(!harness.stored("42/coffee_slow.jpg").exists());
}

#[tokio::test]
async fn test_sequential_timeout_fails_whole_operation() {
    let harness = TestHarness::new().await;
    let options = harness
        .options(&["original", "slow"])
        .with_concurrent(false)
        .with_timeout_ms(300);

    let err = harness
        .orchestrator
        .store(Source::path(&harness.source), json!({"id": 42}), options)
        .await
        .unwrap_err();

    assert!(matches!(err, OperationError::Timeout { timeout_ms: 300 }));
}

#[tokio::test]
async fn test_sequential_store() {
    let harness = TestHarness::new().await;
    let options = harness
        .options(&["original", "thumb"])
        .with_concurrent(false);

    let state = harness
        .orchestrator
        .store(Source::path(&harness.source), json!({"id": 42}), options)
        .await
        .unwrap();

    assert!(state.is_ok());
    assert!(harness.stored("42/coffee.jpg").exists());
    assert!(harness.stored("42/coffee_thumb.jpg").exists());
}

#[tokio::test]
async fn test_url_with_base_uri() {
    let harness = TestHarness::new().await;
    let options = harness
        .options(&["original", "thumb"])
        .with_storage_opt("base_uri", "http://example.com");
    let state = restore("coffee.jpg", options)
        .unwrap()
        .with_scope(json!({"id": 42}));

    let url = harness.orchestrator.url(&state, "original").await.unwrap();
    assert_eq!(url, "http://example.com/42/coffee.jpg");

    let urls = harness.orchestrator.urls(&state).await.unwrap();
    assert_eq!(urls["thumb"], "http://example.com/42/coffee_thumb.jpg");

    assert!(matches!(
        harness.orchestrator.url(&state, "large").await,
        Err(OperationError::UnknownVersion(_))
    ));
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let harness = TestHarness::new().await;
    let stored = harness.store(&["original", "thumb"]).await.unwrap();
    assert!(harness.stored("42/coffee_thumb.jpg").exists());

    let first = harness.orchestrator.delete(stored.clone()).await;
    let second = harness.orchestrator.delete(stored).await;

    assert!(first.is_ok());
    assert!(second.is_ok());
    assert!(!harness.stored("42/coffee.jpg").exists());
    assert!(!harness.stored("42/coffee_thumb.jpg").exists());
}

#[tokio::test]
async fn test_restored_state_round_trip() {
    let harness = TestHarness::new().await;
    let stored = harness.store(&["original", "preview"]).await.unwrap();
    assert!(harness.stored("42/coffee_preview.png").exists());

    let persisted = save(&stored, &SaveFormat::default()).unwrap();
    let restored = restore(persisted, harness.options(&["original", "preview"]))
        .unwrap()
        .with_scope(json!({"id": 42}));

    // Retrieve the original to a chosen path.
    let destination = harness.temp_dir.path().join("download/coffee.jpg");
    let path = harness
        .orchestrator
        .retrieve(&restored, "original", Some(destination.clone()))
        .await
        .unwrap();
    assert_eq!(path, destination);
    assert_eq!(tokio::fs::read(&path).await.unwrap(), b"espresso");

    // Regenerate the preview from the stored original.
    tokio::fs::remove_file(harness.stored("42/coffee_preview.png"))
        .await
        .unwrap();
    let regenerated = harness
        .orchestrator
        .regenerate(restored.clone(), &[VersionId::from("preview")])
        .await
        .unwrap();
    assert!(regenerated.version("preview").unwrap().stored);
    assert!(!regenerated.version("original").unwrap().stored);
    assert!(harness.stored("42/coffee_preview.png").exists());

    // Delete addresses the forced extension without re-running the transform.
    harness.orchestrator.delete(restored).await.unwrap();
    assert!(!harness.stored("42/coffee_preview.png").exists());
    assert!(!harness.stored("42/coffee.jpg").exists());
}

#[tokio::test]
async fn test_regenerate_rejects_original() {
    let harness = TestHarness::new().await;
    let state = restore("coffee.jpg", harness.options(&["original", "thumb"])).unwrap();

    let err = harness
        .orchestrator
        .regenerate(state.clone(), &[VersionId::original()])
        .await
        .unwrap_err();
    assert!(matches!(err, OperationError::NotRegeneratable(_)));

    let err = harness
        .orchestrator
        .regenerate(state, &[VersionId::from("large")])
        .await
        .unwrap_err();
    assert!(matches!(err, OperationError::UnknownVersion(_)));
}

#[tokio::test]
async fn test_copy_to_another_scope() {
    let harness = TestHarness::new().await;
    let stored = harness.store(&["original", "thumb"]).await.unwrap();

    let to = restore("coffee.jpg", harness.options(&["original", "thumb"]))
        .unwrap()
        .with_scope(json!({"id": 43}));
    let copied = harness.orchestrator.copy(&stored, to).await.unwrap();

    assert!(copied.is_ok());
    assert!(harness.stored("43/coffee.jpg").exists());
    assert!(harness.stored("43/coffee_thumb.jpg").exists());
    // The source objects stay.
    assert!(harness.stored("42/coffee.jpg").exists());
}

#[tokio::test]
async fn test_validation_rejects_missing_source() {
    let harness = TestHarness::new().await;

    let err = harness
        .orchestrator
        .store(
            Source::path(harness.temp_dir.path().join("missing.jpg")),
            json!({}),
            harness.options(&["original"]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OperationError::Validation(_)));
}

/// Needs ImageMagick's `convert` and `identify` on PATH.
#[tokio::test]
#[ignore]
async fn test_imagemagick_thumbnail() {
    struct Thumbnails;

    impl Definition for Thumbnails {
        fn transform(&self, _state: &FileState, version: &VersionId) -> Option<Transform> {
            (version.as_str() == "thumb")
                .then(|| Transform::command("convert", "-thumbnail 100x100>"))
        }
    }

    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("coffee.jpg");
    let status = tokio::process::Command::new("convert")
        .args(["-size", "3000x2000", "xc:brown"])
        .arg(&source)
        .status()
        .await
        .unwrap();
    assert!(status.success());

    let orchestrator = Orchestrator::new(
        Thumbnails,
        Arc::new(LocalStorage::at(temp_dir.path().join("store"))),
        Arc::new(CommandExecutor::with_defaults()),
    );
    let options = Options::default()
        .with_versions(["original", "thumb"])
        .with_temp_dir(temp_dir.path().join("tmp"));
    orchestrator
        .store(Source::path(&source), json!({}), options)
        .await
        .unwrap();

    let output = tokio::process::Command::new("identify")
        .args(["-format", "%wx%h"])
        .arg(temp_dir.path().join("store/coffee_thumb.jpg"))
        .output()
        .await
        .unwrap();
    assert_eq!(String::from_utf8_lossy(&output.stdout), "100x67");

    let original = tokio::fs::read(temp_dir.path().join("store/coffee.jpg"))
        .await
        .unwrap();
    assert_eq!(original, tokio::fs::read(&source).await.unwrap());
}
