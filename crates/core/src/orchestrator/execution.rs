//! Sequential and concurrent execution of version pipelines.

use std::collections::BTreeMap;

use tokio::task::JoinError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::definition::Definition;
use crate::metrics;
use crate::state::{FileState, Stage, StageError, VersionId, VersionState};

use super::pipeline::{Operation, Pipeline};
use super::types::OperationError;

/// Runs `operation` for `versions` in the mode selected by the state's options.
///
/// Per-version failures end up in `FileState::errors`; only a sequential
/// timeout or an aborted unit fail the call itself.
pub(crate) async fn run_versions<D: Definition>(
    pipeline: &Pipeline<D>,
    operation: Operation,
    state: FileState,
    versions: &[VersionId],
) -> Result<FileState, OperationError> {
    if versions.is_empty() {
        return Ok(state);
    }
    if state.options().concurrent {
        Ok(run_concurrent(pipeline, operation, state, versions).await)
    } else {
        run_sequential(pipeline, operation, state, versions).await
    }
}

/// One spawned unit per version, all bounded by a shared deadline.
async fn run_concurrent<D: Definition>(
    pipeline: &Pipeline<D>,
    operation: Operation,
    mut state: FileState,
    versions: &[VersionId],
) -> FileState {
    let deadline = Instant::now() + state.options().timeout();
    let parent = CancellationToken::new();

    let units: Vec<_> = versions
        .iter()
        .map(|version| {
            let pipeline = pipeline.clone();
            let operation = operation.clone();
            let version = version.clone();
            let token = parent.child_token();
            let unit_token = token.clone();
            let mut unit_state = state.clone();
            let id = version.clone();

            let handle = tokio::spawn(async move {
                pipeline
                    .run_version(&operation, &mut unit_state, &id, &unit_token)
                    .await
                    .map(|()| unit_state.take_version(&id))
            });
            (version, token, handle)
        })
        .collect();

    for (version, token, mut handle) in units {
        let outcome = match tokio::time::timeout_at(deadline, &mut handle).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => Err(join_failure(e)),
            Err(_) => {
                // Cooperative first, then forced: aborting drops the unit's
                // child processes, which are killed on drop.
                token.cancel();
                handle.abort();
                metrics::VERSION_TIMEOUTS.inc();
                warn!(
                    version = %version,
                    timeout_ms = state.options().timeout_ms,
                    "Version unit timed out, cancelled"
                );
                Err(StageError::timeout())
            }
        };
        aggregate(&mut state, &version, outcome);
    }

    state
}

/// All versions advance one stage at a time inside a single unit.
async fn run_sequential<D: Definition>(
    pipeline: &Pipeline<D>,
    operation: Operation,
    state: FileState,
    versions: &[VersionId],
) -> Result<FileState, OperationError> {
    let timeout_ms = state.options().timeout_ms;
    let deadline = Instant::now() + state.options().timeout();
    let token = CancellationToken::new();

    // Failed versions keep their incoming state.
    let incoming: BTreeMap<VersionId, VersionState> = versions
        .iter()
        .map(|v| (v.clone(), state.version(v.as_str()).cloned().unwrap_or_default()))
        .collect();

    let unit_pipeline = pipeline.clone();
    let unit_token = token.clone();
    let ids = versions.to_vec();
    let mut handle = tokio::spawn(async move {
        let mut state = state;
        let mut failed: BTreeMap<VersionId, StageError> = BTreeMap::new();
        for step in operation.steps() {
            for id in &ids {
                if failed.contains_key(id) {
                    continue;
                }
                if let Err(e) = unit_pipeline
                    .run_step(*step, &operation, &mut state, id, &unit_token)
                    .await
                {
                    failed.insert(id.clone(), e);
                }
            }
        }
        (state, failed)
    });

    match tokio::time::timeout_at(deadline, &mut handle).await {
        Ok(Ok((mut state, mut failed))) => {
            for version in versions {
                let outcome = match failed.remove(version) {
                    Some(e) => Err(e),
                    None => Ok(state.take_version(version)),
                };
                if outcome.is_err() {
                    if let Some(previous) = incoming.get(version) {
                        state.put_version(version, previous.clone());
                    }
                }
                aggregate(&mut state, version, outcome);
            }
            Ok(state)
        }
        Ok(Err(e)) => Err(OperationError::Aborted(e.to_string())),
        Err(_) => {
            token.cancel();
            handle.abort();
            metrics::VERSION_TIMEOUTS.inc();
            warn!(timeout_ms, "Sequential operation timed out, cancelled");
            Err(OperationError::Timeout { timeout_ms })
        }
    }
}

/// Folds one unit's outcome into the aggregate state.
fn aggregate(
    state: &mut FileState,
    version: &VersionId,
    outcome: Result<VersionState, StageError>,
) {
    match outcome {
        Ok(version_state) => {
            debug!(version = %version, "Version finished");
            metrics::VERSION_PIPELINES
                .with_label_values(&["success"])
                .inc();
            state.put_version(version, version_state);
        }
        Err(e) => {
            warn!(version = %version, stage = %e.stage, reason = %e.reason, "Version failed");
            metrics::VERSION_PIPELINES.with_label_values(&["failed"]).inc();
            metrics::STAGE_FAILURES
                .with_label_values(&[e.stage.as_str()])
                .inc();
            state.record_error(version, e);
        }
    }
}

fn join_failure(e: JoinError) -> StageError {
    if e.is_panic() {
        StageError::new(Stage::Processing, "panic")
    } else {
        StageError::new(Stage::Processing, "cancelled")
    }
}
