//! Mock transform executor for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::transform::{TransformError, TransformExecutor};

/// A recorded invocation for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedInvocation {
    /// The program that was requested.
    pub program: String,
    /// The fully resolved argument list.
    pub args: Vec<String>,
    /// Whether the invocation succeeded.
    pub success: bool,
}

/// Mock implementation of the TransformExecutor trait.
///
/// Provides controllable behavior for testing:
/// - Track invocations for assertions
/// - "Transform" by copying the first argument to the last one
/// - Simulate failures per program
/// - Simulate slow programs (honouring cancellation)
///
/// # Example
///
/// ```rust,ignore
/// use quiver_core::testing::MockExecutor;
///
/// let executor = MockExecutor::new().with_delay("convert", Duration::from_secs(5));
/// executor.fail_program("ffmpeg", "ffmpeg: invalid data").await;
///
/// // ... run an orchestrator with it ...
///
/// let invocations = executor.invocations().await;
/// assert_eq!(invocations[0].program, "convert");
/// ```
#[derive(Debug, Default)]
pub struct MockExecutor {
    /// Recorded invocations.
    invocations: Arc<RwLock<Vec<RecordedInvocation>>>,
    /// Programs that fail, with the output they report.
    failing: Arc<RwLock<HashMap<String, String>>>,
    /// Programs that are missing.
    missing: Arc<RwLock<HashSet<String>>>,
    /// If set, the next invocation will fail with this error.
    next_error: Arc<RwLock<Option<TransformError>>>,
    /// Simulated run time per program.
    delays: HashMap<String, Duration>,
}

impl MockExecutor {
    /// Create a new mock executor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every invocation of `program` take `delay`.
    pub fn with_delay(mut self, program: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(program.into(), delay);
        self
    }

    /// Get all recorded invocations.
    pub async fn invocations(&self) -> Vec<RecordedInvocation> {
        self.invocations.read().await.clone()
    }

    /// Get the number of invocations performed.
    pub async fn invocation_count(&self) -> usize {
        self.invocations.read().await.len()
    }

    /// Makes `program` exit non-zero with `output`.
    pub async fn fail_program(&self, program: impl Into<String>, output: impl Into<String>) {
        self.failing
            .write()
            .await
            .insert(program.into(), output.into());
    }

    /// Makes `program` behave as if it is not installed.
    pub async fn remove_program(&self, program: impl Into<String>) {
        self.missing.write().await.insert(program.into());
    }

    /// Configure the next invocation to fail with the given error.
    pub async fn set_next_error(&self, error: TransformError) {
        *self.next_error.write().await = Some(error);
    }

    async fn run(&self, program: &str, args: &[String], cancel: &CancellationToken) -> Result<(), TransformError> {
        if let Some(delay) = self.delays.get(program) {
            tokio::select! {
                _ = tokio::time::sleep(*delay) => {}
                _ = cancel.cancelled() => return Err(TransformError::Cancelled),
            }
        }

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }
        if self.missing.read().await.contains(program) {
            return Err(TransformError::ProgramNotFound {
                program: program.to_string(),
            });
        }
        if let Some(output) = self.failing.read().await.get(program) {
            return Err(TransformError::failed(Some(1), output.clone()));
        }

        if let (Some(source), Some(dest)) = (args.first(), args.last()) {
            if args.len() >= 2 && Path::new(source).is_file() {
                tokio::fs::copy(source, dest).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TransformExecutor for MockExecutor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn execute(
        &self,
        program: &str,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<(), TransformError> {
        let result = self.run(program, args, cancel).await;
        self.invocations.write().await.push(RecordedInvocation {
            program: program.to_string(),
            args: args.to_vec(),
            success: result.is_ok(),
        });
        result
    }
}
