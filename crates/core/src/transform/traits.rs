//! Trait definitions for the transform module.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::error::TransformError;

/// Runs an external transform program with a fully resolved argument list.
#[async_trait]
pub trait TransformExecutor: Send + Sync {
    /// Returns the name of this executor implementation.
    fn name(&self) -> &str;

    /// Runs `program args...` to completion.
    ///
    /// Exit code 0 is success; anything else is `TransformError::Failed`
    /// carrying the combined output. When `cancel` fires the process must be
    /// terminated and `TransformError::Cancelled` returned.
    async fn execute(
        &self,
        program: &str,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<(), TransformError>;
}
