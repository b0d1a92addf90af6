//! Error types for the transform module.

use thiserror::Error;

/// Errors that can occur while running a transform.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The transform program could not be found.
    #[error("Transform program not found: {program}")]
    ProgramNotFound { program: String },

    /// The program exited with a non-zero status.
    #[error("Transform exited with code {code:?}: {output}")]
    Failed { code: Option<i32>, output: String },

    /// The program reported success but left no output behind.
    #[error("Transform produced no output at {path}")]
    MissingOutput { path: String },

    /// I/O error while preparing or running the transform.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The unit was cancelled while the transform was running.
    #[error("Transform cancelled")]
    Cancelled,
}

impl TransformError {
    pub fn failed(code: Option<i32>, output: impl Into<String>) -> Self {
        Self::Failed {
            code,
            output: output.into(),
        }
    }

    /// The reason recorded against the version.
    ///
    /// For a failed command this is the captured output alone.
    pub fn reason(&self) -> String {
        match self {
            Self::Failed { output, .. } => output.clone(),
            other => other.to_string(),
        }
    }
}
