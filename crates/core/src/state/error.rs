//! Per-version failure records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The stage a version failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Pre-processing rejected the whole file.
    Validation,
    /// The version's conversion failed.
    Transform,
    /// The post-transform step failed.
    Postprocess,
    /// The version unit did not finish (timeout, panic).
    Processing,
    /// save/delete/retrieve/copy failed.
    Storage,
}

impl Stage {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Transform => "transform",
            Self::Postprocess => "postprocess",
            Self::Processing => "processing",
            Self::Storage => "storage",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `(stage, reason)` pair recorded against a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageError {
    pub stage: Stage,
    pub reason: String,
}

impl StageError {
    pub fn new(stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            stage,
            reason: reason.into(),
        }
    }

    /// The error recorded for a unit cancelled at the deadline.
    pub fn timeout() -> Self {
        Self::new(Stage::Processing, "timeout")
    }

    pub fn transform(reason: impl Into<String>) -> Self {
        Self::new(Stage::Transform, reason)
    }

    pub fn postprocess(reason: impl Into<String>) -> Self {
        Self::new(Stage::Postprocess, reason)
    }

    pub fn storage(reason: impl Into<String>) -> Self {
        Self::new(Stage::Storage, reason)
    }

    /// Whether this is the deadline error produced by the orchestrator.
    pub fn is_timeout(&self) -> bool {
        self.stage == Stage::Processing && self.reason == "timeout"
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage, self.reason)
    }
}
