//! Configuration for the command executor.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Configuration for running external transform programs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Extra environment variables for every invocation.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Working directory of the child process (inherits when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,

    /// Program names mapped to the binary actually executed
    /// (e.g. `convert = "/usr/local/bin/magick"`).
    #[serde(default)]
    pub programs: BTreeMap<String, PathBuf>,
}

impl ExecutorConfig {
    /// Adds an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Sets the working directory.
    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }

    /// Maps a program name to a binary path.
    pub fn with_program(mut self, name: impl Into<String>, path: PathBuf) -> Self {
        self.programs.insert(name.into(), path);
        self
    }

    /// The binary to execute for `program`.
    pub fn resolve_program(&self, program: &str) -> PathBuf {
        self.programs
            .get(program)
            .cloned()
            .unwrap_or_else(|| PathBuf::from(program))
    }
}
