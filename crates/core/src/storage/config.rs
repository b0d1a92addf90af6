//! Configuration for storage backends.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Available storage backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Local,
    Memory,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Memory => "memory",
        }
    }
}

/// Per-backend settings. The backend itself is picked by `Options::storage`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub local: LocalStorageConfig,
}

/// Configuration for the filesystem backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalStorageConfig {
    /// Root directory objects are stored under.
    #[serde(default = "default_base_path")]
    pub base_path: PathBuf,

    /// Prefix for built URIs; a `base_uri` storage option takes precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_uri: Option<String>,
}

fn default_base_path() -> PathBuf {
    PathBuf::from("uploads")
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
            base_uri: None,
        }
    }
}

impl LocalStorageConfig {
    /// Sets the base path.
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = path.into();
        self
    }

    /// Sets the base URI.
    pub fn with_base_uri(mut self, uri: impl Into<String>) -> Self {
        self.base_uri = Some(uri.into());
        self
    }
}
