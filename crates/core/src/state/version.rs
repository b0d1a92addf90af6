//! Version identifiers and per-version working state.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::path::PathBuf;

use crate::storage::StorageOptions;
use crate::transform::{Transform, TransformOutput};

/// Free-form annotations set by host overrides and persisted opaquely.
pub type Assigns = serde_json::Map<String, serde_json::Value>;

/// Identifier of a configured version (e.g. `original`, `thumb`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(String);

impl VersionId {
    /// Name of the canonical, untransformed version.
    pub const ORIGINAL: &'static str = "original";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The canonical `original` version.
    pub fn original() -> Self {
        Self::new(Self::ORIGINAL)
    }

    pub fn is_original(&self) -> bool {
        self.0 == Self::ORIGINAL
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for VersionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VersionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for VersionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Working record for one version during a pipeline run.
///
/// Every field except `assigns` is resolved by the pipeline itself; a
/// successful run replaces the incoming value in the owning `FileState`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VersionState {
    /// Resolved transform instruction. `None` means the source is stored as is.
    #[serde(skip)]
    pub transform: Option<Transform>,
    /// Transform output(s); absent when no transform ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_path: Option<TransformOutput>,
    /// Extension forced by a command transform (with leading dot).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub storage_opts: StorageOptions,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub assigns: Assigns,
    /// Set once the storage backend accepted every output of this version.
    pub stored: bool,
}

impl VersionState {
    /// Creates a state carrying only annotations, as produced by restore.
    pub fn with_assigns(assigns: Assigns) -> Self {
        Self {
            assigns,
            ..Default::default()
        }
    }

    /// Paths of the files this version stores, falling back to `source`.
    pub fn effective_paths(&self, source: Option<&PathBuf>) -> Vec<PathBuf> {
        match &self.temp_path {
            Some(output) => output.paths().to_vec(),
            None => source.cloned().into_iter().collect(),
        }
    }

    /// Number of storage objects this version occupies.
    pub fn object_count(&self) -> usize {
        self.temp_path.as_ref().map(|o| o.len().max(1)).unwrap_or(1)
    }

    /// Sets an annotation, returning `self` for chaining inside postprocess hooks.
    pub fn assign(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.assigns.insert(key.into(), value.into());
        self
    }
}
