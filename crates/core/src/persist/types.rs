//! Types for persisted file state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::state::{Assigns, VersionId};

/// Errors that can occur while saving or restoring state.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Filename-only output would silently drop annotations.
    #[error("cannot save as filename: state carries assigns")]
    AssignsPresent,

    /// The input is not a usable persisted form.
    #[error("invalid persisted state: {0}")]
    InvalidInput(String),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Which annotation keys a structured save keeps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AssignKeys {
    #[default]
    All,
    Only(Vec<String>),
}

impl AssignKeys {
    pub fn only<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(keys.into_iter().map(Into::into).collect())
    }

    pub(crate) fn keeps(&self, key: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(keys) => keys.iter().any(|k| k == key),
        }
    }
}

/// Output form of `save`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveFormat {
    /// The bare filename. Fails when annotations exist unless `allow_assigns`.
    Filename { allow_assigns: bool },
    /// A `PersistedFile`.
    Map { keys: AssignKeys },
    /// The JSON text of a `PersistedFile`.
    Json { keys: AssignKeys },
}

impl Default for SaveFormat {
    fn default() -> Self {
        Self::Map {
            keys: AssignKeys::All,
        }
    }
}

/// The structured persisted form:
/// `{"filename": ..., "assigns": {...}?, "version_assigns": {id: {...}}?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedFile {
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigns: Option<Assigns>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_assigns: Option<BTreeMap<VersionId, Assigns>>,
}

impl PersistedFile {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            assigns: None,
            version_assigns: None,
        }
    }
}

/// Result of `save`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Persisted {
    Filename(String),
    Map(PersistedFile),
    Json(String),
}

/// Anything `restore` accepts.
#[derive(Debug, Clone)]
pub enum RestoreInput {
    /// A bare filename, or JSON text when it starts with `{`.
    Text(String),
    /// A decoded JSON object (e.g. read from a database column).
    Value(serde_json::Value),
    File(PersistedFile),
}

impl From<&str> for RestoreInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for RestoreInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<serde_json::Value> for RestoreInput {
    fn from(value: serde_json::Value) -> Self {
        Self::Value(value)
    }
}

impl From<PersistedFile> for RestoreInput {
    fn from(file: PersistedFile) -> Self {
        Self::File(file)
    }
}

impl From<Persisted> for RestoreInput {
    fn from(persisted: Persisted) -> Self {
        match persisted {
            Persisted::Filename(text) | Persisted::Json(text) => Self::Text(text),
            Persisted::Map(file) => Self::File(file),
        }
    }
}
