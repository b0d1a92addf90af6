//! The aggregate state of one operation.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::Options;
use crate::storage::split_extension;

use super::error::StageError;
use super::version::{Assigns, VersionId, VersionState};

/// Whole-operation record: source file info, one `VersionState` per
/// configured version, accumulated errors and shared annotations.
///
/// The filename-derived fields and the version key set are fixed at
/// construction. Versions are kept in version-id order, which is also the
/// order sequential mode processes them in.
#[derive(Debug, Clone, Serialize)]
pub struct FileState {
    filename: String,
    root_name: String,
    extension: String,
    lowercase_extension: String,
    /// Path of the original file; absent for metadata-only operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_path: Option<PathBuf>,
    versions: BTreeMap<VersionId, VersionState>,
    /// Caller-supplied context, read by every stage function.
    pub scope: serde_json::Value,
    #[serde(skip)]
    options: Options,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    errors: BTreeMap<VersionId, Vec<StageError>>,
    /// Operation-wide annotations set by host overrides.
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub assigns: Assigns,
}

impl FileState {
    /// Creates a state with an empty `VersionState` for each configured version.
    pub fn new(filename: impl Into<String>, options: Options) -> Self {
        let filename = filename.into();
        let (root_name, extension) = split_extension(&filename);
        let (root_name, extension) = (root_name.to_string(), extension.to_string());
        let lowercase_extension = extension.to_lowercase();

        let versions = options
            .versions
            .iter()
            .map(|v| (v.clone(), VersionState::default()))
            .collect();

        Self {
            filename,
            root_name,
            extension,
            lowercase_extension,
            source_path: None,
            versions,
            scope: serde_json::Value::Null,
            options,
            errors: BTreeMap::new(),
            assigns: Assigns::new(),
        }
    }

    /// Sets the source path.
    pub fn with_source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    /// Sets the caller scope.
    pub fn with_scope(mut self, scope: serde_json::Value) -> Self {
        self.scope = scope;
        self
    }

    /// Sets operation-wide annotations.
    pub fn with_assigns(mut self, assigns: Assigns) -> Self {
        self.assigns = assigns;
        self
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Filename without its final extension (`coffee` for `coffee.jpg`).
    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    /// Final extension including the dot, or empty.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn lowercase_extension(&self) -> &str {
        &self.lowercase_extension
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn versions(&self) -> &BTreeMap<VersionId, VersionState> {
        &self.versions
    }

    pub fn version(&self, id: &str) -> Option<&VersionState> {
        self.versions.get(id)
    }

    pub fn version_ids(&self) -> Vec<VersionId> {
        self.versions.keys().cloned().collect()
    }

    pub fn has_version(&self, id: &str) -> bool {
        self.versions.contains_key(id)
    }

    pub fn errors(&self) -> &BTreeMap<VersionId, Vec<StageError>> {
        &self.errors
    }

    /// True when no version recorded an error.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Replaces a version's state. Ids outside the configured set are ignored.
    pub(crate) fn put_version(&mut self, id: &VersionId, state: VersionState) {
        if let Some(slot) = self.versions.get_mut(id.as_str()) {
            *slot = state;
        }
    }

    pub(crate) fn version_mut(&mut self, id: &VersionId) -> Option<&mut VersionState> {
        self.versions.get_mut(id.as_str())
    }

    pub(crate) fn take_version(&mut self, id: &VersionId) -> VersionState {
        self.versions
            .get_mut(id.as_str())
            .map(std::mem::take)
            .unwrap_or_default()
    }

    pub(crate) fn record_error(&mut self, id: &VersionId, error: StageError) {
        self.errors.entry(id.clone()).or_default().push(error);
    }

    /// Drops the source path, turning the state into a metadata-only one.
    pub(crate) fn without_source(mut self) -> Self {
        self.source_path = None;
        self
    }
}
