//! Per-version decisions supplied by the host.
//!
//! A `Definition` answers, for every `(FileState, version)` pair, how the
//! version is transformed, post-processed, named and placed. Every method has
//! a default; the free functions in [`defaults`] hold the default behaviour so
//! an override can still fall back to it:
//!
//! ```ignore
//! use quiver_core::definition::{defaults, Definition};
//! use quiver_core::state::{FileState, VersionId};
//! use quiver_core::transform::Transform;
//!
//! struct Avatar;
//!
//! impl Definition for Avatar {
//!     fn transform(&self, _state: &FileState, version: &VersionId) -> Option<Transform> {
//!         match version.as_str() {
//!             "thumb" => Some(Transform::command("convert", "-thumbnail 100x100>")),
//!             _ => None,
//!         }
//!     }
//!
//!     fn storage_dir(&self, state: &FileState, version: &VersionId) -> String {
//!         match state.scope.get("id") {
//!             Some(id) => format!("avatars/{}", id),
//!             None => defaults::storage_dir(state, version),
//!         }
//!     }
//! }
//! ```

pub mod defaults;

use async_trait::async_trait;

use crate::state::{FileState, VersionId, VersionState};
use crate::storage::StorageOptions;
use crate::transform::Transform;

/// Host-supplied stage functions for one attachment type.
#[async_trait]
pub trait Definition: Send + Sync + 'static {
    /// Returns the name used in logs.
    fn name(&self) -> &str {
        "definition"
    }

    /// Rejects a file before any version work starts.
    fn validate(&self, state: &FileState) -> Result<(), String> {
        defaults::validate(state)
    }

    /// How `version` is derived from the source. `None` stores the source as is.
    fn transform(&self, state: &FileState, version: &VersionId) -> Option<Transform> {
        defaults::transform(state, version)
    }

    /// Runs after the transform, before any naming decision.
    ///
    /// Typically derives metadata into `assigns` (see `postprocess::digest`).
    async fn postprocess(
        &self,
        version_state: VersionState,
        version: &VersionId,
        state: &FileState,
    ) -> Result<VersionState, String> {
        let _ = (version, state);
        Ok(version_state)
    }

    fn storage_dir(&self, state: &FileState, version: &VersionId) -> String {
        defaults::storage_dir(state, version)
    }

    fn filename(&self, state: &FileState, version: &VersionId) -> String {
        defaults::filename(state, version)
    }

    /// Backend options merged over the operation's base options.
    fn storage_opts(&self, state: &FileState, version: &VersionId) -> StorageOptions {
        defaults::storage_opts(state, version)
    }
}

/// A definition that keeps every default.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDefinition;

impl Definition for DefaultDefinition {
    fn name(&self) -> &str {
        "default"
    }
}
