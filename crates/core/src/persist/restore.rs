//! Reconstruction of a `FileState` from its persisted form.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::config::Options;
use crate::state::{Assigns, FileState, VersionId, VersionState};

use super::types::{PersistError, PersistedFile, RestoreInput};

/// Rebuilds a metadata-only `FileState` under the current `options`.
///
/// Unknown keys are dropped. Versions get the persisted annotations when
/// present and start empty otherwise.
pub fn restore(input: impl Into<RestoreInput>, options: Options) -> Result<FileState, PersistError> {
    let file = match input.into() {
        RestoreInput::Text(text) => {
            let trimmed = text.trim_start();
            if trimmed.starts_with('{') {
                from_value(serde_json::from_str(trimmed)?)?
            } else {
                PersistedFile::new(text)
            }
        }
        RestoreInput::Value(value) => from_value(value)?,
        RestoreInput::File(file) => file,
    };

    if file.filename.is_empty() {
        return Err(PersistError::InvalidInput("empty filename".to_string()));
    }

    let mut state =
        FileState::new(file.filename, options).with_assigns(file.assigns.unwrap_or_default());
    for (id, assigns) in file.version_assigns.unwrap_or_default() {
        if state.has_version(id.as_str()) {
            state.put_version(&id, VersionState::with_assigns(assigns));
        } else {
            tracing::debug!(version = %id, "Dropping assigns of unconfigured version");
        }
    }
    Ok(state)
}

/// Reads a persisted object leniently: only `filename` is required.
fn from_value(value: Value) -> Result<PersistedFile, PersistError> {
    let Value::Object(mut map) = value else {
        return Err(PersistError::InvalidInput("expected an object".to_string()));
    };

    let filename = match map.remove("filename") {
        Some(Value::String(filename)) => filename,
        _ => return Err(PersistError::InvalidInput("missing filename".to_string())),
    };

    let assigns = match map.remove("assigns") {
        Some(Value::Object(assigns)) => Some(assigns),
        _ => None,
    };

    let version_assigns = match map.remove("version_assigns") {
        Some(Value::Object(versions)) => {
            let versions: BTreeMap<VersionId, Assigns> = versions
                .into_iter()
                .filter_map(|(id, assigns)| match assigns {
                    Value::Object(assigns) => Some((VersionId::from(id), assigns)),
                    _ => None,
                })
                .collect();
            Some(versions)
        }
        _ => None,
    };

    Ok(PersistedFile {
        filename,
        assigns,
        version_assigns,
    })
}
