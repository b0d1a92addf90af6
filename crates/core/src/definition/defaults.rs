//! Default stage functions, callable from `Definition` overrides.

use crate::state::{FileState, VersionId};
use crate::storage::StorageOptions;
use crate::transform::Transform;

/// Accepts every file.
pub fn validate(_state: &FileState) -> Result<(), String> {
    Ok(())
}

/// Accepts files whose lowercase extension (without dot) is in `allowed`.
pub fn validate_extension(state: &FileState, allowed: &[&str]) -> Result<(), String> {
    let extension = state.lowercase_extension().trim_start_matches('.');
    if allowed.iter().any(|a| a.eq_ignore_ascii_case(extension)) {
        Ok(())
    } else {
        Err(format!(
            "invalid file type: {} (allowed: {})",
            state.filename(),
            allowed.join(", ")
        ))
    }
}

/// No transform: the source is stored unchanged.
pub fn transform(_state: &FileState, _version: &VersionId) -> Option<Transform> {
    None
}

/// The backend root.
pub fn storage_dir(_state: &FileState, _version: &VersionId) -> String {
    String::new()
}

/// `original` keeps the uploaded name; other versions become
/// `<root>_<version><ext>`, where `<ext>` is the forced extension of the
/// version's command transform or the source extension.
pub fn filename(state: &FileState, version: &VersionId) -> String {
    if version.is_original() {
        return state.filename().to_string();
    }

    let extension = state
        .version(version.as_str())
        .and_then(|v| v.extension.clone())
        .unwrap_or_else(|| state.extension().to_string());

    format!("{}_{}{}", state.root_name(), version, extension)
}

/// No version-level options.
pub fn storage_opts(_state: &FileState, _version: &VersionId) -> StorageOptions {
    StorageOptions::new()
}
