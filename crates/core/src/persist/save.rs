//! Projection of a `FileState` to its persisted form.

use std::collections::BTreeMap;

use crate::state::{Assigns, FileState};

use super::types::{AssignKeys, PersistError, Persisted, PersistedFile, SaveFormat};

/// Projects `state` to the requested persisted form.
///
/// Empty annotation maps are omitted from structured output.
pub fn save(state: &FileState, format: &SaveFormat) -> Result<Persisted, PersistError> {
    match format {
        SaveFormat::Filename { allow_assigns } => {
            if !allow_assigns && has_assigns(state) {
                return Err(PersistError::AssignsPresent);
            }
            Ok(Persisted::Filename(state.filename().to_string()))
        }
        SaveFormat::Map { keys } => Ok(Persisted::Map(to_file(state, keys))),
        SaveFormat::Json { keys } => {
            let json = serde_json::to_string(&to_file(state, keys))?;
            Ok(Persisted::Json(json))
        }
    }
}

fn has_assigns(state: &FileState) -> bool {
    !state.assigns.is_empty() || state.versions().values().any(|v| !v.assigns.is_empty())
}

fn to_file(state: &FileState, keys: &AssignKeys) -> PersistedFile {
    let assigns = filter(&state.assigns, keys);

    let version_assigns: BTreeMap<_, _> = state
        .versions()
        .iter()
        .filter_map(|(id, version)| {
            filter(&version.assigns, keys).map(|assigns| (id.clone(), assigns))
        })
        .collect();

    PersistedFile {
        filename: state.filename().to_string(),
        assigns,
        version_assigns: (!version_assigns.is_empty()).then_some(version_assigns),
    }
}

/// The kept keys of `assigns`, or `None` when nothing is left.
fn filter(assigns: &Assigns, keys: &AssignKeys) -> Option<Assigns> {
    let kept: Assigns = assigns
        .iter()
        .filter(|(key, _)| keys.keeps(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    (!kept.is_empty()).then_some(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use crate::state::{VersionId, VersionState};
    use serde_json::json;

    fn state() -> FileState {
        let mut state = FileState::new(
            "coffee.jpg",
            Options::default().with_versions(["original", "thumb"]),
        );
        state.put_version(
            &VersionId::from("thumb"),
            VersionState::default()
                .assign("hash", "abc")
                .assign("size", 10),
        );
        state
    }

    #[test]
    fn test_filename_without_assigns() {
        let state = FileState::new("coffee.jpg", Options::default());
        let persisted = save(&state, &SaveFormat::Filename { allow_assigns: false }).unwrap();
        assert_eq!(persisted, Persisted::Filename("coffee.jpg".to_string()));
    }

    #[test]
    fn test_filename_with_assigns_fails() {
        let result = save(&state(), &SaveFormat::Filename { allow_assigns: false });
        assert!(matches!(result, Err(PersistError::AssignsPresent)));

        let persisted = save(&state(), &SaveFormat::Filename { allow_assigns: true }).unwrap();
        assert_eq!(persisted, Persisted::Filename("coffee.jpg".to_string()));
    }

    #[test]
    fn test_map_omits_empty_subtrees() {
        let Persisted::Map(file) = save(&state(), &SaveFormat::default()).unwrap() else {
            panic!("expected map");
        };
        assert!(file.assigns.is_none());
        let version_assigns = file.version_assigns.unwrap();
        assert!(!version_assigns.contains_key("original"));
        assert_eq!(version_assigns["thumb"]["hash"], "abc");
    }

    #[test]
    fn test_map_key_subset() {
        let format = SaveFormat::Map {
            keys: AssignKeys::only(["size"]),
        };
        let Persisted::Map(file) = save(&state(), &format).unwrap() else {
            panic!("expected map");
        };
        let thumb = &file.version_assigns.unwrap()["thumb"];
        assert!(thumb.get("hash").is_none());
        assert_eq!(thumb["size"], 10);

        let format = SaveFormat::Map {
            keys: AssignKeys::only(["missing"]),
        };
        let Persisted::Map(file) = save(&state(), &format).unwrap() else {
            panic!("expected map");
        };
        assert!(file.version_assigns.is_none());
    }

    #[test]
    fn test_json() {
        let mut state = state();
        state.assigns.insert("owner".to_string(), json!(7));

        let Persisted::Json(text) = save(&state, &SaveFormat::Json { keys: AssignKeys::All }).unwrap() else {
            panic!("expected json");
        };
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            json!({
                "filename": "coffee.jpg",
                "assigns": {"owner": 7},
                "version_assigns": {"thumb": {"hash": "abc", "size": 10}}
            })
        );
    }
}
