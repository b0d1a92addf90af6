//! Helpers shared by every storage backend.

use std::path::Path;

/// Backend-specific options (`base_uri`, `mode`, ...).
pub type StorageOptions = serde_json::Map<String, serde_json::Value>;

/// Overlays `overrides` on `base`; keys in `overrides` win.
pub fn merge_options(base: &StorageOptions, overrides: &StorageOptions) -> StorageOptions {
    let mut merged = base.clone();
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// `directory/filename`, or just `filename` when the directory is empty.
pub fn object_key(directory: &str, filename: &str) -> String {
    let directory = directory.trim_matches('/');
    if directory.is_empty() {
        filename.to_string()
    } else {
        format!("{}/{}", directory, filename)
    }
}

/// Names for `count` objects stored under `filename`.
///
/// The first keeps `filename`; the N-th (1-based, N >= 2) becomes
/// `root-N.ext`.
pub fn object_names(filename: &str, count: usize) -> Vec<String> {
    let (root, extension) = split_extension(filename);

    (1..=count.max(1))
        .map(|n| {
            if n == 1 {
                filename.to_string()
            } else {
                format!("{}-{}{}", root, n, extension)
            }
        })
        .collect()
}

/// Splits `name` into root and extension (with leading dot).
///
/// The extension is empty unless it is a literal suffix of `name`, so
/// `root + extension == name` always holds.
pub(crate) fn split_extension(name: &str) -> (&str, &str) {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(|e| {
            let root = name.strip_suffix(e)?.strip_suffix('.')?;
            Some((root, &name[root.len()..]))
        })
        .unwrap_or((name, ""))
}

/// Parses a POSIX permission mode given as an octal string or a number.
///
/// Returns `None` for anything unparsable; callers ignore the mode then.
pub fn parse_mode(value: &serde_json::Value) -> Option<u32> {
    let mode = match value {
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok())?,
        serde_json::Value::String(s) => {
            let s = s.trim();
            let digits = s
                .strip_prefix("0o")
                .or_else(|| s.strip_prefix("0O"))
                .unwrap_or(s);
            u32::from_str_radix(digits, 8).ok()?
        }
        _ => return None,
    };
    (mode <= 0o7777).then_some(mode)
}
