//! Filesystem storage backend.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;
use tokio::fs;

use super::config::LocalStorageConfig;
use super::error::{StorageError, StorageResult};
use super::traits::Storage;
#[cfg(unix)]
use super::types::parse_mode;
use super::types::{object_key, StorageOptions};

/// Stores objects under `base_path/directory/filename`.
///
/// Recognised options:
/// - `mode`: permission mode for saved files, octal string or number
/// - `base_uri`: prefix for `build_uri`
#[derive(Debug, Clone)]
pub struct LocalStorage {
    config: LocalStorageConfig,
}

impl LocalStorage {
    /// Creates a new local storage with the given configuration.
    pub fn new(config: LocalStorageConfig) -> Self {
        Self { config }
    }

    /// Creates a local storage rooted at `base_path`.
    pub fn at(base_path: impl Into<PathBuf>) -> Self {
        Self::new(LocalStorageConfig::default().with_base_path(base_path))
    }

    pub fn base_path(&self) -> &Path {
        &self.config.base_path
    }

    /// Resolves an object key to a path, rejecting keys that leave the root.
    fn object_path(&self, directory: &str, filename: &str) -> StorageResult<PathBuf> {
        let key = object_key(directory, filename);
        if filename.is_empty() {
            return Err(StorageError::InvalidKey(format!(
                "empty filename in {:?}",
                key
            )));
        }
        let relative = Path::new(&key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(StorageError::InvalidKey(key));
        }
        Ok(self.config.base_path.join(relative))
    }

    async fn ensure_parent_dir(path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Applies the `mode` option; unparsable values are ignored.
    #[cfg(unix)]
    async fn apply_mode(path: &Path, opts: &StorageOptions) -> StorageResult<()> {
        use std::os::unix::fs::PermissionsExt;

        let Some(value) = opts.get("mode") else {
            return Ok(());
        };
        match parse_mode(value) {
            Some(mode) => {
                fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
            }
            None => {
                tracing::warn!(
                    path = %path.display(),
                    mode = %value,
                    "Ignoring unparsable permission mode"
                );
            }
        }
        Ok(())
    }

    #[cfg(not(unix))]
    async fn apply_mode(_path: &Path, _opts: &StorageOptions) -> StorageResult<()> {
        Ok(())
    }

    fn base_uri<'a>(&'a self, opts: &'a StorageOptions) -> Option<&'a str> {
        opts.get("base_uri")
            .and_then(|v| v.as_str())
            .or(self.config.base_uri.as_deref())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    fn name(&self) -> &str {
        "local"
    }

    async fn save(
        &self,
        directory: &str,
        filename: &str,
        source: &Path,
        opts: &StorageOptions,
    ) -> StorageResult<()> {
        let start = Instant::now();
        let key = object_key(directory, filename);
        let path = self.object_path(directory, filename)?;

        Self::ensure_parent_dir(&path).await?;

        let size = fs::copy(source, &path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::save_failed(
                    &key,
                    format!("source {} not found", source.display()),
                )
            } else {
                StorageError::save_failed(&key, e)
            }
        })?;

        Self::apply_mode(&path, opts).await?;

        tracing::debug!(
            path = %path.display(),
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage save successful"
        );
        Ok(())
    }

    async fn delete(
        &self,
        directory: &str,
        filename: &str,
        _opts: &StorageOptions,
    ) -> StorageResult<()> {
        let key = object_key(directory, filename);
        let path = self.object_path(directory, filename)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(key = %key, "Local storage delete successful");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(key = %key, "Object already absent");
                Ok(())
            }
            Err(e) => Err(StorageError::delete_failed(key, e)),
        }
    }

    async fn copy(
        &self,
        directory: &str,
        filename: &str,
        to_directory: &str,
        to_filename: &str,
        opts: &StorageOptions,
    ) -> StorageResult<()> {
        let from_key = object_key(directory, filename);
        let to_key = object_key(to_directory, to_filename);
        let from = self.object_path(directory, filename)?;
        let to = self.object_path(to_directory, to_filename)?;

        Self::ensure_parent_dir(&to).await?;

        fs::copy(&from, &to).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::not_found(&from_key)
            } else {
                StorageError::copy_failed(&from_key, &to_key, e)
            }
        })?;

        Self::apply_mode(&to, opts).await?;

        tracing::debug!(from = %from_key, to = %to_key, "Local storage copy successful");
        Ok(())
    }

    async fn retrieve(
        &self,
        directory: &str,
        filename: &str,
        destination: &Path,
        _opts: &StorageOptions,
    ) -> StorageResult<()> {
        let key = object_key(directory, filename);
        let path = self.object_path(directory, filename)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::not_found(key));
        }

        Self::ensure_parent_dir(destination).await?;
        fs::copy(&path, destination)
            .await
            .map_err(|e| StorageError::retrieve_failed(&key, destination.to_path_buf(), e))?;

        tracing::debug!(
            key = %key,
            destination = %destination.display(),
            "Local storage retrieve successful"
        );
        Ok(())
    }

    async fn build_uri(
        &self,
        directory: &str,
        filename: &str,
        opts: &StorageOptions,
    ) -> StorageResult<String> {
        let key = object_key(directory, filename);
        let encoded = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");

        Ok(match self.base_uri(opts) {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), encoded),
            None => format!("/{}", encoded),
        })
    }
}
