use figment::{providers::Serialized, Figment};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use super::ConfigError;
use crate::state::VersionId;
use crate::storage::{StorageBackend, StorageConfig, StorageOptions};
use crate::transform::ExecutorConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Deployment-wide operation options.
    #[serde(default)]
    pub options: Options,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    /// Attachment types, keyed by name.
    #[serde(default)]
    pub types: BTreeMap<String, TypeConfig>,
}

impl Config {
    /// Looks up an attachment type.
    pub fn type_config(&self, name: &str) -> Result<&TypeConfig, ConfigError> {
        self.types
            .get(name)
            .ok_or_else(|| ConfigError::UnknownType(name.to_string()))
    }

    /// Resolves the options of one call: deployment, then type, then call.
    pub fn options_for(&self, type_name: &str, call: &OptionsOverride) -> Result<Options, ConfigError> {
        let type_config = self.type_config(type_name)?;
        let mut type_options = type_config.options.clone();
        if type_options.versions.is_none() && !type_config.versions.is_empty() {
            type_options.versions = Some(type_config.versions.keys().cloned().collect());
        }
        self.options.layered(&type_options, call)
    }
}

/// Resolved execution options of one operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Options {
    /// Versions to produce.
    #[serde(default = "default_versions")]
    pub versions: Vec<VersionId>,

    /// Run each version as its own concurrent unit (the default).
    #[serde(rename = "async", default = "default_true")]
    pub concurrent: bool,

    /// Deadline for the whole operation, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Storage backend identifier.
    #[serde(default)]
    pub storage: StorageBackend,

    /// Base storage options; version-level options are merged on top.
    #[serde(default)]
    pub storage_opts: StorageOptions,

    /// Directory for transform outputs and spilled uploads.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Keep transform outputs on disk after they were stored.
    #[serde(default)]
    pub keep_temp_files: bool,
}

fn default_versions() -> Vec<VersionId> {
    vec![VersionId::original()]
}

fn default_true() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    15_000 // 15 seconds
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("quiver")
}

impl Default for Options {
    fn default() -> Self {
        Self {
            versions: default_versions(),
            concurrent: true,
            timeout_ms: default_timeout_ms(),
            storage: StorageBackend::default(),
            storage_opts: StorageOptions::new(),
            temp_dir: default_temp_dir(),
            keep_temp_files: false,
        }
    }
}

impl Options {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Sets the configured versions.
    pub fn with_versions<I, V>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<VersionId>,
    {
        self.versions = versions.into_iter().map(Into::into).collect();
        self
    }

    /// Selects concurrent (`true`) or sequential execution.
    pub fn with_concurrent(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    /// Sets the timeout in milliseconds.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Sets the storage backend.
    pub fn with_storage(mut self, storage: StorageBackend) -> Self {
        self.storage = storage;
        self
    }

    /// Sets one base storage option.
    pub fn with_storage_opt(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.storage_opts.insert(key.into(), value.into());
        self
    }

    /// Sets the temp directory.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Keeps transform outputs after storage.
    pub fn with_keep_temp_files(mut self, keep: bool) -> Self {
        self.keep_temp_files = keep;
        self
    }

    /// Checks the resolved options before an operation starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        super::validate_options(self)
    }

    /// Layers type-level and call-level overrides on top of `self`.
    ///
    /// Later layers win; `storage_opts` maps merge key by key.
    pub fn layered(
        &self,
        type_level: &OptionsOverride,
        call: &OptionsOverride,
    ) -> Result<Options, ConfigError> {
        Figment::from(Serialized::defaults(self))
            .merge(Serialized::defaults(type_level))
            .merge(Serialized::defaults(call))
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

/// A partial `Options` layer (type or call scope).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionsOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<Vec<VersionId>>,
    #[serde(rename = "async", default, skip_serializing_if = "Option::is_none")]
    pub concurrent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageBackend>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_opts: Option<StorageOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_temp_files: Option<bool>,
}

/// Attachment type: option overrides plus per-version behaviour.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TypeConfig {
    #[serde(default)]
    pub options: OptionsOverride,
    /// Storage directory template for every version; `{key}` reads the scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<String>,
    /// Accepted extensions (lowercase, without dot). Empty accepts all.
    #[serde(default)]
    pub allowed_extensions: Vec<String>,
    /// Record `sha256` and `size` of every version in its assigns.
    #[serde(default)]
    pub digest: bool,
    #[serde(default)]
    pub versions: BTreeMap<VersionId, VersionConfig>,
}

/// Per-version behaviour of a configured type.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct VersionConfig {
    /// Transform program; no transform when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    /// Arguments placed between source and destination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<String>,
    /// Forced output extension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    /// Overrides the type-level storage directory template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<String>,
    /// Filename template; `{root}`, `{version}`, `{ext}` and scope keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default)]
    pub storage_opts: StorageOptions,
}
