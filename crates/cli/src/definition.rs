//! A `Definition` driven by a `[types.<name>]` config table.

use async_trait::async_trait;
use regex_lite::{Captures, Regex};
use serde_json::Value;

use quiver_core::definition::defaults;
use quiver_core::postprocess;
use quiver_core::{
    Config, ConfigError, Definition, FileState, StorageOptions, Transform, TypeConfig, VersionConfig,
    VersionId, VersionState,
};

/// Stage functions read from a configured attachment type.
#[derive(Debug, Clone)]
pub struct ConfiguredDefinition {
    name: String,
    config: TypeConfig,
}

impl ConfiguredDefinition {
    pub fn new(name: impl Into<String>, config: TypeConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    /// Builds the definition of the type `name` in `config`.
    pub fn from_config(config: &Config, name: &str) -> Result<Self, ConfigError> {
        Ok(Self::new(name, config.type_config(name)?.clone()))
    }

    fn version_config(&self, version: &VersionId) -> Option<&VersionConfig> {
        self.config.versions.get(version)
    }
}

#[async_trait]
impl Definition for ConfiguredDefinition {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, state: &FileState) -> Result<(), String> {
        if self.config.allowed_extensions.is_empty() {
            return defaults::validate(state);
        }
        let allowed: Vec<&str> = self
            .config
            .allowed_extensions
            .iter()
            .map(String::as_str)
            .collect();
        defaults::validate_extension(state, &allowed)
    }

    fn transform(&self, state: &FileState, version: &VersionId) -> Option<Transform> {
        let Some(config) = self.version_config(version).filter(|v| v.program.is_some()) else {
            return defaults::transform(state, version);
        };
        let program = config.program.as_deref().unwrap_or_default();

        let transform = Transform::command(program, config.args.as_deref().unwrap_or(""));
        Some(match &config.extension {
            Some(extension) => transform.with_extension(extension.as_str()),
            None => transform,
        })
    }

    async fn postprocess(
        &self,
        version_state: VersionState,
        _version: &VersionId,
        state: &FileState,
    ) -> Result<VersionState, String> {
        if self.config.digest {
            postprocess::digest(version_state, state.source_path.as_deref()).await
        } else {
            Ok(version_state)
        }
    }

    fn storage_dir(&self, state: &FileState, version: &VersionId) -> String {
        let template = self
            .version_config(version)
            .and_then(|v| v.storage_dir.as_ref())
            .or(self.config.storage_dir.as_ref());
        match template {
            Some(template) => render(template, &state.scope, &[]),
            None => defaults::storage_dir(state, version),
        }
    }

    fn filename(&self, state: &FileState, version: &VersionId) -> String {
        let Some(template) = self.version_config(version).and_then(|v| v.filename.as_ref()) else {
            return defaults::filename(state, version);
        };

        let extension = state
            .version(version.as_str())
            .and_then(|v| v.extension.clone())
            .unwrap_or_else(|| state.extension().to_string());
        render(
            template,
            &state.scope,
            &[
                ("root", state.root_name()),
                ("version", version.as_str()),
                ("ext", &extension),
            ],
        )
    }

    fn storage_opts(&self, state: &FileState, version: &VersionId) -> StorageOptions {
        match self.version_config(version) {
            Some(config) => config.storage_opts.clone(),
            None => defaults::storage_opts(state, version),
        }
    }
}

/// `{key}` with a key of ASCII letters, digits or underscores.
const PLACEHOLDER: &str = r"\{([A-Za-z0-9_]+)\}";

/// Replaces `{key}` placeholders with `fixed` values, then scope entries.
///
/// Unknown placeholders are kept verbatim.
fn render(template: &str, scope: &Value, fixed: &[(&str, &str)]) -> String {
    let Ok(placeholder) = Regex::new(PLACEHOLDER) else {
        return template.to_string();
    };
    placeholder
        .replace_all(template, |caps: &Captures| {
            lookup(&caps[1], scope, fixed).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn lookup(key: &str, scope: &Value, fixed: &[(&str, &str)]) -> Option<String> {
    if let Some((_, value)) = fixed.iter().find(|(k, _)| *k == key) {
        return Some(value.to_string());
    }
    match scope.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
