use std::collections::HashSet;

use super::types::{Config, Options, OptionsOverride};
use super::ConfigError;

/// Validate configuration
/// Currently validates:
/// - Deployment options (see `validate_options`)
/// - The resolved options of every configured type
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    validate_options(&config.options)?;

    for name in config.types.keys() {
        let options = config.options_for(name, &OptionsOverride::default())?;
        validate_options(&options)
            .map_err(|e| ConfigError::ValidationError(format!("types.{}: {}", name, e)))?;
    }

    Ok(())
}

/// Validate resolved options
/// - timeout_ms is not 0
/// - at least one version, no duplicates
/// - version ids use `[A-Za-z0-9_-]` only
pub fn validate_options(options: &Options) -> Result<(), ConfigError> {
    if options.timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "timeout_ms cannot be 0".to_string(),
        ));
    }

    if options.versions.is_empty() {
        return Err(ConfigError::ValidationError(
            "at least one version must be configured".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for version in &options.versions {
        let id = version.as_str();
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(ConfigError::ValidationError(format!(
                "invalid version id: {:?}",
                id
            )));
        }
        if !seen.insert(id) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate version id: {}",
                id
            )));
        }
    }

    Ok(())
}
