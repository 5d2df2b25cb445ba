//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::SylvaConfig;
use std::path::Path;

/// Name of the configuration file looked up in a project directory.
pub const CONFIG_FILE_NAME: &str = "sylva.toml";

/// Loads and validates a `sylva.toml` configuration from a project directory.
///
/// Reads `<project_dir>/sylva.toml`. A missing file is not an error: the
/// defaults are returned instead.
pub fn load_config(project_dir: &Path) -> Result<SylvaConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        return Ok(SylvaConfig::default());
    }
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `sylva.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<SylvaConfig, ConfigError> {
    let config: SylvaConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates that configuration values are usable.
fn validate_config(config: &SylvaConfig) -> Result<(), ConfigError> {
    if config.store.spaces_type.is_empty() {
        return Err(ConfigError::ValidationError(
            "store.spaces_type must not be empty".to_string(),
        ));
    }
    if config.debug.indent.is_empty() {
        return Err(ConfigError::ValidationError(
            "debug.indent must not be empty".to_string(),
        ));
    }
    Ok(())
}
