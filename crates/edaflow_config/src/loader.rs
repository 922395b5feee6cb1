//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::{FlowConfig, ELAB_DIR_LIMIT};
use edaflow_common::HdlLanguage;
use std::path::Path;

/// Name of the configuration file at the project root.
pub const CONFIG_FILE: &str = "edaflow.toml";

/// Loads and validates an `edaflow.toml` configuration from a project directory.
///
/// Reads `<project_dir>/edaflow.toml`, parses it, and validates it.
pub fn load_config(project_dir: &Path) -> Result<FlowConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE);
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates an `edaflow.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<FlowConfig, ConfigError> {
    let config: FlowConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates required fields and cross-references between sections.
fn validate_config(config: &FlowConfig) -> Result<(), ConfigError> {
    if config.project.name.is_empty() {
        return Err(ConfigError::MissingField("project.name".to_string()));
    }
    if config.project.build_dir.is_empty() {
        return Err(ConfigError::MissingField("project.build_dir".to_string()));
    }

    let max_dirs = config.elaborate.max_dirs;
    if max_dirs == 0 || max_dirs > ELAB_DIR_LIMIT {
        return Err(ConfigError::ValidationError(format!(
            "elaborate.max_dirs must be between 1 and {ELAB_DIR_LIMIT}, got {max_dirs}"
        )));
    }

    for name in config.compile.standards.keys() {
        name.parse::<HdlLanguage>()
            .map_err(|e| ConfigError::ValidationError(format!("compile.standards: {e}")))?;
    }

    for (target_name, target) in &config.targets {
        if target.top.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "targets.{target_name}.top"
            )));
        }
        for (idx, group) in target.sources.iter().enumerate() {
            if group.library.trim().is_empty() {
                return Err(ConfigError::MissingField(format!(
                    "targets.{target_name}.sources[{idx}].library"
                )));
            }
            group.language.parse::<HdlLanguage>().map_err(|e| {
                ConfigError::ValidationError(format!(
                    "targets.{target_name}.sources[{idx}]: {e}"
                ))
            })?;
        }
    }

    for (test_name, test) in &config.tests {
        if !config.targets.contains_key(&test.target) {
            return Err(ConfigError::ValidationError(format!(
                "test '{test_name}' refers to unknown target '{}'",
                test.target
            )));
        }
    }

    Ok(())
}
