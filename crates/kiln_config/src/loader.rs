//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::resolve::output_name;
use crate::types::ProjectConfig;
use kiln_common::OutputMode;
use kiln_source::SourceRole;
use std::path::Path;

/// Name of the project configuration file.
pub const CONFIG_FILE: &str = "kiln.toml";

/// Loads and validates a `kiln.toml` configuration from a project directory.
///
/// Reads `<project_dir>/kiln.toml`, parses it, and validates required fields.
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE);
    let content = std::fs::read_to_string(&config_path).map_err(|e| ConfigError::Io {
        path: config_path.clone(),
        source: e,
    })?;
    load_config_from_str(&content)
}

/// Parses and validates a `kiln.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates that required fields are present and configuration values are consistent.
fn validate_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    if config.project.name.is_empty() {
        return Err(ConfigError::MissingField("project.name".to_string()));
    }
    if config.project.version.is_empty() {
        return Err(ConfigError::MissingField("project.version".to_string()));
    }
    if config.compiler.id.is_empty() {
        return Err(ConfigError::MissingField("compiler.id".to_string()));
    }
    if config.compiler.source_extension.is_empty() {
        return Err(ConfigError::ValidationError(
            "compiler.source_extension must not be empty".to_string(),
        ));
    }
    match &config.compiler.output {
        OutputMode::PerSource { output_extension } if output_extension.is_empty() => {
            return Err(ConfigError::ValidationError(
                "compiler.output.output_extension must not be empty".to_string(),
            ));
        }
        OutputMode::Aggregate { output_file } if output_file.is_empty() => {
            return Err(ConfigError::ValidationError(
                "compiler.output.output_file must not be empty".to_string(),
            ));
        }
        _ => {}
    }
    if config.compiler.max_command_line == Some(0) {
        return Err(ConfigError::ValidationError(
            "compiler.max_command_line must be positive".to_string(),
        ));
    }
    let main_out = output_name(&config.main, SourceRole::Main);
    let test_out = output_name(&config.test, SourceRole::Test);
    if main_out == test_out {
        return Err(ConfigError::ValidationError(format!(
            "main and test must use distinct output directories, both are '{main_out}'"
        )));
    }
    Ok(())
}
