//! Input loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::GeneratorOptions;
use crate::config::validation::{validate_options, ValidationError};
use crate::service::{ServiceConfig, ServiceError, ServiceInfo};

/// Error type for input loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid options file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid service config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse and validate options from TOML text.
pub fn parse_options(content: &str) -> Result<GeneratorOptions, ConfigError> {
    let opts: GeneratorOptions = toml::from_str(content)?;
    validate_options(&opts).map_err(ConfigError::Validation)?;
    Ok(opts)
}

/// Load and validate options from a TOML file.
pub fn load_options(path: &Path) -> Result<GeneratorOptions, ConfigError> {
    let opts = parse_options(&read(path)?)?;
    tracing::debug!(path = %path.display(), "options loaded");
    Ok(opts)
}

/// Parse and index a service config from JSON text.
pub fn parse_service(content: &str) -> Result<ServiceInfo, ConfigError> {
    let config: ServiceConfig = serde_json::from_str(content)?;
    Ok(ServiceInfo::from_service_config(config)?)
}

/// Load and index a service config from a JSON file.
pub fn load_service(path: &Path) -> Result<ServiceInfo, ConfigError> {
    let info = parse_service(&read(path)?)?;
    tracing::debug!(
        path = %path.display(),
        service = info.name(),
        operations = info.operations.len(),
        "service config loaded"
    );
    Ok(info)
}
