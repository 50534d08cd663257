//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: file (or defaults), then environment overrides, then
/// validation.
pub fn load(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => parse_file(path)?,
        None => ProxyConfig::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn parse_file(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Apply the deployment environment variables on top of file settings.
///
/// | Variable | Field |
/// |---|---|
/// | `HOST`, `PORT` | `listener.bind_address` |
/// | `ANTHROPIC_API_KEY` | `upstream.api_key` |
/// | `ANTHROPIC_BASE_URL` | `upstream.base_url` |
/// | `LOG_LEVEL`, `LOG_FORMAT` | `observability.*` |
pub fn apply_env_overrides<F>(config: &mut ProxyConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let host = non_empty("HOST");
    let port = non_empty("PORT");
    if host.is_some() || port.is_some() {
        let (current_host, current_port) = config
            .listener
            .bind_address
            .rsplit_once(':')
            .unwrap_or(("0.0.0.0", "3001"));
        config.listener.bind_address = format!(
            "{}:{}",
            host.as_deref().unwrap_or(current_host),
            port.as_deref().unwrap_or(current_port)
        );
    }

    if let Some(key) = non_empty("ANTHROPIC_API_KEY") {
        config.upstream.api_key = Some(key);
    }
    if let Some(url) = non_empty("ANTHROPIC_BASE_URL") {
        config.upstream.base_url = url;
    }
    if let Some(level) = non_empty("LOG_LEVEL") {
        config.observability.log_level = level.to_lowercase();
    }
    if let Some(format) = non_empty("LOG_FORMAT") {
        config.observability.log_format = format.to_lowercase();
    }
}
