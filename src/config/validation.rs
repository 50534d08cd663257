//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and the upstream URL
//! - Validate value ranges (timeouts > 0, window > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;
use crate::plugins::session::MAX_SESSION_WINDOW_SECS;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("invalid socket address '{}'", config.listener.bind_address),
        ));
    }

    match Url::parse(&config.upstream.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError::new(
            "upstream.base_url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(
            "upstream.base_url",
            format!("invalid url: {}", e),
        )),
    }

    if matches!(&config.upstream.api_key, Some(key) if key.trim().is_empty()) {
        errors.push(ValidationError::new("upstream.api_key", "must not be blank"));
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::new("timeouts.connect_secs", "must be > 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be > 0"));
    }

    if !matches!(config.observability.log_format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::new(
            "observability.log_format",
            format!("expected 'pretty' or 'json', got '{}'", config.observability.log_format),
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", config.observability.metrics_address),
        ));
    }

    let plugin = &config.plugins.claude_code;
    if plugin.session_window_secs == 0 {
        errors.push(ValidationError::new(
            "plugins.claude_code.session_window_secs",
            "must be > 0",
        ));
    } else if plugin.session_window_secs > MAX_SESSION_WINDOW_SECS {
        errors.push(ValidationError::new(
            "plugins.claude_code.session_window_secs",
            format!("must be <= {} (10 years)", MAX_SESSION_WINDOW_SECS),
        ));
    }
    if plugin.client_markers.iter().any(|m| m.is_empty()) {
        errors.push(ValidationError::new(
            "plugins.claude_code.client_markers",
            "markers must not be empty strings",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ProxyConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "nope".into();
        config.upstream.base_url = "ftp://example.com".into();
        config.timeouts.request_secs = 0;
        config.plugins.claude_code.session_window_secs = 0;
        config.plugins.claude_code.client_markers = vec![String::new()];

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "upstream.base_url",
                "timeouts.request_secs",
                "plugins.claude_code.session_window_secs",
                "plugins.claude_code.client_markers",
            ]
        );
    }

    #[test]
    fn test_session_window_upper_bound() {
        let mut config = ProxyConfig::default();
        config.plugins.claude_code.session_window_secs = MAX_SESSION_WINDOW_SECS;
        assert!(validate_config(&config).is_ok());

        config.plugins.claude_code.session_window_secs = 10_000_000_000_000;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "plugins.claude_code.session_window_secs");
    }

    #[test]
    fn test_base_url_with_path_accepted() {
        let mut config = ProxyConfig::default();
        config.upstream.base_url = "https://relay.example.org/api".into();
        assert!(validate_config(&config).is_ok());
    }
}
