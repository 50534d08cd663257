//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the plugin registry from configuration
//!
//! # Design Decisions
//! - Fail fast: a plugin that cannot be registered aborts startup
//! - Registration order is the dispatch order

use std::sync::Arc;

use crate::config::ProxyConfig;
use crate::plugins::{ClaudeCodePlugin, PluginRegistry, RegistryError};

/// Create a registry holding every plugin enabled in `config`.
pub async fn build_registry(config: &ProxyConfig) -> Result<Arc<PluginRegistry>, RegistryError> {
    let registry = PluginRegistry::new();

    let claude_code = &config.plugins.claude_code;
    if claude_code.enabled {
        registry
            .register(Arc::new(ClaudeCodePlugin::new(claude_code)))
            .await?;
    } else {
        tracing::info!(plugin = "ClaudeCode", "Plugin disabled by configuration");
    }

    Ok(Arc::new(registry))
}
