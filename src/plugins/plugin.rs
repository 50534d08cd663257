//! The protocol plugin contract.

use async_trait::async_trait;
use thiserror::Error;

use crate::plugins::types::{PluginDescriptor, RequestBody, RequestHeaders};

/// Failure raised by a plugin lifecycle hook.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("initialization failed: {0}")]
    Initialize(String),
    #[error("teardown failed: {0}")]
    Destroy(String),
}

/// A unit that recognises one kind of client and rewrites its requests.
///
/// `detect`, `transform` and `headers` run on the request path, concurrently
/// from many tasks. They must be total over arbitrary bodies and must not block.
/// The registry pairs `detect` with `transform`; see
/// [`PluginRegistry::process`](crate::plugins::PluginRegistry::process).
#[async_trait]
pub trait ProtocolPlugin: Send + Sync {
    fn descriptor(&self) -> &PluginDescriptor;

    /// Returns true if this plugin should own the request.
    fn detect(&self, body: &RequestBody, headers: &RequestHeaders) -> bool;

    /// Rewrite a detected request. Fields outside the plugin's contract are kept.
    fn transform(&self, body: RequestBody, headers: &RequestHeaders) -> RequestBody;

    /// Outbound headers for the given upstream credential.
    fn headers(&self, api_key: &str) -> RequestHeaders;

    /// Called once when the plugin is registered.
    async fn initialize(&self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called once when the plugin is unregistered or the registry shuts down.
    async fn destroy(&self) -> Result<(), PluginError> {
        Ok(())
    }

    fn name(&self) -> &str {
        &self.descriptor().name
    }
}
