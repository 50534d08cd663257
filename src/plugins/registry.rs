//! Plugin registration and first-match dispatch.
//!
//! # Responsibilities
//! - Own registered plugins in registration order
//! - Run plugin lifecycle hooks on register/unregister/shutdown
//! - Pick the first plugin whose `detect` accepts a request and apply it
//!
//! # Design Decisions
//! - Readers load an immutable snapshot, so the name index and the ordered list
//!   are always seen together
//! - Writers are serialized and publish a new snapshot
//! - No priority beyond registration order; plugin authors keep predicates
//!   mutually exclusive
//! - Lifecycle failures propagate, nothing is rolled back

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::observability::metrics;
use crate::plugins::plugin::{PluginError, ProtocolPlugin};
use crate::plugins::types::{PluginDescriptor, RequestBody, RequestHeaders};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("plugin must have a name")]
    MissingName,
    #[error("plugin \"{0}\" already registered")]
    DuplicateName(String),
    #[error("plugin \"{name}\" lifecycle hook failed: {source}")]
    Lifecycle {
        name: String,
        #[source]
        source: PluginError,
    },
}

#[derive(Default)]
struct Snapshot {
    by_name: HashMap<String, Arc<dyn ProtocolPlugin>>,
    ordered: Vec<Arc<dyn ProtocolPlugin>>,
}

impl Snapshot {
    fn with(&self, plugin: Arc<dyn ProtocolPlugin>) -> Self {
        let mut by_name = self.by_name.clone();
        let mut ordered = self.ordered.clone();
        by_name.insert(plugin.name().to_string(), plugin.clone());
        ordered.push(plugin);
        Self { by_name, ordered }
    }

    fn without(&self, name: &str) -> Self {
        let mut by_name = self.by_name.clone();
        by_name.remove(name);
        let ordered = self
            .ordered
            .iter()
            .filter(|p| p.name() != name)
            .cloned()
            .collect();
        Self { by_name, ordered }
    }
}

/// A plugin selected for a request, with its transformed body.
pub struct PluginMatch {
    pub body: RequestBody,
    pub descriptor: PluginDescriptor,
    plugin: Arc<dyn ProtocolPlugin>,
}

impl PluginMatch {
    /// Outbound headers from the matched plugin.
    pub fn headers(&self, api_key: &str) -> RequestHeaders {
        self.plugin.headers(api_key)
    }
}

impl std::fmt::Debug for PluginMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginMatch")
            .field("body", &self.body)
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

/// Outcome of [`PluginRegistry::process`].
#[derive(Debug)]
pub enum Dispatch {
    Matched(PluginMatch),
    /// No plugin applies; the body is handed back untouched.
    Passthrough(RequestBody),
}

#[derive(Default)]
pub struct PluginRegistry {
    snapshot: ArcSwap<Snapshot>,
    writer: Mutex<()>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, plugin: Arc<dyn ProtocolPlugin>) -> Result<(), RegistryError> {
        let descriptor = plugin.descriptor().clone();
        if descriptor.name.is_empty() {
            return Err(RegistryError::MissingName);
        }

        let _guard = self.writer.lock().await;
        let current = self.snapshot.load_full();
        if current.by_name.contains_key(&descriptor.name) {
            return Err(RegistryError::DuplicateName(descriptor.name));
        }
        self.snapshot.store(Arc::new(current.with(plugin.clone())));
        metrics::record_registered_plugins(self.len());

        plugin
            .initialize()
            .await
            .map_err(|source| RegistryError::Lifecycle {
                name: descriptor.name.clone(),
                source,
            })?;

        tracing::info!(
            plugin = %descriptor.name,
            version = %descriptor.version,
            "Plugin registered"
        );
        Ok(())
    }

    /// Returns `Ok(false)` if no plugin has this name.
    pub async fn unregister(&self, name: &str) -> Result<bool, RegistryError> {
        let _guard = self.writer.lock().await;
        let current = self.snapshot.load_full();
        let Some(plugin) = current.by_name.get(name).cloned() else {
            return Ok(false);
        };

        plugin
            .destroy()
            .await
            .map_err(|source| RegistryError::Lifecycle {
                name: name.to_string(),
                source,
            })?;

        self.snapshot.store(Arc::new(current.without(name)));
        metrics::record_registered_plugins(self.len());
        tracing::info!(plugin = %name, "Plugin unregistered");
        Ok(true)
    }

    /// First plugin, in registration order, whose `detect` accepts the request.
    pub fn find_plugin(
        &self,
        body: &RequestBody,
        headers: &RequestHeaders,
    ) -> Option<Arc<dyn ProtocolPlugin>> {
        self.snapshot
            .load()
            .ordered
            .iter()
            .find(|plugin| plugin.detect(body, headers))
            .cloned()
    }

    pub fn process(&self, body: RequestBody, headers: &RequestHeaders) -> Dispatch {
        let Some(plugin) = self.find_plugin(&body, headers) else {
            return Dispatch::Passthrough(body);
        };

        let body = plugin.transform(body, headers);
        Dispatch::Matched(PluginMatch {
            body,
            descriptor: plugin.descriptor().clone(),
            plugin,
        })
    }

    pub fn list(&self) -> Vec<PluginDescriptor> {
        self.snapshot
            .load()
            .ordered
            .iter()
            .map(|plugin| plugin.descriptor().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Destroy every plugin and clear the registry.
    ///
    /// Every hook runs even if an earlier one fails; the first failure is
    /// returned after the registry has been cleared.
    pub async fn destroy_all(&self) -> Result<(), RegistryError> {
        let _guard = self.writer.lock().await;
        let current = self.snapshot.load_full();

        let mut first_error = None;
        for plugin in &current.ordered {
            if let Err(source) = plugin.destroy().await {
                tracing::error!(plugin = %plugin.name(), error = %source, "Plugin teardown failed");
                first_error.get_or_insert(RegistryError::Lifecycle {
                    name: plugin.name().to_string(),
                    source,
                });
            }
        }

        self.snapshot.store(Arc::new(Snapshot::default()));
        metrics::record_registered_plugins(0);
        tracing::info!(count = current.ordered.len(), "All plugins destroyed");

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
