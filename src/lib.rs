//! Identity-rewriting reverse proxy library.
//!
//! Accepts Messages API traffic from third-party clients, runs it through a
//! registry of protocol plugins, and forwards it to the upstream API.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod plugins;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use plugins::{PluginRegistry, ProtocolPlugin};
