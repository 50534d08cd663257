//! Client detection and request rewriting.
//!
//! # Data Flow
//! ```text
//! (RequestBody, RequestHeaders) from the HTTP layer
//!     → registry.rs (first plugin whose detect() accepts the request)
//!     → plugin.transform() (rewrite body, session.rs supplies stable ids)
//!     → Dispatch::Matched { body, header factory, descriptor }
//!       or Dispatch::Passthrough(body)
//!     → HTTP layer forwards upstream
//! ```
//!
//! # Design Decisions
//! - Plugins are trait objects registered at startup, matched in registration order
//! - Detect and transform are only ever paired through `PluginRegistry::process`
//! - Every plugin owns its own session cache; nothing global

pub mod claude_code;
pub mod plugin;
pub mod registry;
pub mod session;
pub mod types;

pub use claude_code::ClaudeCodePlugin;
pub use plugin::{PluginError, ProtocolPlugin};
pub use registry::{Dispatch, PluginMatch, PluginRegistry, RegistryError};
pub use session::{SessionIdentity, SessionIdentityCache};
pub use types::{PluginDescriptor, RequestBody, RequestHeaders};
