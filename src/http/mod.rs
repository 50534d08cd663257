//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, credential extraction)
//!     → plugins (detect / transform / header factory)
//!     → upstream.rs (pooled client, POST to the API)
//!     → response.rs (relay streamed or buffered, map errors)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod upstream;

pub use request::{extract_api_key, RequestIdExt, X_REQUEST_ID};
pub use response::ProxyError;
pub use server::{AppState, HttpServer};
pub use upstream::UpstreamClient;
