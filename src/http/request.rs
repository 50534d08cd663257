//! Request handling helpers.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) for every inbound request
//! - Extract the upstream credential from the request
//! - Build the default outbound headers for requests no plugin claims
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Credential precedence: server-side key, Authorization, x-api-key,
//!   anthropic-api-key

use axum::http::{HeaderMap, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::plugins::RequestHeaders;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates `x-request-id` values for [`tower_http::request_id::SetRequestIdLayer`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

pub trait RequestIdExt {
    /// The request ID, or "unknown" if none was assigned.
    fn request_id(&self) -> &str;
}

impl RequestIdExt for HeaderMap {
    fn request_id(&self) -> &str {
        self.get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
    }
}

/// Resolve the credential to use upstream.
///
/// A configured server-side key always wins. Otherwise the client's
/// `Authorization` header is used (a `Bearer ` prefix is stripped, any case),
/// then `x-api-key`, then `anthropic-api-key`.
pub fn extract_api_key(configured: Option<&str>, headers: &RequestHeaders) -> Option<String> {
    if let Some(key) = configured.filter(|k| !k.is_empty()) {
        return Some(key.to_string());
    }

    let from_authorization = headers.get("authorization").map(|auth| match auth.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => &auth[7..],
        _ => auth,
    });

    [
        from_authorization,
        headers.get("x-api-key"),
        headers.get("anthropic-api-key"),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .find(|key| !key.is_empty())
    .map(str::to_string)
}

/// Outbound headers when no plugin applies.
pub fn default_headers(api_key: &str) -> RequestHeaders {
    [
        ("authorization", format!("Bearer {}", api_key)),
        ("content-type", "application/json".to_string()),
    ]
    .into_iter()
    .collect()
}
