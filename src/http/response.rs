//! Response handling.
//!
//! # Responsibilities
//! - Relay upstream responses to the client, streamed or buffered
//! - Strip hop-by-hop headers
//! - Map proxy failures to API-style JSON errors
//!
//! # Design Decisions
//! - Streaming responses avoid buffering the body
//! - Upstream status codes are relayed as-is, including errors
//! - Upstream timeouts result in 504 Gateway Timeout

use axum::{
    body::Body,
    extract::rejection::BytesRejection,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures_util::TryStreamExt;
use serde_json::json;
use thiserror::Error;

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
];

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("{0}")]
    Authentication(String),
    #[error("{0}")]
    InvalidRequest(String),
    #[error("failed to read request body: {0}")]
    Body(#[from] BytesRejection),
    #[error("upstream request failed: {0}")]
    Upstream(String),
    #[error("upstream did not respond within {0}s")]
    Timeout(u64),
    #[error("{0}")]
    Internal(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ProxyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::Body(rejection) => rejection.status(),
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The `error.type` reported to the client.
    pub fn error_type(&self) -> &'static str {
        match self {
            ProxyError::Authentication(_) => "authentication_error",
            ProxyError::InvalidRequest(_) => "invalid_request_error",
            ProxyError::Body(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                "request_too_large"
            }
            ProxyError::Body(_) => "invalid_request_error",
            ProxyError::Timeout(_) => "timeout_error",
            ProxyError::Upstream(_) | ProxyError::Internal(_) => "api_error",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let body = json!({
            "type": "error",
            "error": {
                "type": self.error_type(),
                "message": self.to_string(),
            }
        });
        (self.status(), Json(body)).into_response()
    }
}

/// Relay an upstream response to the client.
///
/// Successful responses to streaming requests are piped through chunk by chunk
/// as `text/event-stream`; everything else is buffered first so a broken
/// upstream read still produces a clean error.
pub async fn relay(upstream: reqwest::Response, stream: bool) -> Result<Response, ProxyError> {
    let status = upstream.status();
    let headers = forwardable_headers(upstream.headers());

    if stream && status.is_success() {
        let body = Body::from_stream(upstream.bytes_stream().inspect_err(|e| {
            tracing::warn!(error = %e, "Upstream stream interrupted");
        }));
        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/event-stream"),
        );
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        return Ok(response);
    }

    let bytes = upstream
        .bytes()
        .await
        .map_err(|e| ProxyError::Upstream(e.to_string()))?;
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

fn forwardable_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream {
        if !HOP_BY_HOP.contains(&name.as_str()) {
            headers.append(name.clone(), value.clone());
        }
    }
    headers
}
