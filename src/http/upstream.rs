//! Pooled client for the upstream API.
//!
//! # Design Decisions
//! - One `reqwest::Client` shared by all requests (keep-alive pool, HTTP and HTTPS)
//! - Connect timeout on the client; the request deadline covers only the wait
//!   for response headers so long streams are not cut off
//! - Header values that are not valid HTTP are dropped with a warning

use std::time::Duration;

use axum::body::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::config::{TimeoutConfig, UpstreamConfig};
use crate::http::response::ProxyError;
use crate::plugins::RequestHeaders;

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl UpstreamClient {
    pub fn new(upstream: &UpstreamConfig, timeouts: &TimeoutConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .pool_max_idle_per_host(upstream.pool_max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(upstream.pool_idle_timeout_secs))
            .tcp_keepalive(Duration::from_secs(upstream.tcp_keepalive_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: upstream.base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(timeouts.request_secs),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for an API path such as `/v1/messages`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST `body` to `path` and return once response headers arrive.
    pub async fn post(
        &self,
        path: &str,
        headers: &RequestHeaders,
        body: Bytes,
        request_id: &str,
    ) -> Result<reqwest::Response, ProxyError> {
        let url = self.endpoint(path);
        let request = self
            .client
            .post(&url)
            .headers(to_header_map(headers, request_id))
            .body(body);

        match tokio::time::timeout(self.request_timeout, request.send()).await {
            Ok(Ok(response)) => {
                tracing::debug!(
                    request_id = %request_id,
                    url = %url,
                    status = %response.status(),
                    "Upstream responded"
                );
                Ok(response)
            }
            Ok(Err(e)) => {
                tracing::error!(request_id = %request_id, url = %url, error = %e, "Upstream error");
                Err(ProxyError::Upstream(e.to_string()))
            }
            Err(_) => {
                tracing::error!(
                    request_id = %request_id,
                    url = %url,
                    timeout_secs = self.request_timeout.as_secs(),
                    "Upstream timed out"
                );
                Err(ProxyError::Timeout(self.request_timeout.as_secs()))
            }
        }
    }
}

fn to_header_map(headers: &RequestHeaders, request_id: &str) -> HeaderMap {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => tracing::warn!(request_id = %request_id, header = %name, "Dropping invalid outbound header"),
        }
    }
    map
}
