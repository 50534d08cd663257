//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use identity_proxy::config::ProxyConfig;
use identity_proxy::http::HttpServer;
use identity_proxy::lifecycle::{build_registry, Shutdown};
use identity_proxy::plugins::PluginRegistry;

/// Model name that makes the mock upstream answer 429.
pub const RATE_LIMITED_MODEL: &str = "rate-limited";

/// Model name that makes the mock upstream stall before answering.
pub const SLOW_MODEL: &str = "slow";

pub const SSE_EVENTS: &[&str] = &[
    "event: message_start\ndata: {\"type\":\"message_start\"}\n\n",
    "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"delta\":{\"text\":\"Hi\"}}\n\n",
    "event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n",
];

/// One request as seen by the mock upstream.
#[derive(Debug, Clone)]
pub struct Captured {
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Captured {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[derive(Clone, Default)]
pub struct MockUpstream {
    captured: Arc<Mutex<Vec<Captured>>>,
}

impl MockUpstream {
    pub fn last(&self) -> Captured {
        self.captured.lock().unwrap().last().cloned().expect("no upstream request")
    }

    pub fn count(&self) -> usize {
        self.captured.lock().unwrap().len()
    }

    fn record(&self, path: &str, headers: HeaderMap, body: Bytes) {
        self.captured.lock().unwrap().push(Captured {
            path: path.to_string(),
            headers,
            body,
        });
    }
}

/// Start a mock Messages API on an ephemeral port.
pub async fn start_mock_upstream() -> (SocketAddr, MockUpstream) {
    let mock = MockUpstream::default();
    let app = Router::new()
        .route("/v1/messages", post(mock_messages))
        .route("/v1/messages/count_tokens", post(mock_count_tokens))
        .with_state(mock.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, mock)
}

async fn mock_messages(State(mock): State<MockUpstream>, headers: HeaderMap, body: Bytes) -> Response {
    mock.record("/v1/messages", headers, body.clone());
    let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

    if request["model"] == RATE_LIMITED_MODEL {
        let error = json!({
            "type": "error",
            "error": { "type": "rate_limit_error", "message": "slow down" }
        });
        return (StatusCode::TOO_MANY_REQUESTS, Json(error)).into_response();
    }

    if request["model"] == SLOW_MODEL {
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
    }

    if request["stream"] == true {
        let chunks = SSE_EVENTS
            .iter()
            .map(|event| Ok::<_, Infallible>(Bytes::from_static(event.as_bytes())));
        return Response::builder()
            .header(header::CONTENT_TYPE, "text/event-stream")
            .body(Body::from_stream(futures_util::stream::iter(chunks)))
            .unwrap();
    }

    Json(json!({
        "id": "msg_mock",
        "type": "message",
        "role": "assistant",
        "content": [{ "type": "text", "text": "Hello from upstream" }]
    }))
    .into_response()
}

async fn mock_count_tokens(State(mock): State<MockUpstream>, headers: HeaderMap, body: Bytes) -> Json<Value> {
    mock.record("/v1/messages/count_tokens", headers, body);
    Json(json!({ "input_tokens": 42 }))
}

/// A running proxy; stops when dropped.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub registry: Arc<PluginRegistry>,
    shutdown: Shutdown,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Proxy config pointed at `upstream`, with no server-side key.
pub fn config_for(upstream: SocketAddr) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstream.base_url = format!("http://{}", upstream);
    config
}

/// Start the proxy on an ephemeral port.
pub async fn start_proxy(config: ProxyConfig) -> TestProxy {
    let registry = build_registry(&config).await.unwrap();
    start_proxy_with(config, registry).await
}

pub async fn start_proxy_with(config: ProxyConfig, registry: Arc<PluginRegistry>) -> TestProxy {
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, registry.clone()).unwrap();
    tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestProxy {
        addr,
        registry,
        shutdown,
    }
}

/// A request that looks like it came from a third-party chat client.
pub fn chat_client_request() -> Value {
    json!({
        "model": "claude-sonnet-4-5",
        "max_tokens": 1024,
        "system": "You are a helpful assistant.",
        "messages": [{ "role": "user", "content": "Hello" }],
        "thinking": { "type": "enabled", "budget_tokens": 2048 }
    })
}
