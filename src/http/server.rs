//! HTTP server setup and the proxy handlers.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, body limit, CORS, timeout)
//! - Authenticate, dispatch through the plugin registry, forward upstream
//! - Relay upstream responses (streamed or buffered)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, ConnectInfo, DefaultBodyLimit, State},
    http::{header, HeaderMap, HeaderName, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::config::ProxyConfig;
use crate::http::request::{default_headers, extract_api_key, MakeRequestUuid, RequestIdExt};
use crate::http::response::{relay, ProxyError};
use crate::http::upstream::UpstreamClient;
use crate::observability::metrics;
use crate::plugins::{Dispatch, PluginRegistry, RequestBody, RequestHeaders};

pub const MESSAGES_PATH: &str = "/v1/messages";
pub const COUNT_TOKENS_PATH: &str = "/v1/messages/count_tokens";

const NO_PLUGIN: &str = "none";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub registry: Arc<PluginRegistry>,
    pub upstream: Arc<UpstreamClient>,
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
    config: Arc<ProxyConfig>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration and plugins.
    pub fn new(config: ProxyConfig, registry: Arc<PluginRegistry>) -> Result<Self, reqwest::Error> {
        let upstream = UpstreamClient::new(&config.upstream, &config.timeouts)?;
        let config = Arc::new(config);

        let state = AppState {
            config: config.clone(),
            registry,
            upstream: Arc::new(upstream),
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        // Time to first response byte; streamed bodies are not affected.
        let deadline = Duration::from_secs(config.timeouts.connect_secs + config.timeouts.request_secs);

        let mut router = Router::new()
            .route(MESSAGES_PATH, post(messages_handler))
            .route(COUNT_TOKENS_PATH, post(count_tokens_handler))
            .merge(setup_admin_router(state.clone()))
            .fallback(not_found)
            .with_state(state)
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::with_status_code(StatusCode::GATEWAY_TIMEOUT, deadline));

        if config.security.cors_enabled {
            router = router.layer(cors_layer());
        }

        router.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            target = %self.config.upstream.base_url,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-api-key"),
            HeaderName::from_static("anthropic-api-key"),
            HeaderName::from_static("anthropic-version"),
            HeaderName::from_static("anthropic-beta"),
        ])
}

fn resolve_api_key(state: &AppState, headers: &RequestHeaders) -> Result<String, ProxyError> {
    extract_api_key(state.config.upstream.api_key.as_deref(), headers)
        .ok_or_else(|| ProxyError::Authentication("Missing API key".to_string()))
}

/// `POST /v1/messages`: detect, rewrite, forward.
async fn messages_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let start = Instant::now();
    let request_id = headers.request_id().to_string();

    tracing::debug!(request_id = %request_id, peer = %peer, "Proxying messages request");

    let (response, plugin) = match forward_messages(&state, &headers, body, &request_id).await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Messages request failed");
            (e.into_response(), NO_PLUGIN.to_string())
        }
    };

    metrics::record_request(MESSAGES_PATH, response.status().as_u16(), &plugin, start);
    response
}

async fn forward_messages(
    state: &AppState,
    headers: &HeaderMap,
    body: Result<Bytes, BytesRejection>,
    request_id: &str,
) -> Result<(Response, String), ProxyError> {
    let inbound = RequestHeaders::from(headers);
    let api_key = resolve_api_key(state, &inbound)?;
    let raw = body?;
    let parsed = RequestBody::from_slice(&raw)
        .map_err(|e| ProxyError::InvalidRequest(format!("request body must be a JSON object: {}", e)))?;
    let stream = parsed.is_streaming();

    let (outbound, payload, plugin) = match state.registry.process(parsed, &inbound) {
        Dispatch::Matched(matched) => {
            let payload = matched
                .body
                .to_vec()
                .map_err(|e| ProxyError::Internal(e.to_string()))?;
            tracing::info!(
                request_id = %request_id,
                plugin = %matched.descriptor.name,
                version = %matched.descriptor.version,
                model = matched.body.model().unwrap_or("unknown"),
                stream,
                "Plugin applied"
            );
            (matched.headers(&api_key), Bytes::from(payload), matched.descriptor.name)
        }
        // Unclaimed requests go upstream byte-for-byte.
        Dispatch::Passthrough(_) => {
            tracing::debug!(request_id = %request_id, "No plugin matched, passing through");
            (default_headers(&api_key), raw, NO_PLUGIN.to_string())
        }
    };
    metrics::record_plugin_dispatch(&plugin);

    let upstream = state
        .upstream
        .post(MESSAGES_PATH, &outbound, payload, request_id)
        .await?;
    let response = relay(upstream, stream).await?;
    Ok((response, plugin))
}

/// `POST /v1/messages/count_tokens`: forwarded unchanged.
async fn count_tokens_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let start = Instant::now();
    let request_id = headers.request_id().to_string();

    let result = forward_count_tokens(&state, &headers, body, &request_id).await;

    let response = result.unwrap_or_else(|e| {
        tracing::warn!(request_id = %request_id, error = %e, "Token count request failed");
        e.into_response()
    });
    metrics::record_request(COUNT_TOKENS_PATH, response.status().as_u16(), NO_PLUGIN, start);
    response
}

async fn forward_count_tokens(
    state: &AppState,
    headers: &HeaderMap,
    body: Result<Bytes, BytesRejection>,
    request_id: &str,
) -> Result<Response, ProxyError> {
    let api_key = resolve_api_key(state, &RequestHeaders::from(headers))?;
    let raw = body?;
    let upstream = state
        .upstream
        .post(COUNT_TOKENS_PATH, &default_headers(&api_key), raw, request_id)
        .await?;
    relay(upstream, false).await
}

/// Fallback for unknown routes, in the API's error format.
pub async fn not_found() -> impl IntoResponse {
    let body = serde_json::json!({
        "type": "error",
        "error": { "type": "not_found_error", "message": "Not found" }
    });
    (StatusCode::NOT_FOUND, axum::Json(body))
}
