use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

use crate::http::server::{AppState, COUNT_TOKENS_PATH, MESSAGES_PATH};
use crate::plugins::PluginDescriptor;

#[derive(Serialize)]
pub struct PluginListing {
    pub plugins: Vec<PluginDescriptor>,
    pub total: usize,
}

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub timestamp: String,
    pub api_key_configured: bool,
    pub target: String,
    pub plugins: usize,
}

pub async fn get_plugins(State(state): State<AppState>) -> Json<PluginListing> {
    let plugins = state.registry.list();
    Json(PluginListing {
        total: plugins.len(),
        plugins,
    })
}

pub async fn get_health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now().to_rfc3339(),
        api_key_configured: state.config.upstream.api_key.is_some(),
        target: state.upstream.base_url().to_string(),
        plugins: state.registry.len(),
    })
}

pub async fn get_root() -> Json<Value> {
    Json(json!({
        "name": "Identity Proxy (plugin-based)",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Reverse proxy that rewrites third-party client requests through protocol plugins",
        "endpoints": {
            "messages": format!("POST {}", MESSAGES_PATH),
            "count_tokens": format!("POST {}", COUNT_TOKENS_PATH),
            "plugins": "GET /plugins",
            "health": "GET /health"
        }
    }))
}
