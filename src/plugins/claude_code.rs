//! Identity-impersonation plugin.
//!
//! Makes requests from third-party chat clients look like they came from the
//! first-party CLI: the system prompt is replaced with the CLI's identity block,
//! a stable session id is attached, and the CLI's header fingerprint is used
//! upstream.
//!
//! # Detection
//! Either condition is enough:
//! 1. the user agent contains a known third-party client marker;
//! 2. the request carries no tools and no system block already identifies as the
//!    CLI.
//!
//! Requests that already identify as the CLI and use tools are left alone.

use serde_json::{json, Value};

use crate::config::schema::ClaudeCodePluginConfig;
use crate::plugins::plugin::ProtocolPlugin;
use crate::plugins::session::SessionIdentityCache;
use crate::plugins::types::{PluginDescriptor, RequestBody, RequestHeaders};

/// Phrase present in every system prompt the CLI sends.
pub const IDENTITY_MARKER: &str = "You are Claude Code";

/// System prompt text the CLI sends.
pub const IDENTITY_TEXT: &str = "You are Claude Code, Anthropic's official CLI for Claude.";

/// Header fingerprint of CLI 2.0.24.
pub const FINGERPRINT_HEADERS: &[(&str, &str)] = &[
    ("accept", "application/json"),
    ("anthropic-beta", "claude-code-20250219"),
    ("anthropic-dangerous-direct-browser-access", "true"),
    ("anthropic-version", "2023-06-01"),
    ("content-type", "application/json"),
    ("user-agent", "claude-cli/2.0.24 (external, cli)"),
    ("x-app", "cli"),
    ("x-stainless-arch", "x64"),
    ("x-stainless-lang", "js"),
    ("x-stainless-os", "Linux"),
    ("x-stainless-runtime", "node"),
    ("x-stainless-runtime-version", "v22.16.0"),
];

pub struct ClaudeCodePlugin {
    descriptor: PluginDescriptor,
    client_markers: Vec<String>,
    sessions: SessionIdentityCache,
}

impl ClaudeCodePlugin {
    pub fn new(config: &ClaudeCodePluginConfig) -> Self {
        Self {
            descriptor: PluginDescriptor::new(
                "ClaudeCode",
                "1.0.0",
                "Transform requests to Claude Code CLI format",
            ),
            client_markers: config.client_markers.clone(),
            sessions: SessionIdentityCache::new(
                config.session_window_secs,
                config.session_label.clone(),
            ),
        }
    }

    /// The fixed single-block system prompt.
    pub fn system_template() -> Value {
        json!([{
            "type": "text",
            "text": IDENTITY_TEXT,
            "cache_control": { "type": "ephemeral" }
        }])
    }

    fn is_third_party_client(&self, headers: &RequestHeaders) -> bool {
        let user_agent = headers.user_agent();
        self.client_markers
            .iter()
            .any(|marker| user_agent.contains(marker.as_str()))
    }
}

impl Default for ClaudeCodePlugin {
    fn default() -> Self {
        Self::new(&ClaudeCodePluginConfig::default())
    }
}

impl ProtocolPlugin for ClaudeCodePlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn detect(&self, body: &RequestBody, headers: &RequestHeaders) -> bool {
        if self.is_third_party_client(headers) {
            return true;
        }
        let identifies_as_cli = body
            .system_texts()
            .iter()
            .any(|text| text.contains(IDENTITY_MARKER));
        body.has_no_tools() && !identifies_as_cli
    }

    fn transform(&self, mut body: RequestBody, _headers: &RequestHeaders) -> RequestBody {
        body.insert("system", Self::system_template());

        if !body.has_metadata_user_id() {
            let identity = self.sessions.get();
            body.insert("metadata", json!({ "user_id": identity.user_id }));
        }

        body.remove("thinking");
        body
    }

    fn headers(&self, api_key: &str) -> RequestHeaders {
        let mut headers: RequestHeaders = FINGERPRINT_HEADERS.iter().copied().collect();
        headers.insert("authorization", format!("Bearer {}", api_key));
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(value: Value) -> RequestBody {
        serde_json::from_value(value).unwrap()
    }

    fn ua(agent: &str) -> RequestHeaders {
        [("user-agent", agent)].into_iter().collect()
    }

    #[test]
    fn test_detects_bare_request_for_any_user_agent() {
        let plugin = ClaudeCodePlugin::default();
        let b = body(json!({"model": "m", "messages": []}));

        assert!(plugin.detect(&b, &RequestHeaders::new()));
        assert!(plugin.detect(&b, &ua("curl/8.0")));
        assert!(plugin.detect(&b, &ua("claude-cli/2.0.24 (external, cli)")));
    }

    #[test]
    fn test_detects_third_party_agent_even_with_tools() {
        let plugin = ClaudeCodePlugin::default();
        let b = body(json!({
            "tools": [{"name": "search"}],
            "system": [{"type": "text", "text": IDENTITY_TEXT}]
        }));

        assert!(plugin.detect(&b, &ua("CherryStudio/1.5.2")));
        assert!(!plugin.detect(&b, &ua("curl/8.0")));
    }

    #[test]
    fn test_skips_cli_without_tools() {
        let plugin = ClaudeCodePlugin::default();
        let b = body(json!({"tools": [], "system": IDENTITY_TEXT}));
        assert!(!plugin.detect(&b, &RequestHeaders::new()));
    }

    #[test]
    fn test_tools_present_without_marker_not_detected() {
        let plugin = ClaudeCodePlugin::default();
        let b = body(json!({"tools": [{"name": "t"}], "system": "custom"}));
        assert!(!plugin.detect(&b, &ua("SomeClient/1.0")));
    }

    #[test]
    fn test_transform_rewrites_owned_fields_only() {
        let plugin = ClaudeCodePlugin::default();
        let b = body(json!({
            "model": "claude-sonnet",
            "messages": [{"role": "user", "content": "hi"}],
            "system": [{"type": "text", "text": "You are a helpful assistant"}],
            "thinking": {"type": "enabled", "budget_tokens": 1024},
            "foo": "bar"
        }));

        let out = plugin.transform(b, &RequestHeaders::new());
        assert_eq!(out.get("system"), Some(&ClaudeCodePlugin::system_template()));
        assert!(!out.contains("thinking"));
        assert_eq!(out.get("foo"), Some(&json!("bar")));
        assert_eq!(out.model(), Some("claude-sonnet"));
        assert_eq!(
            out.get("messages"),
            Some(&json!([{"role": "user", "content": "hi"}]))
        );
        let user_id = out.metadata_user_id().unwrap();
        assert!(user_id.starts_with("user_proxy_account__session_cherry-"));
    }

    #[test]
    fn test_transform_keeps_caller_user_id() {
        let plugin = ClaudeCodePlugin::default();
        let b = body(json!({"metadata": {"user_id": "caller-supplied"}}));

        let out = plugin.transform(b, &RequestHeaders::new());
        assert_eq!(out.metadata_user_id(), Some("caller-supplied"));
    }

    #[test]
    fn test_transform_keeps_non_string_user_id_and_metadata() {
        let plugin = ClaudeCodePlugin::default();
        let b = body(json!({"metadata": {"user_id": 12345, "x": 1}}));

        let out = plugin.transform(b, &RequestHeaders::new());
        assert_eq!(out.get("metadata"), Some(&json!({"user_id": 12345, "x": 1})));
    }

    #[test]
    fn test_transform_is_idempotent() {
        let plugin = ClaudeCodePlugin::default();
        let b = body(json!({"messages": [], "tools": []}));

        let once = plugin.transform(b, &RequestHeaders::new());
        let twice = plugin.transform(once.clone(), &RequestHeaders::new());

        assert_eq!(twice.get("system"), Some(&ClaudeCodePlugin::system_template()));
        assert_eq!(once.metadata_user_id(), twice.metadata_user_id());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_headers_differ_only_in_authorization() {
        let plugin = ClaudeCodePlugin::default();
        let mut a = plugin.headers("key-one");
        let mut b = plugin.headers("key-two");

        assert_eq!(a.get("authorization"), Some("Bearer key-one"));
        assert_eq!(b.get("authorization"), Some("Bearer key-two"));

        a.remove("authorization");
        b.remove("authorization");
        assert_eq!(a, b);
        assert_eq!(a, FINGERPRINT_HEADERS.iter().copied().collect());
    }

    #[test]
    fn test_configured_markers() {
        let config = ClaudeCodePluginConfig {
            client_markers: vec!["ChatBox".into(), "LobeChat".into()],
            ..Default::default()
        };
        let plugin = ClaudeCodePlugin::new(&config);
        let b = body(json!({"tools": [{"name": "t"}]}));

        assert!(plugin.detect(&b, &ua("LobeChat/2")));
        assert!(!plugin.detect(&b, &ua("CherryStudio/1.0")));
    }
}
