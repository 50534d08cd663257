//! Request shapes seen by plugins.
//!
//! Both types are deliberately loose: a plugin must be able to inspect any body a
//! client sends without failing, and must hand every field it does not own back
//! untouched.

use std::collections::BTreeMap;

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A chat completion request body.
///
/// Wraps the raw JSON object so unknown fields survive any rewrite. Accessors
/// treat a missing field and a field of the wrong type the same way: absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestBody(Map<String, Value>);

impl RequestBody {
    /// Parse a body from raw bytes. Anything but a JSON object is rejected.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.0)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn model(&self) -> Option<&str> {
        self.0.get("model").and_then(Value::as_str)
    }

    /// Whether the client asked for a streamed (SSE) response.
    pub fn is_streaming(&self) -> bool {
        self.0.get("stream").and_then(Value::as_bool).unwrap_or(false)
    }

    /// True when `tools` is missing, not an array, or an empty array.
    pub fn has_no_tools(&self) -> bool {
        match self.0.get("tools") {
            Some(Value::Array(tools)) => tools.is_empty(),
            _ => true,
        }
    }

    /// Text of every `system` block.
    ///
    /// The messages API accepts `system` either as a plain string or as a list of
    /// content blocks; both forms are handled.
    pub fn system_texts(&self) -> Vec<&str> {
        match self.0.get("system") {
            Some(Value::String(text)) => vec![text.as_str()],
            Some(Value::Array(blocks)) => blocks
                .iter()
                .filter_map(|block| block.get("text").and_then(Value::as_str))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The caller-supplied `metadata.user_id`, if present and non-empty.
    pub fn metadata_user_id(&self) -> Option<&str> {
        self.0
            .get("metadata")
            .and_then(|metadata| metadata.get("user_id"))
            .and_then(Value::as_str)
            .filter(|user_id| !user_id.is_empty())
    }

    /// Whether the caller supplied any `metadata.user_id` other than null or `""`.
    ///
    /// Unlike [`metadata_user_id`](Self::metadata_user_id), non-string ids count.
    pub fn has_metadata_user_id(&self) -> bool {
        match self.0.get("metadata").and_then(|metadata| metadata.get("user_id")) {
            None | Some(Value::Null) => false,
            Some(Value::String(user_id)) => !user_id.is_empty(),
            Some(_) => true,
        }
    }
}

/// Case-insensitive header map.
///
/// Names are lowercased on the way in; values that are not valid UTF-8 are
/// dropped when converting from an HTTP header map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequestHeaders(BTreeMap<String, String>);

impl RequestHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) -> Option<String> {
        self.0.insert(name.to_ascii_lowercase(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(&name.to_ascii_lowercase())
    }

    pub fn user_agent(&self) -> &str {
        self.get("user-agent").unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for RequestHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.insert(name.as_ref(), value);
        }
        headers
    }
}

impl From<&HeaderMap> for RequestHeaders {
    fn from(map: &HeaderMap) -> Self {
        let mut headers = Self::new();
        for (name, value) in map {
            let Ok(value) = value.to_str() else {
                continue;
            };
            // Repeated headers are folded into one comma-separated value.
            match headers.0.get_mut(name.as_str()) {
                Some(existing) => {
                    existing.push_str(", ");
                    existing.push_str(value);
                }
                None => {
                    headers.0.insert(name.as_str().to_string(), value.to_string());
                }
            }
        }
        headers
    }
}

/// Immutable identity of a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub name: String,
    pub version: String,
    pub description: String,
}

impl PluginDescriptor {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
        }
    }
}
