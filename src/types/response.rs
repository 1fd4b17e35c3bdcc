//! Normalized chat response.

use serde::{Deserialize, Serialize};

/// The only success shape callers observe.
///
/// `content` is always a string; extraction failures yield `""`. `raw` keeps the
/// provider payload for diagnostics and is never serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    #[serde(default)]
    pub cached: bool,
    #[serde(skip)]
    pub raw: Option<serde_json::Value>,
}

impl ChatResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            cached: false,
            raw: None,
        }
    }

    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = Some(raw);
        self
    }

    /// Copy of this response marked as served from the cache.
    pub fn as_cached(&self) -> Self {
        Self {
            cached: true,
            ..self.clone()
        }
    }

    /// Outbound body: `{"choices":[{"message":{"content":...}}]}`, plus `"cached": true` on a hit.
    pub fn to_body(&self) -> serde_json::Value {
        let mut body = serde_json::json!({
            "choices": [{ "message": { "content": self.content } }]
        });
        if self.cached {
            body["cached"] = serde_json::Value::Bool(true);
        }
        body
    }
}
