//! Normalized chat-completion request.

use super::message::Message;
use serde::{Deserialize, Serialize};

/// Response-format directive forwarded to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    JsonObject,
}

impl ResponseFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseFormat::JsonObject => "json_object",
        }
    }

    /// Parse a wire name (`"json_object"`). Unknown formats are not forwarded.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "json_object" => Some(ResponseFormat::JsonObject),
            _ => None,
        }
    }
}

/// Canonical request produced by the request normalizer.
///
/// Built once and never mutated afterwards; the upstream payload is derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f64,
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

impl ChatRequest {
    pub fn new(
        model: impl Into<String>,
        messages: Vec<Message>,
        temperature: f64,
        max_tokens: u32,
    ) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature,
            max_tokens,
            response_format: None,
        }
    }

    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Provider payload: model, messages, temperature, max_tokens and, only when
    /// requested, the response-format directive.
    pub fn to_payload(&self) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": self.messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });
        if let Some(format) = self.response_format {
            body["response_format"] = serde_json::json!({ "type": format.as_str() });
        }
        body
    }
}
