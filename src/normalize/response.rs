//! Response normalization: provider payloads into a stable [`ChatResponse`].

use crate::types::ChatResponse;
use serde_json::Value;

/// Text of the first choice, or `""` when any level of the path is missing or not a string.
pub fn extract_content(raw: &Value) -> &str {
    raw.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .unwrap_or_default()
}

/// Converts raw provider responses into [`ChatResponse`]. Never fails.
#[derive(Debug, Clone, Default)]
pub struct ResponseNormalizer {
    canonicalize_json: bool,
}

impl ResponseNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-serialize contents that parse as JSON in compact form.
    pub fn with_canonical_json(mut self, enabled: bool) -> Self {
        self.canonicalize_json = enabled;
        self
    }

    pub fn normalize(&self, raw: Value) -> ChatResponse {
        let content = extract_content(&raw);
        let content = if self.canonicalize_json {
            canonical_json(content).unwrap_or_else(|| content.to_string())
        } else {
            content.to_string()
        };
        ChatResponse::new(content).with_raw(raw)
    }
}

fn canonical_json(content: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(content).ok()?;
    serde_json::to_string(&parsed).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn completion(content: Value) -> Value {
        json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
        })
    }

    #[test]
    fn extracts_first_choice_content() {
        let resp = ResponseNormalizer::new().normalize(completion(json!("2 + 2 = 4")));
        assert_eq!(resp.content, "2 + 2 = 4");
        assert!(!resp.cached);
        assert_eq!(resp.raw.as_ref().and_then(|r| r.get("id")), Some(&json!("chatcmpl-123")));
    }

    #[test]
    fn missing_levels_yield_empty_content() {
        let normalizer = ResponseNormalizer::new();
        for raw in [
            json!({}),
            json!({"choices": []}),
            json!({"choices": [{}]}),
            json!({"choices": [{"message": {}}]}),
            completion(Value::Null),
            completion(json!(42)),
            json!("not an object"),
        ] {
            assert_eq!(normalizer.normalize(raw).content, "");
        }
    }

    #[test]
    fn canonicalizes_json_content_when_enabled() {
        let raw = completion(json!("{\n  \"a\": [1, 2]\n}"));
        let plain = ResponseNormalizer::new().normalize(raw.clone());
        assert_eq!(plain.content, "{\n  \"a\": [1, 2]\n}");

        let canonical = ResponseNormalizer::new()
            .with_canonical_json(true)
            .normalize(raw);
        assert_eq!(canonical.content, "{\"a\":[1,2]}");
    }

    #[test]
    fn non_json_content_is_untouched_when_canonicalizing() {
        let resp = ResponseNormalizer::new()
            .with_canonical_json(true)
            .normalize(completion(json!("Sure! {not json}")));
        assert_eq!(resp.content, "Sure! {not json}");
    }
}
