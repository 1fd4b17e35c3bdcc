//! Request normalization: loosely-shaped caller bodies into a canonical [`ChatRequest`].

use crate::cache::DEFAULT_EVENT;
use crate::types::{ChatRequest, Message, MessageRole, ResponseFormat};
use crate::{Error, ErrorContext, Result};
use serde_json::{Map, Value};
use tracing::debug;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f64 = 0.6;
pub const DEFAULT_MAX_TOKENS: u32 = 400;
pub const MAX_TOKENS_CAP: u32 = 1500;
pub const CLASSROOM_PERSONA: &str =
    "You are a helpful AI assistant for classroom support. Answer clearly and briefly.";
pub const FALLBACK_PROMPT: &str = "Please provide a short answer.";
pub const JSON_INSTRUCTION: &str =
    "\n\nIMPORTANT: You must respond with valid JSON only. No additional text.";

const TEMPERATURE_RANGE: (f64, f64) = (0.0, 2.0);

/// Defaults applied to fields the caller left out.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizerConfig {
    pub default_model: String,
    pub default_temperature: f64,
    pub default_max_tokens: u32,
    pub max_tokens_cap: u32,
    pub persona: String,
    pub fallback_prompt: String,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            default_model: DEFAULT_MODEL.to_string(),
            default_temperature: DEFAULT_TEMPERATURE,
            default_max_tokens: DEFAULT_MAX_TOKENS,
            max_tokens_cap: MAX_TOKENS_CAP,
            persona: CLASSROOM_PERSONA.to_string(),
            fallback_prompt: FALLBACK_PROMPT.to_string(),
        }
    }
}

/// Where the user-facing text of a request came from, in resolution order.
#[derive(Debug, Clone, PartialEq)]
pub enum TextSource {
    Messages(Vec<Message>),
    TranscriptChunk(String),
    Transcript(String),
    Prompt(String),
    Fallback,
}

impl TextSource {
    pub fn label(&self) -> &'static str {
        match self {
            TextSource::Messages(_) => "messages",
            TextSource::TranscriptChunk(_) => "payload.transcriptChunk",
            TextSource::Transcript(_) => "transcript",
            TextSource::Prompt(_) => "prompt",
            TextSource::Fallback => "fallback",
        }
    }
}

/// Output of [`RequestNormalizer::normalize`].
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub request: ChatRequest,
    /// `event`, else `type`, else `"generic"`.
    pub event: String,
    /// Identifying text for the cache key, taken before any fallback substitution.
    pub key_text: String,
    pub source: &'static str,
}

/// Read-only view over an untyped request body.
struct RawInput<'a> {
    body: &'a Map<String, Value>,
}

impl<'a> RawInput<'a> {
    fn field(&self, name: &str) -> Option<&'a Value> {
        self.body.get(name).filter(|v| !v.is_null())
    }

    fn nested(&self, path: &[&str]) -> Option<&'a Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.field(first)?;
        for segment in rest {
            current = current.get(segment)?;
        }
        Some(current).filter(|v| !v.is_null())
    }

    fn text(&self, path: &[&str]) -> Option<&'a str> {
        self.nested(path)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    fn event(&self) -> String {
        self.text(&["event"])
            .or_else(|| self.text(&["type"]))
            .unwrap_or(DEFAULT_EVENT)
            .to_string()
    }

    /// First of `payload.transcriptChunk`, `transcript`, `prompt`.
    fn identifying_text(&self) -> Option<(&'static str, &'a str)> {
        [
            ("payload.transcriptChunk", &["payload", "transcriptChunk"][..]),
            ("transcript", &["transcript"][..]),
            ("prompt", &["prompt"][..]),
        ]
        .into_iter()
        .find_map(|(label, path)| self.text(path).map(|t| (label, t)))
    }

    fn grade_level(&self) -> Option<String> {
        [&["gradeLevel"][..], &["payload", "context", "gradeLevel"][..]]
            .into_iter()
            .filter_map(|path| self.nested(path))
            .find_map(|v| match v {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
    }

    fn response_format(&self) -> Option<ResponseFormat> {
        let format = self.field("response_format")?;
        let name = format
            .get("type")
            .or_else(|| format.get("kind"))
            .and_then(Value::as_str);
        match name.and_then(ResponseFormat::from_wire) {
            Some(parsed) => Some(parsed),
            None => {
                debug!(response_format = %format, "ignoring unsupported response_format");
                None
            }
        }
    }
}

/// Converts arbitrary caller documents into a [`ChatRequest`].
///
/// Missing fields are defaulted, never rejected. Only structurally wrong types
/// (a non-object body, malformed `messages`, non-numeric sampling parameters)
/// produce [`Error::Validation`].
#[derive(Debug, Clone, Default)]
pub struct RequestNormalizer {
    config: NormalizerConfig,
}

impl RequestNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    pub fn normalize(&self, raw: &Value) -> Result<Normalized> {
        let empty = Map::new();
        let body = match raw {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(invalid(
                    format!("request body must be a JSON object, got {}", type_name(other)),
                    "$",
                ))
            }
        };
        let input = RawInput { body };

        let source = self.resolve_source(&input)?;
        let key_text = match (input.identifying_text(), &source) {
            (Some((_, text)), _) => text.to_string(),
            (None, TextSource::Messages(messages)) => messages
                .iter()
                .rev()
                .find(|m| m.role == MessageRole::User)
                .or_else(|| messages.last())
                .map(|m| m.content.clone())
                .unwrap_or_default(),
            (None, _) => String::new(),
        };
        let label = source.label();

        let mut messages = self.assemble_messages(source);
        if let Some(level) = input.grade_level() {
            messages.insert(
                0,
                Message::system(format!("Answer targeted for grade level: {}.", level)),
            );
        }

        let response_format = input.response_format();
        if response_format == Some(ResponseFormat::JsonObject) {
            // applies to whichever message ended up last
            if let Some(last) = messages.last_mut() {
                if !last.content.to_lowercase().contains("json") {
                    last.content.push_str(JSON_INSTRUCTION);
                }
            }
        }

        let mut request = ChatRequest::new(
            self.model(&input)?,
            messages,
            self.temperature(&input)?,
            self.max_tokens(&input)?,
        );
        if let Some(format) = response_format {
            request = request.with_response_format(format);
        }

        Ok(Normalized {
            request,
            event: input.event(),
            key_text,
            source: label,
        })
    }

    fn resolve_source(&self, input: &RawInput<'_>) -> Result<TextSource> {
        if let Some(value) = input.field("messages") {
            let messages = parse_messages(value)?;
            if !messages.is_empty() {
                return Ok(TextSource::Messages(messages));
            }
        }
        Ok(match input.identifying_text() {
            Some(("payload.transcriptChunk", text)) => TextSource::TranscriptChunk(text.to_string()),
            Some(("transcript", text)) => TextSource::Transcript(text.to_string()),
            Some((_, text)) => TextSource::Prompt(text.to_string()),
            None => TextSource::Fallback,
        })
    }

    fn assemble_messages(&self, source: TextSource) -> Vec<Message> {
        let text = match source {
            TextSource::Messages(mut messages) => {
                if !messages.iter().any(|m| m.role == MessageRole::System) {
                    messages.insert(0, Message::system(self.config.persona.clone()));
                }
                if !messages.iter().any(|m| m.role == MessageRole::User) {
                    messages.push(Message::user(self.config.fallback_prompt.clone()));
                }
                return messages;
            }
            TextSource::TranscriptChunk(text)
            | TextSource::Transcript(text)
            | TextSource::Prompt(text) => text,
            TextSource::Fallback => self.config.fallback_prompt.clone(),
        };
        vec![
            Message::system(self.config.persona.clone()),
            Message::user(text),
        ]
    }

    fn model(&self, input: &RawInput<'_>) -> Result<String> {
        match input.field("model") {
            None => Ok(self.config.default_model.clone()),
            Some(Value::String(s)) if s.is_empty() => Ok(self.config.default_model.clone()),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Err(invalid(
                format!("model must be a string, got {}", type_name(other)),
                "model",
            )),
        }
    }

    fn temperature(&self, input: &RawInput<'_>) -> Result<f64> {
        match input.field("temperature") {
            None => Ok(self.config.default_temperature),
            Some(v) => v
                .as_f64()
                .map(|t| t.clamp(TEMPERATURE_RANGE.0, TEMPERATURE_RANGE.1))
                .ok_or_else(|| {
                    invalid(
                        format!("temperature must be a number, got {}", type_name(v)),
                        "temperature",
                    )
                }),
        }
    }

    fn max_tokens(&self, input: &RawInput<'_>) -> Result<u32> {
        let cap = self.config.max_tokens_cap.max(1);
        match input.field("max_tokens") {
            None => Ok(self.config.default_max_tokens.clamp(1, cap)),
            Some(v) => v
                .as_f64()
                .map(|n| n.trunc().clamp(1.0, f64::from(cap)) as u32)
                .ok_or_else(|| {
                    invalid(
                        format!("max_tokens must be a number, got {}", type_name(v)),
                        "max_tokens",
                    )
                }),
        }
    }
}

fn parse_messages(value: &Value) -> Result<Vec<Message>> {
    let items = value.as_array().ok_or_else(|| {
        invalid(
            format!(
                "messages must be an array of {{role, content}} objects, got {}",
                type_name(value)
            ),
            "messages",
        )
    })?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| -> Result<Message> {
            let role = item
                .get("role")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid("role must be a string", format!("messages[{}].role", i)))?
                .parse::<MessageRole>()
                .map_err(|e| invalid(e, format!("messages[{}].role", i)))?;
            let content = item.get("content").and_then(Value::as_str).ok_or_else(|| {
                invalid("content must be a string", format!("messages[{}].content", i))
            })?;
            Ok(Message::new(role, content))
        })
        .collect()
}

fn invalid(message: impl Into<String>, field: impl Into<String>) -> Error {
    Error::validation_with_context(
        message,
        ErrorContext::new()
            .with_field_path(field)
            .with_source("request_normalizer"),
    )
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
