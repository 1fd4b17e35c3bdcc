//! # Normalization Module
//!
//! Both edges of the gateway are loosely typed: callers send whatever shape their
//! client grew up with, and providers answer with nested payloads that may lack
//! fields. This module pins both down.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`RequestNormalizer`] | Caller body → [`ChatRequest`](crate::types::ChatRequest) + cache-key inputs |
//! | [`ResponseNormalizer`] | Provider payload → [`ChatResponse`](crate::types::ChatResponse) |
//!
//! ## Example
//!
//! ```rust
//! use chat_cache_gateway::normalize::RequestNormalizer;
//! use serde_json::json;
//!
//! let normalized = RequestNormalizer::default()
//!     .normalize(&json!({"prompt": "What is 2+2?", "max_tokens": 5000}))
//!     .unwrap();
//! assert_eq!(normalized.request.max_tokens, 1500);
//! assert_eq!(normalized.event, "generic");
//! ```

pub mod request;
pub mod response;

pub use request::{
    Normalized, NormalizerConfig, RequestNormalizer, TextSource, CLASSROOM_PERSONA,
    DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE, FALLBACK_PROMPT, JSON_INSTRUCTION,
    MAX_TOKENS_CAP,
};
pub use response::{extract_content, ResponseNormalizer};
