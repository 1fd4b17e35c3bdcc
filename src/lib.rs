//! # chat-cache-gateway
//!
//! Caching gateway core for OpenAI-compatible chat completions.
//!
//! ## Overview
//!
//! Callers send loosely-structured JSON bodies (a bare `prompt`, a `transcript`, a
//! nested `payload.transcriptChunk`, or a full `messages` array). The gateway
//! normalizes them into one canonical [`ChatRequest`](types::ChatRequest), derives a
//! plain-text cache key, answers repeated requests from a bounded TTL/LRU cache and
//! otherwise forwards the request to the provider, normalizing whatever comes back
//! into a stable [`ChatResponse`](types::ChatResponse).
//!
//! HTTP routing, CORS and process setup belong to the host; the host hands the core
//! an already-parsed body and writes back the returned [`GatewayReply`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chat_cache_gateway::{Gateway, GatewayConfig};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> chat_cache_gateway::Result<()> {
//!     let gateway = Gateway::from_config(&GatewayConfig::from_env())?;
//!
//!     let reply = gateway.respond("POST", &json!({"prompt": "What is 2+2?"})).await;
//!     println!("{} {}", reply.status, reply.body);
//!
//!     // The same body again is served from the cache with "cached": true.
//!     let reply = gateway.respond("POST", &json!({"prompt": "What is 2+2?"})).await;
//!     assert_eq!(reply.body["cached"], true);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`types`] | Messages, normalized request and response |
//! | [`normalize`] | Request and response normalizers |
//! | [`cache`] | Key derivation, TTL/LRU store, single-flight |
//! | [`transport`] | Upstream client trait and HTTP implementation |
//! | [`resilience`] | Optional bounded retry |
//! | [`gateway`] | Orchestration and error-to-reply mapping |
//! | [`config`] | Defaults, environment and YAML configuration |

pub mod cache;
pub mod config;
pub mod gateway;
pub mod normalize;
pub mod resilience;
pub mod transport;
pub mod types;

pub use cache::{derive_key, CacheKey, CacheStore};
pub use config::GatewayConfig;
pub use gateway::{Gateway, GatewayReply};
pub use transport::UpstreamClient;
pub use types::{ChatRequest, ChatResponse, Message, MessageRole};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
