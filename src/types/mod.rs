//! # Types Module
//!
//! Canonical data types shared by the normalizers, the cache and the upstream client.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Message`] | Chat message with role and plain-text content |
//! | [`MessageRole`] | Message role (system, user, assistant) |
//! | [`ChatRequest`] | Normalized, immutable chat-completion request |
//! | [`ResponseFormat`] | Optional response-format directive |
//! | [`ChatResponse`] | Normalized response, the only success shape callers see |
//!
//! ## Example
//!
//! ```rust
//! use chat_cache_gateway::types::{ChatRequest, Message};
//!
//! let request = ChatRequest::new(
//!     "gpt-4o-mini",
//!     vec![Message::system("Be brief."), Message::user("What is 2+2?")],
//!     0.6,
//!     400,
//! );
//! assert_eq!(request.messages.len(), 2);
//! ```

pub mod message;
pub mod request;
pub mod response;

pub use message::{Message, MessageRole};
pub use request::{ChatRequest, ResponseFormat};
pub use response::ChatResponse;
