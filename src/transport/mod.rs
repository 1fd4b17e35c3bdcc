//! # Upstream Transport
//!
//! The [`UpstreamClient`] trait is the seam between the gateway and the
//! chat-completion provider. [`HttpUpstream`] is the reqwest implementation for
//! OpenAI-compatible endpoints; tests substitute their own implementations.

mod http;

pub use http::{HttpUpstream, CHAT_COMPLETIONS_PATH, DEFAULT_BASE_URL};

use crate::types::ChatRequest;
use crate::Result;
use async_trait::async_trait;

/// A single call to the chat-completion provider.
///
/// Implementations must report a missing credential as
/// [`Error::Configuration`](crate::Error::Configuration) before any I/O, a non-2xx
/// reply as [`Error::Upstream`](crate::Error::Upstream) with status and body
/// untouched, and connectivity failures as [`Error::Transport`](crate::Error::Transport).
/// No retries happen here.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn send(&self, request: &ChatRequest) -> Result<serde_json::Value>;

    fn name(&self) -> &'static str;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A transport failure observed by another caller of the same in-flight request.
    #[error("HTTP error: {message}")]
    Shared { message: String, timed_out: bool },

    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        match self {
            TransportError::Http(e) => e.is_timeout(),
            TransportError::Shared { timed_out, .. } => *timed_out,
            TransportError::Other(_) => false,
        }
    }

    pub(crate) fn duplicate(&self) -> Self {
        match self {
            TransportError::Http(e) => TransportError::Shared {
                message: e.to_string(),
                timed_out: e.is_timeout(),
            },
            TransportError::Shared { message, timed_out } => TransportError::Shared {
                message: message.clone(),
                timed_out: *timed_out,
            },
            TransportError::Other(message) => TransportError::Other(message.clone()),
        }
    }
}
