//! Outbound status/body pairs.

use crate::types::ChatResponse;
use crate::Error;
use serde::Serialize;
use serde_json::{json, Value};

/// What the hosting HTTP layer writes back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayReply {
    pub status: u16,
    pub body: Value,
}

impl GatewayReply {
    pub fn success(response: &ChatResponse) -> Self {
        Self {
            status: 200,
            body: response.to_body(),
        }
    }

    pub fn method_not_allowed() -> Self {
        Self {
            status: 405,
            body: json!({ "error": "Method not allowed" }),
        }
    }

    /// Map an error to `{error, status?, details?, body?}`.
    ///
    /// Provider errors keep their original status and body so callers can tell
    /// them apart from gateway-side failures.
    pub fn from_error(err: &Error) -> Self {
        let body = match err {
            Error::Upstream { status, body } => json!({
                "error": "Upstream provider request failed",
                "status": status,
                "body": body,
            }),
            Error::Transport(e) => json!({
                "error": "Upstream provider unreachable",
                "details": e.to_string(),
            }),
            Error::Configuration { message, .. } => json!({ "error": message }),
            Error::Validation { .. } => json!({
                "error": "Invalid request body",
                "details": err.to_string(),
            }),
            _ => json!({
                "error": "Internal error",
                "details": err.to_string(),
            }),
        };
        Self {
            status: err.http_status(),
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
