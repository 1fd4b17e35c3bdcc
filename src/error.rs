use crate::transport::TransportError;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path that caused the error (e.g., "messages[0].role", "cache.max_entries")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "request_normalizer", "config")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the gateway.
///
/// Every failure the core can produce falls into one of these categories; the
/// [`Gateway`](crate::gateway::Gateway) boundary turns them into HTTP-shaped replies.
#[derive(Debug, Error)]
pub enum Error {
    /// Input shape could not be coerced into a chat request.
    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    /// Missing credential or invalid gateway configuration.
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    /// Provider answered with a non-success status. Status and body are kept verbatim.
    #[error("Upstream error: HTTP {status}")]
    Upstream { status: u16, body: String },

    #[error("Network transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {message}{}", format_context(.context))]
    Internal {
        message: String,
        context: ErrorContext,
    },
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new validation error with structured context
    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Create a new internal error with structured context
    pub fn internal_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Internal {
            message: msg.into(),
            context,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::Validation { context, .. }
            | Error::Internal { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Transport failures and provider 5xx are transient; everything else will fail again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(_) => true,
            Error::Upstream { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Transport(e) if e.is_timeout())
    }

    /// Owned copy of an error handed to several callers at once.
    ///
    /// Wrapped library errors that cannot be cloned are rebuilt from their message;
    /// the variant, status and reply body stay the same.
    pub fn duplicate(&self) -> Self {
        match self {
            Error::Validation { message, context } => Error::Validation {
                message: message.clone(),
                context: context.clone(),
            },
            Error::Configuration { message, context } => Error::Configuration {
                message: message.clone(),
                context: context.clone(),
            },
            Error::Internal { message, context } => Error::Internal {
                message: message.clone(),
                context: context.clone(),
            },
            Error::Upstream { status, body } => Error::Upstream {
                status: *status,
                body: body.clone(),
            },
            Error::Transport(e) => Error::Transport(e.duplicate()),
            Error::Io(e) => Error::Io(std::io::Error::new(e.kind(), e.to_string())),
            Error::Serialization(e) => {
                Error::Serialization(<serde_json::Error as serde::de::Error>::custom(e))
            }
        }
    }

    /// HTTP status the gateway reports for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::Validation { .. } => 400,
            Error::Upstream { .. } | Error::Transport(_) => 502,
            _ => 500,
        }
    }
}
