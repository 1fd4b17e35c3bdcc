use super::{TransportError, UpstreamClient};
use crate::config::{GatewayConfig, API_KEY_ENV};
use crate::types::ChatRequest;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use reqwest::Proxy;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

/// OpenAI-compatible chat-completions client.
pub struct HttpUpstream {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpUpstream {
    /// Build the client. A missing credential is not an error here; it surfaces on
    /// the first [`send`](UpstreamClient::send).
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(32)
            .pool_idle_timeout(Some(Duration::from_secs(90)));

        if let Some(ref proxy_url) = config.proxy_url {
            match Proxy::all(proxy_url) {
                Ok(proxy) => builder = builder.proxy(proxy),
                Err(e) => warn!(proxy = %proxy_url, error = %e, "ignoring invalid proxy url"),
            }
        }

        let client = builder.build().map_err(TransportError::Http)?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}{}",
                config.base_url.trim_end_matches('/'),
                CHAT_COMPLETIONS_PATH
            ),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstream {
    async fn send(&self, request: &ChatRequest) -> Result<serde_json::Value> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            Error::configuration_with_context(
                format!("Missing {} environment variable", API_KEY_ENV),
                ErrorContext::new()
                    .with_field_path(API_KEY_ENV)
                    .with_source("http_upstream"),
            )
        })?;

        // Our own correlation id. Providers may ignore it.
        let request_id = Uuid::new_v4().to_string();
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .header("x-request-id", &request_id)
            .json(&request.to_payload())
            .send()
            .await
            .map_err(|e| {
                let err = TransportError::Http(e);
                warn!(
                    request_id = %request_id,
                    timeout = err.is_timeout(),
                    error = %err,
                    "upstream unreachable"
                );
                err
            })?;

        let status = response.status();
        let body = response.text().await.map_err(TransportError::Http)?;

        if !status.is_success() {
            warn!(
                status = status.as_u16(),
                request_id = %request_id,
                body = %body,
                "upstream returned an error status"
            );
            return Err(Error::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        debug!(status = status.as_u16(), request_id = %request_id, bytes = body.len(), "upstream replied");
        Ok(serde_json::from_str(&body)?)
    }

    fn name(&self) -> &'static str {
        "openai-http"
    }
}
