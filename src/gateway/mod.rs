//! # Gateway
//!
//! Orchestrates one request through the core:
//!
//! ```text
//! Received → Normalized → CacheChecked ─┬─ HitReturn ────────────────────────────────┐
//!                                       └─ MissDispatch → UpstreamAwait → Normalize   │
//!                                                         → Store → Return ───────────┴→ Terminal
//! ```
//!
//! Validation and configuration failures end the request before any upstream call.
//! Upstream and transport failures end it without touching the cache. Every error is
//! converted to an HTTP-shaped [`GatewayReply`] in [`Gateway::respond`].

mod reply;

pub use reply::GatewayReply;

use crate::cache::{CacheKey, CacheKeyDeriver, CacheStore, SingleFlight};
use crate::config::GatewayConfig;
use crate::normalize::{RequestNormalizer, ResponseNormalizer};
use crate::resilience::RetryPolicy;
use crate::transport::{HttpUpstream, UpstreamClient};
use crate::types::{ChatRequest, ChatResponse};
use crate::{Error, Result};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, field, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

/// Request lifecycle stages, recorded on log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Received,
    Normalized,
    CacheChecked,
    HitReturn,
    MissDispatch,
    UpstreamAwait,
    Normalize,
    Store,
    Return,
    Terminal,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Normalized => "normalized",
            Stage::CacheChecked => "cache_checked",
            Stage::HitReturn => "hit_return",
            Stage::MissDispatch => "miss_dispatch",
            Stage::UpstreamAwait => "upstream_await",
            Stage::Normalize => "normalize",
            Stage::Store => "store",
            Stage::Return => "return",
            Stage::Terminal => "terminal",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The caching gateway.
///
/// Construct one per process and share it (`Arc<Gateway>`); the cache lives exactly
/// as long as the gateway (or the [`CacheStore`] handed to [`with_store`](Self::with_store)).
pub struct Gateway {
    requests: RequestNormalizer,
    keys: CacheKeyDeriver,
    store: Arc<CacheStore>,
    cache_enabled: bool,
    flights: SingleFlight<ChatResponse, Error>,
    upstream: Arc<dyn UpstreamClient>,
    retry: RetryPolicy,
    responses: ResponseNormalizer,
}

impl Gateway {
    pub fn new(config: &GatewayConfig, upstream: Arc<dyn UpstreamClient>) -> Self {
        Self {
            requests: RequestNormalizer::new(config.normalizer.clone()),
            keys: CacheKeyDeriver::new(),
            store: Arc::new(CacheStore::from_config(&config.cache)),
            cache_enabled: config.cache.enabled,
            flights: SingleFlight::new(),
            upstream,
            retry: config.retry.clone(),
            responses: ResponseNormalizer::new().with_canonical_json(config.canonicalize_json),
        }
    }

    /// Validate `config` and talk to the provider over HTTP.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        config.validate()?;
        let upstream = HttpUpstream::new(config)?;
        info!(
            endpoint = upstream.endpoint(),
            credential = upstream.has_credential(),
            cache_enabled = config.cache.enabled,
            max_entries = config.cache.max_entries,
            ttl_secs = config.cache.ttl.as_secs(),
            "gateway configured"
        );
        Ok(Self::new(config, Arc::new(upstream)))
    }

    /// Use an externally owned store, e.g. one shared by several gateways.
    pub fn with_store(mut self, store: Arc<CacheStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_key_deriver(mut self, keys: CacheKeyDeriver) -> Self {
        self.keys = keys;
        self
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// Run one already-parsed request body through the gateway.
    pub async fn handle(&self, raw: &Value) -> Result<ChatResponse> {
        let span = info_span!(
            "gateway_request",
            request_id = %Uuid::new_v4(),
            event = field::Empty
        );
        async {
            let result = self.process(raw).await;
            if let Err(ref e) = result {
                warn!(
                    stage = %Stage::Terminal,
                    status = e.http_status(),
                    timeout = e.is_timeout(),
                    error = %e,
                    "request failed"
                );
            }
            result
        }
        .instrument(span)
        .await
    }

    /// [`handle`](Self::handle) plus conversion to the outbound status/body. Never fails.
    pub async fn respond(&self, method: &str, raw: &Value) -> GatewayReply {
        if !method.eq_ignore_ascii_case("POST") {
            return GatewayReply::method_not_allowed();
        }
        match self.handle(raw).await {
            Ok(response) => GatewayReply::success(&response),
            Err(e) => GatewayReply::from_error(&e),
        }
    }

    async fn process(&self, raw: &Value) -> Result<ChatResponse> {
        debug!(stage = %Stage::Received);
        let normalized = self.requests.normalize(raw)?;
        Span::current().record("event", normalized.event.as_str());
        let key = self.keys.derive_for(&normalized);
        debug!(
            stage = %Stage::Normalized,
            key = %key,
            source = normalized.source,
            messages = normalized.request.messages.len(),
        );

        if self.cache_enabled {
            if let Some(hit) = self.store.get(&key) {
                debug!(stage = %Stage::HitReturn, key = %key, "served from cache");
                return Ok(hit.as_cached());
            }
        }
        debug!(stage = %Stage::CacheChecked, key = %key, "cache miss");

        let request = normalized.request;
        let (outcome, executed) = self
            .flights
            .run(&key, || self.dispatch(&key, &request))
            .await;
        if !executed {
            debug!(key = %key, ok = outcome.is_ok(), "joined in-flight upstream call");
        }
        outcome.map_err(|shared| {
            Arc::try_unwrap(shared).unwrap_or_else(|shared| shared.duplicate())
        })
    }

    async fn dispatch(&self, key: &CacheKey, request: &ChatRequest) -> Result<ChatResponse> {
        // An earlier flight for this key may have finished between our lookup and now.
        if self.cache_enabled && self.store.has(key) {
            if let Some(hit) = self.store.get(key) {
                return Ok(hit.as_cached());
            }
        }

        info!(
            stage = %Stage::MissDispatch,
            upstream = self.upstream.name(),
            model = %request.model,
            max_tokens = request.max_tokens,
            "dispatching to upstream"
        );
        let started = Instant::now();
        debug!(stage = %Stage::UpstreamAwait);
        let raw = self.retry.run(|| self.upstream.send(request)).await?;

        debug!(stage = %Stage::Normalize);
        let response = self.responses.normalize(raw);

        if self.cache_enabled {
            debug!(stage = %Stage::Store, key = %key);
            self.store.set(key.clone(), response.clone());
        }
        info!(
            stage = %Stage::Return,
            latency_ms = started.elapsed().as_millis() as u64,
            content_len = response.content.len(),
            "upstream response ready"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        calls: AtomicUsize,
        last: Mutex<Option<ChatRequest>>,
    }

    #[async_trait]
    impl UpstreamClient for Recording {
        async fn send(&self, request: &ChatRequest) -> Result<Value> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            *self.last.lock().unwrap() = Some(request.clone());
            Ok(json!({"choices": [{"message": {"content": format!("answer #{}", n)}}]}))
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    struct Failing(u16);

    #[async_trait]
    impl UpstreamClient for Failing {
        async fn send(&self, _: &ChatRequest) -> Result<Value> {
            Err(Error::Upstream {
                status: self.0,
                body: "{\"error\":\"nope\"}".into(),
            })
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    #[tokio::test]
    async fn miss_then_hit() {
        let upstream = Arc::new(Recording::default());
        let gateway = Gateway::new(&GatewayConfig::default(), upstream.clone());
        let body = json!({"prompt": "What is 2+2?"});

        let first = gateway.handle(&body).await.unwrap();
        assert_eq!(first.content, "answer #1");
        assert!(!first.cached);

        let second = gateway.handle(&body).await.unwrap();
        assert_eq!(second.content, "answer #1");
        assert!(second.cached);
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
        assert!(gateway
            .cache()
            .has(&CacheKey::from("generic::What is 2+2?")));
    }

    #[tokio::test]
    async fn failure_is_not_cached() {
        let gateway = Gateway::new(&GatewayConfig::default(), Arc::new(Failing(500)));
        let err = gateway
            .handle(&json!({"prompt": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Upstream { status: 500, .. }));
        assert!(gateway.cache().is_empty());
    }

    #[tokio::test]
    async fn disabled_cache_always_dispatches() {
        let upstream = Arc::new(Recording::default());
        let config =
            GatewayConfig::default().with_cache(CacheConfig::default().with_enabled(false));
        let gateway = Gateway::new(&config, upstream.clone());
        let body = json!({"prompt": "same"});
        gateway.handle(&body).await.unwrap();
        let again = gateway.handle(&body).await.unwrap();
        assert!(!again.cached);
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 2);
        assert!(gateway.cache().is_empty());
    }

    #[tokio::test]
    async fn respond_rejects_other_methods() {
        let upstream = Arc::new(Recording::default());
        let gateway = Gateway::new(&GatewayConfig::default(), upstream.clone());
        let reply = gateway.respond("GET", &json!({"prompt": "x"})).await;
        assert_eq!(reply.status, 405);
        assert_eq!(reply.body, json!({"error": "Method not allowed"}));
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn validation_error_never_reaches_upstream() {
        let upstream = Arc::new(Recording::default());
        let gateway = Gateway::new(&GatewayConfig::default(), upstream.clone());
        let reply = gateway.respond("POST", &json!({"messages": "oops"})).await;
        assert_eq!(reply.status, 400);
        assert_eq!(reply.body["error"], "Invalid request body");
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn shared_store_is_visible_across_gateways() {
        let store = Arc::new(CacheStore::new(10, crate::cache::DEFAULT_TTL));
        let upstream = Arc::new(Recording::default());
        let a = Gateway::new(&GatewayConfig::default(), upstream.clone())
            .with_store(store.clone());
        let b = Gateway::new(&GatewayConfig::default(), upstream.clone()).with_store(store);
        a.handle(&json!({"event": "quiz", "prompt": "q1"}))
            .await
            .unwrap();
        let hit = b
            .handle(&json!({"event": "quiz", "prompt": "q1"}))
            .await
            .unwrap();
        assert!(hit.cached);
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
    }
}
