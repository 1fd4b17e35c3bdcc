//! Gateway configuration.
//!
//! Defaults are production-friendly and every knob can be overridden from the
//! environment or from a YAML file. The provider credential is only ever read from
//! the environment.

use crate::cache::CacheConfig;
use crate::normalize::NormalizerConfig;
use crate::resilience::RetryPolicy;
use crate::transport::DEFAULT_BASE_URL;
use crate::{Error, ErrorContext, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const BASE_URL_ENV: &str = "AI_GATEWAY_BASE_URL";
pub const TIMEOUT_ENV: &str = "AI_HTTP_TIMEOUT_SECS";
pub const PROXY_ENV: &str = "AI_PROXY_URL";
pub const CACHE_MAX_ENTRIES_ENV: &str = "AI_GATEWAY_CACHE_MAX_ENTRIES";
pub const CACHE_TTL_ENV: &str = "AI_GATEWAY_CACHE_TTL_SECS";
pub const MAX_RETRIES_ENV: &str = "AI_GATEWAY_MAX_RETRIES";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct GatewayConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
    pub proxy_url: Option<String>,
    pub normalizer: NormalizerConfig,
    pub cache: CacheConfig,
    pub canonicalize_json: bool,
    pub retry: RetryPolicy,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            proxy_url: None,
            normalizer: NormalizerConfig::default(),
            cache: CacheConfig::default(),
            canonicalize_json: false,
            retry: RetryPolicy::default(),
        }
    }
}

// Keeps the credential out of logs.
impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("proxy_url", &self.proxy_url)
            .field("normalizer", &self.normalizer)
            .field("cache", &self.cache)
            .field("canonicalize_json", &self.canonicalize_json)
            .field("retry", &self.retry)
            .finish()
    }
}

/// On-disk shape. Every field is optional and falls back to the default.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    proxy_url: Option<String>,
    canonicalize_json: Option<bool>,
    cache: FileCacheConfig,
    defaults: FileDefaults,
    retry: FileRetry,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileCacheConfig {
    enabled: Option<bool>,
    max_entries: Option<usize>,
    ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileDefaults {
    model: Option<String>,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
    max_tokens_cap: Option<u32>,
    persona: Option<String>,
    fallback_prompt: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileRetry {
    max_retries: Option<u32>,
    min_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
}

impl GatewayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup (the environment in production).
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = lookup(API_KEY_ENV) {
            self.api_key = Some(key);
        }
        if let Some(url) = lookup(BASE_URL_ENV) {
            self.base_url = url;
        }
        if let Some(proxy) = lookup(PROXY_ENV) {
            self.proxy_url = Some(proxy);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, TIMEOUT_ENV) {
            self.timeout = Duration::from_secs(secs);
        }
        if let Some(n) = parse_var::<usize>(&lookup, CACHE_MAX_ENTRIES_ENV) {
            self.cache.max_entries = n;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, CACHE_TTL_ENV) {
            self.cache.ttl = Duration::from_secs(secs);
        }
        if let Some(n) = parse_var::<u32>(&lookup, MAX_RETRIES_ENV) {
            self.retry.max_retries = n;
        }
        self
    }

    /// Pick up only the credential from the environment.
    pub fn with_env_credential(mut self) -> Self {
        self.api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty());
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_canonical_json(mut self, enabled: bool) -> Self {
        self.canonicalize_json = enabled;
        self
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let file: FileConfig = serde_yaml::from_str(yaml).map_err(|e| {
            Error::configuration_with_context(
                "invalid gateway configuration",
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("config"),
            )
        })?;
        Ok(Self::default().merge_file(file))
    }

    /// Load a YAML file and take the credential from the environment.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read config file {}", path.display()),
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("config"),
            )
        })?;
        Ok(Self::from_yaml_str(&yaml)?.with_env_credential())
    }

    fn merge_file(mut self, file: FileConfig) -> Self {
        if let Some(url) = file.base_url {
            self.base_url = url;
        }
        if let Some(secs) = file.timeout_secs {
            self.timeout = Duration::from_secs(secs);
        }
        if file.proxy_url.is_some() {
            self.proxy_url = file.proxy_url;
        }
        if let Some(on) = file.canonicalize_json {
            self.canonicalize_json = on;
        }

        let cache = file.cache;
        if let Some(on) = cache.enabled {
            self.cache.enabled = on;
        }
        if let Some(n) = cache.max_entries {
            self.cache.max_entries = n;
        }
        if let Some(secs) = cache.ttl_secs {
            self.cache.ttl = Duration::from_secs(secs);
        }

        let d = file.defaults;
        let n = &mut self.normalizer;
        if let Some(model) = d.model {
            n.default_model = model;
        }
        if let Some(t) = d.temperature {
            n.default_temperature = t;
        }
        if let Some(m) = d.max_tokens {
            n.default_max_tokens = m;
        }
        if let Some(cap) = d.max_tokens_cap {
            n.max_tokens_cap = cap;
        }
        if let Some(persona) = d.persona {
            n.persona = persona;
        }
        if let Some(fallback) = d.fallback_prompt {
            n.fallback_prompt = fallback;
        }

        let r = file.retry;
        if let Some(max) = r.max_retries {
            self.retry.max_retries = max;
        }
        if let Some(ms) = r.min_delay_ms {
            self.retry.min_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = r.max_delay_ms {
            self.retry.max_delay = Duration::from_millis(ms).max(self.retry.min_delay);
        }
        self
    }

    /// Reject settings the gateway cannot run with. A missing credential is not
    /// checked here; it is reported per request.
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.base_url).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid base url: {}", self.base_url),
                ErrorContext::new()
                    .with_field_path("base_url")
                    .with_details(e.to_string())
                    .with_source("config"),
            )
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::configuration_with_context(
                format!("unsupported base url scheme: {}", url.scheme()),
                ErrorContext::new()
                    .with_field_path("base_url")
                    .with_source("config"),
            ));
        }
        if self.cache.max_entries == 0 {
            return Err(Error::configuration_with_context(
                "cache.max_entries must be at least 1",
                ErrorContext::new()
                    .with_field_path("cache.max_entries")
                    .with_source("config"),
            ));
        }
        if self.normalizer.max_tokens_cap == 0 {
            return Err(Error::configuration_with_context(
                "defaults.max_tokens_cap must be at least 1",
                ErrorContext::new()
                    .with_field_path("defaults.max_tokens_cap")
                    .with_source("config"),
            ));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var = name, value = %raw, "ignoring unparseable environment override");
            None
        }
    }
}
