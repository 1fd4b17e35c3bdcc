//! Cache key derivation.

use crate::normalize::Normalized;
use serde::{Deserialize, Serialize};

/// Event name used when the caller did not supply one.
pub const DEFAULT_EVENT: &str = "generic";

/// Number of characters of identifying text that participate in the key.
pub const DEFAULT_PREFIX_CHARS: usize = 200;

/// Opaque, plain-text cache key (`<event>::<first 200 chars of text>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Derive the key for `(event, text)` with the default 200-character prefix.
///
/// Pure: the same pair always yields the same key. Texts that only differ past the
/// prefix collide on purpose, which bounds key size.
pub fn derive_key(event: &str, text: &str) -> CacheKey {
    CacheKeyDeriver::default().derive(event, text)
}

/// Configurable key deriver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeyDeriver {
    prefix_chars: usize,
    namespace: Option<String>,
}

impl CacheKeyDeriver {
    pub fn new() -> Self {
        Self {
            prefix_chars: DEFAULT_PREFIX_CHARS,
            namespace: None,
        }
    }

    pub fn with_prefix_chars(mut self, chars: usize) -> Self {
        self.prefix_chars = chars;
        self
    }

    /// Prefix every key with `<namespace>:`, for hosts sharing one store.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn derive(&self, event: &str, text: &str) -> CacheKey {
        let event = if event.is_empty() { DEFAULT_EVENT } else { event };
        // char-based slice: never splits a UTF-8 sequence
        let head: String = text.chars().take(self.prefix_chars).collect();
        match self.namespace {
            Some(ref ns) => CacheKey::new(format!("{}:{}::{}", ns, event, head)),
            None => CacheKey::new(format!("{}::{}", event, head)),
        }
    }

    /// Key for a normalized request, built from its pre-substitution identifying text.
    pub fn derive_for(&self, normalized: &Normalized) -> CacheKey {
        self.derive(&normalized.event, &normalized.key_text)
    }
}

impl Default for CacheKeyDeriver {
    fn default() -> Self {
        Self::new()
    }
}
