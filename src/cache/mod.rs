//! # Response Caching Module
//!
//! Bounded, time-limited response cache plus the key derivation that decides which
//! requests are considered equivalent.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CacheStore`] | In-memory LRU store with absolute TTL and lazy expiry |
//! | [`CacheConfig`] | Capacity, TTL and on/off switch |
//! | [`CacheKey`] | Plain-text key `<event>::<first 200 chars>` |
//! | [`CacheKeyDeriver`] | Key derivation with configurable prefix length and namespace |
//! | [`SingleFlight`] | Coalesces concurrent identical misses into one upstream call |
//!
//! ## Example
//!
//! ```rust
//! use chat_cache_gateway::cache::{derive_key, CacheStore};
//! use chat_cache_gateway::types::ChatResponse;
//! use std::time::Duration;
//!
//! let store = CacheStore::new(500, Duration::from_secs(60 * 60 * 24 * 30));
//! let key = derive_key("generic", "What is 2+2?");
//! store.set(key.clone(), ChatResponse::new("4"));
//! assert_eq!(store.get(&key).map(|r| r.content), Some("4".to_string()));
//! ```
//!
//! The store lives for the lifetime of the process and is never persisted; it is a
//! performance layer only.

mod flight;
mod key;
mod store;

pub use flight::SingleFlight;
pub use key::{derive_key, CacheKey, CacheKeyDeriver, DEFAULT_EVENT, DEFAULT_PREFIX_CHARS};
pub use store::{CacheConfig, CacheStats, CacheStore, DEFAULT_MAX_ENTRIES, DEFAULT_TTL};
