//! Bounded in-memory response store with absolute TTL and LRU eviction.

use super::key::CacheKey;
use crate::types::ChatResponse;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_MAX_ENTRIES: usize = 500;

/// 30 days.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: usize,
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: DEFAULT_MAX_ENTRIES,
            ttl: DEFAULT_TTL,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub evictions: u64,
    pub expirations: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl AtomicStats {
    fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    fn bump(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    fn to_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }
}

struct CacheEntry {
    value: ChatResponse,
    inserted_at: Instant,
    /// `None` when the TTL is too large to represent; such entries never expire.
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: ChatResponse, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            value,
            inserted_at: now,
            expires_at: now.checked_add(ttl),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map_or(false, |at| now >= at)
    }
}

/// Process-scoped response cache.
///
/// One mutex guards the LRU list; every operation is synchronous, so the lock is
/// never held across an upstream call. Expired entries are removed lazily when
/// touched or when room is needed for an insertion.
pub struct CacheStore {
    entries: Mutex<LruCache<CacheKey, CacheEntry>>,
    max_entries: usize,
    ttl: Duration,
    stats: AtomicStats,
}

impl CacheStore {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        let max_entries = max_entries.max(1);
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            max_entries,
            ttl,
            stats: AtomicStats::new(),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_entries, config.ttl)
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<CacheKey, CacheEntry>> {
        // A panic while holding the lock cannot leave a half-written entry behind.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up `key`, promoting it to most-recently-used. Expired entries are
    /// removed and reported absent.
    pub fn get(&self, key: &CacheKey) -> Option<ChatResponse> {
        let now = Instant::now();
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                AtomicStats::bump(&self.stats.hits, 1);
                debug!(
                    key = %key,
                    age_ms = now.duration_since(entry.inserted_at).as_millis() as u64,
                    "cache hit"
                );
                return Some(entry.value.clone());
            }
            Some(_) => {}
            None => {
                AtomicStats::bump(&self.stats.misses, 1);
                return None;
            }
        }
        entries.pop(key);
        AtomicStats::bump(&self.stats.expirations, 1);
        AtomicStats::bump(&self.stats.misses, 1);
        debug!(key = %key, "cache entry expired");
        None
    }

    /// Presence check with the same expiry semantics as [`get`](Self::get). Counts as an access.
    pub fn has(&self, key: &CacheKey) -> bool {
        let now = Instant::now();
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            Some(entry) => entry.is_expired(now),
            None => return false,
        };
        if expired {
            entries.pop(key);
            AtomicStats::bump(&self.stats.expirations, 1);
        }
        !expired
    }

    /// Insert or wholesale replace `key`. Makes room first when the store is full:
    /// expired entries go before the least-recently-used live one.
    pub fn set(&self, key: CacheKey, value: ChatResponse) {
        let entry = CacheEntry::new(value, self.ttl);
        let mut entries = self.lock();
        if !entries.contains(&key) && entries.len() >= self.max_entries {
            let purged = Self::purge_locked(&mut entries, entry.inserted_at);
            AtomicStats::bump(&self.stats.expirations, purged as u64);
            if entries.len() >= self.max_entries {
                if let Some((evicted, _)) = entries.pop_lru() {
                    AtomicStats::bump(&self.stats.evictions, 1);
                    debug!(key = %evicted, "evicted least-recently-used cache entry");
                }
            }
        }
        entries.put(key, entry);
        AtomicStats::bump(&self.stats.sets, 1);
    }

    pub fn remove(&self, key: &CacheKey) -> bool {
        self.lock().pop(key).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Drop every expired entry now. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.lock();
        let purged = Self::purge_locked(&mut entries, Instant::now());
        AtomicStats::bump(&self.stats.expirations, purged as u64);
        purged
    }

    fn purge_locked(entries: &mut LruCache<CacheKey, CacheEntry>, now: Instant) -> usize {
        let expired: Vec<CacheKey> = entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    /// Number of live (non-expired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock().iter().filter(|(_, e)| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}
