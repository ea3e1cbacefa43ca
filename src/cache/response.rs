//! TTL response cache for enforced gateway results.
//!
//! [`ResponseCache`] maps a [`Fingerprint`] to the schema-valid value that
//! a successful provider call produced. Only successes are stored; the
//! gateway writes the entry before the in-flight call is deregistered, so
//! a caller that misses the coalescing window still finds the fresh value.
//!
//! # Expiry
//!
//! Every entry records `created_at` and `expires_at = created_at + ttl`.
//! [`ResponseCache::get`] compares against [`tokio::time::Instant`] and
//! treats anything at or past `expires_at` as absent, evicting it on the
//! spot unless a concurrent `put` has already replaced it. moka's own
//! `time_to_live` runs alongside and reclaims memory for entries nobody
//! asks for again; it is not what enforces staleness.
//!
//! # Future extensibility: shared caching
//!
//! Fingerprints are stable across processes, so the moka store can be
//! swapped for a shared backend behind a trait without touching the key
//! scheme. The gateway is the only caller of this type.

use std::time::Duration;

use moka::future::Cache;
use moka::ops::compute::Op;
use tokio::time::Instant;

use super::Fingerprint;
use crate::types::Enforced;

/// Configuration for the response cache.
///
/// ```rust
/// # use quill::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(10_000)
///     .ttl(Duration::from_secs(600));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached entries. Default: 10,000.
    pub max_entries: u64,
    /// Time-to-live for cached entries. Default: 10 minutes.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(600),
        }
    }
}

impl CacheConfig {
    /// Create a new config with the default TTL and capacity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached entries.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the time-to-live for cached entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Immutable cache record. Replaced wholesale, never updated in place.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Enforced,
    pub created_at: Instant,
    pub expires_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Entry counts split by freshness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryCounts {
    pub valid: u64,
    /// Past `expires_at` but not yet reclaimed.
    pub expired: u64,
}

/// In-memory TTL cache keyed by request fingerprint.
pub struct ResponseCache {
    cache: Cache<Fingerprint, CacheEntry>,
    ttl: Duration,
}

impl ResponseCache {
    /// Create a new response cache with the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.ttl)
            .build();
        Self {
            cache,
            ttl: config.ttl,
        }
    }

    /// The configured time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a fresh value.
    ///
    /// Returns `None` on miss or when the entry has expired; expired
    /// entries are evicted on access.
    pub async fn get(&self, fingerprint: &Fingerprint) -> Option<Enforced> {
        let entry = self.cache.get(fingerprint).await?;
        if entry.is_fresh(Instant::now()) {
            Some(entry.value)
        } else {
            self.evict_if_unchanged(fingerprint, entry.expires_at).await;
            None
        }
    }

    /// Remove the entry only while it is still the one that expired at
    /// `stale_at`; a value stored in the meantime stays.
    pub(crate) async fn evict_if_unchanged(&self, fingerprint: &Fingerprint, stale_at: Instant) {
        self.cache
            .entry_by_ref(fingerprint)
            .and_compute_with(|current| {
                let op = match current {
                    Some(entry) if entry.value().expires_at == stale_at => Op::Remove,
                    _ => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;
    }

    /// Look up the full entry, timestamps included.
    pub async fn entry(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        self.cache
            .get(fingerprint)
            .await
            .filter(|entry| entry.is_fresh(Instant::now()))
    }

    /// Store a value, replacing any previous entry for the fingerprint.
    pub async fn put(&self, fingerprint: Fingerprint, value: Enforced) {
        let created_at = Instant::now();
        let entry = CacheEntry {
            value,
            created_at,
            expires_at: created_at + self.ttl,
        };
        self.cache.insert(fingerprint, entry).await;
    }

    /// Approximate number of stored entries, expired ones included until
    /// they are reclaimed.
    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Count stored entries by freshness at the current instant.
    pub fn counts(&self) -> EntryCounts {
        let now = Instant::now();
        let mut counts = EntryCounts::default();
        for (_, entry) in self.cache.iter() {
            if entry.is_fresh(now) {
                counts.valid += 1;
            } else {
                counts.expired += 1;
            }
        }
        counts
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict all entries.
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}
