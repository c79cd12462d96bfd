//! Bounded in-memory cache with per-entry TTL and LRU eviction
//!
//! Time comes from an injected [`Clock`], so expiry is deterministic under
//! test. Entries are never shared across processes and do not survive a
//! restart.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::domain::clock::{add_duration, Clock, SystemClock};

/// Configuration for a bounded cache
#[derive(Debug, Clone)]
pub struct BoundedCacheConfig {
    /// Soft cap on the number of entries
    pub max_entries: usize,
    /// TTL for entries set without an explicit one
    pub default_ttl: Duration,
    /// How often the background sweeper purges expired entries
    pub sweep_interval: Duration,
}

impl Default for BoundedCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            default_ttl: Duration::from_secs(3600), // 1 hour
            sweep_interval: Duration::from_secs(300), // 5 minutes
        }
    }
}

impl BoundedCacheConfig {
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    access_count: u64,
    last_accessed_at: DateTime<Utc>,
    /// Monotonic sequence of the last set/get, breaks timestamp ties
    touched: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Metadata snapshot of a single entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntryInfo {
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub access_count: u64,
    pub last_accessed_at: DateTime<Utc>,
}

/// Cache counters since construction (or the last `clear`)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub entries: usize,
}

#[derive(Debug)]
struct CacheState<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    sequence: u64,
    stats: CacheStats,
}

impl<K: Eq + Hash + Clone, V> CacheState<K, V> {
    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - self.entries.len();
        self.stats.expirations += removed as u64;
        removed
    }

    fn evict_lru(&mut self) -> bool {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| (entry.last_accessed_at, entry.touched))
            .map(|(key, _)| key.clone());

        match victim {
            Some(key) => {
                self.entries.remove(&key);
                self.stats.evictions += 1;
                true
            }
            None => false,
        }
    }
}

/// Thread-safe TTL + LRU cache
///
/// Capacity and TTL are soft limits: inserting at capacity evicts, it never
/// fails.
#[derive(Debug)]
pub struct BoundedCache<K, V> {
    state: RwLock<CacheState<K, V>>,
    config: BoundedCacheConfig,
    clock: Arc<dyn Clock>,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(config: BoundedCacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: BoundedCacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(CacheState {
                entries: HashMap::new(),
                sequence: 0,
                stats: CacheStats::default(),
            }),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &BoundedCacheConfig {
        &self.config
    }

    /// Inserts or replaces an entry
    ///
    /// Overwriting replaces the entry wholesale: creation time, expiry and
    /// access statistics all restart.
    pub async fn set(&self, key: K, value: V, ttl: Option<Duration>) {
        let now = self.clock.now();
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let mut state = self.state.write().await;

        if !state.entries.contains_key(&key) && state.entries.len() >= self.config.max_entries {
            let expired = state.purge_expired(now);
            if expired > 0 {
                trace!(expired, "Purged expired entries before insert");
            }

            while state.entries.len() >= self.config.max_entries.max(1) {
                if !state.evict_lru() {
                    break;
                }
                debug!(max_entries = self.config.max_entries, "Evicted least recently used cache entry");
            }
        }

        let touched = state.next_sequence();
        state.entries.insert(
            key,
            CacheEntry {
                value,
                created_at: now,
                expires_at: add_duration(now, ttl),
                access_count: 0,
                last_accessed_at: now,
                touched,
            },
        );
    }

    /// Returns a clone of the value if present and not expired
    ///
    /// Expired entries are removed on the way.
    pub async fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let touched = state.next_sequence();

        let expired = match state.entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.access_count += 1;
                entry.last_accessed_at = now;
                entry.touched = touched;
                let value = entry.value.clone();
                state.stats.hits += 1;
                return Some(value);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            state.entries.remove(key);
            state.stats.expirations += 1;
        }
        state.stats.misses += 1;
        None
    }

    /// Presence check with the same expiry semantics as `get`, without
    /// touching statistics
    pub async fn has(&self, key: &K) -> bool {
        let now = self.clock.now();
        let state = self.state.read().await;

        state
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    pub async fn delete(&self, key: &K) -> bool {
        self.state.write().await.entries.remove(key).is_some()
    }

    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.entries.clear();
        state.stats = CacheStats::default();
    }

    /// Number of stored entries, expired ones included until swept
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> CacheStats {
        let state = self.state.read().await;
        CacheStats {
            entries: state.entries.len(),
            ..state.stats
        }
    }

    /// Entry metadata without counting as an access
    pub async fn entry_info(&self, key: &K) -> Option<CacheEntryInfo> {
        let state = self.state.read().await;

        state.entries.get(key).map(|entry| CacheEntryInfo {
            created_at: entry.created_at,
            expires_at: entry.expires_at,
            access_count: entry.access_count,
            last_accessed_at: entry.last_accessed_at,
        })
    }

    /// Returns the cached value, or awaits `compute` once and caches its
    /// success
    ///
    /// Concurrent callers for the same missing key each run their own
    /// `compute`; nothing is coalesced. Errors are returned as-is and leave
    /// the cache untouched.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: K,
        compute: F,
        ttl: Option<Duration>,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key).await {
            return Ok(value);
        }

        let value = compute().await?;
        self.set(key, value.clone(), ttl).await;
        Ok(value)
    }

    /// Removes every expired entry, returning how many were dropped
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        self.state.write().await.purge_expired(now)
    }

    /// Starts the periodic expiry sweep
    ///
    /// The task only holds a weak reference and stops once the cache is
    /// dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        let interval = self.config.sweep_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let Some(cache) = cache.upgrade() else {
                    debug!("Cache dropped, stopping sweeper");
                    break;
                };

                let removed = cache.purge_expired().await;
                if removed > 0 {
                    debug!(removed, "Swept expired cache entries");
                }
            }
        })
    }
}
