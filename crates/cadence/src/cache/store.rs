//! # TTL Cache Store
//!
//! Generic, thread-safe key/value store whose entries expire a fixed time
//! after they were written. Expiry is checked on read: a stale entry is
//! reported as a miss and removed. An optional capacity bound delegates
//! eviction to Moka's admission/eviction policy.

use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use moka::ops::compute::Op;
use moka::sync::Cache as MokaCache;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Entry in the store
#[derive(Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
}

/// TTL cache backed by Moka
#[derive(Clone)]
pub struct TtlCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    name: &'static str,
    ttl: Duration,
    entries: MokaCache<K, CacheEntry<V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create an unbounded store
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self::with_capacity(name, ttl, None)
    }

    /// Create a store, optionally bounded to `max_entries`
    pub fn with_capacity(name: &'static str, ttl: Duration, max_entries: Option<u64>) -> Self {
        let mut builder = MokaCache::builder().name(name);
        if let Some(capacity) = max_entries {
            builder = builder.max_capacity(capacity);
        }

        debug!(
            cache = name,
            ttl_secs = ttl.as_secs_f64(),
            max_entries = ?max_entries,
            "TTL cache created"
        );

        Self {
            name,
            ttl,
            entries: builder.build(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_fresh(&self, entry: &CacheEntry<V>, now: Instant) -> bool {
        now.saturating_duration_since(entry.created_at) < self.ttl
    }

    /// Get a live value. A stale entry is removed and reported as a miss.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let entry = self.entries.get(key)?;
        if self.is_fresh(&entry, now) {
            return Some(entry.value);
        }

        self.remove_if_stale(key, now);
        trace!(cache = self.name, "Entry expired on read");
        None
    }

    /// Insert or replace the value for `key`, stamped with the current time.
    pub fn put(&self, key: K, value: V) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                created_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, key: &K) {
        self.entries.invalidate(key);
    }

    pub fn clear(&self) {
        self.entries.invalidate_all();
    }

    /// Approximate number of stored entries, including ones that have expired
    /// but not been read since.
    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Re-checks under the entry lock so a concurrent `put` is never discarded.
    fn remove_if_stale(&self, key: &K, now: Instant) {
        let ttl = self.ttl;
        let _ = self
            .entries
            .entry(key.clone())
            .and_compute_with(|current| match current {
                Some(current) if now.saturating_duration_since(current.value().created_at) >= ttl => {
                    Op::Remove
                }
                _ => Op::Nop,
            });
    }

    /// Remove every expired entry, returning how many were dropped.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, entry)| !self.is_fresh(entry, now))
            .map(|(key, _)| K::clone(&key))
            .collect();

        for key in &expired {
            self.remove_if_stale(key, now);
        }

        if !expired.is_empty() {
            debug!(cache = self.name, removed = expired.len(), "Swept expired entries");
        }
        expired.len()
    }

    /// Start a background task sweeping expired entries every `interval`
    /// until `shutdown` is cancelled.
    pub fn start_sweeper(&self, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        cache.sweep();
                    }
                }
            }
            debug!(cache = cache.name, "Cache sweeper stopped");
        })
    }
}

impl<K, V> Debug for TtlCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("name", &self.name)
            .field("ttl", &self.ttl)
            .field("entry_count", &self.entries.entry_count())
            .finish()
    }
}
