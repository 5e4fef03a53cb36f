//! Key-to-entry map with lazy TTL eviction.
//!
//! Expired entries are purged in two places only: when a read encounters
//! them, and during a full-table sweep that the write path triggers once
//! `cleanup_interval` has elapsed since the previous sweep. There is no
//! background timer.

use std::hash::Hash;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use crate::clock::SharedClock;
use crate::entry::{CacheEntry, Lifetime};

/// Default time between write-triggered sweeps.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Counters describing store activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries currently held, including expired ones not yet purged.
    pub entries: usize,
    /// Reads that returned a value.
    pub hits: u64,
    /// Reads that found nothing or an expired entry.
    pub misses: u64,
    /// Entries purged because they expired.
    pub evictions: u64,
    /// Full-table sweeps run.
    pub sweeps: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    sweeps: AtomicU64,
}

/// The entry store: `K -> CacheEntry<V>`.
pub struct EntryStore<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
    clock: SharedClock,
    cleanup_interval: Duration,
    last_sweep: Mutex<Instant>,
    counters: Counters,
}

impl<K, V> EntryStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(clock: SharedClock, cleanup_interval: Duration) -> Self {
        let now = clock.now();
        Self {
            entries: DashMap::new(),
            clock,
            cleanup_interval,
            last_sweep: Mutex::new(now),
            counters: Counters::default(),
        }
    }

    /// Store `value` under `key`, replacing any previous entry.
    ///
    /// Runs a full sweep first if the cleanup interval has elapsed.
    pub fn write(&self, key: K, value: V, lifetime: Lifetime) {
        let now = self.clock.now();
        self.maybe_sweep(now);
        self.entries.insert(key, CacheEntry::new(value, now, lifetime));
    }

    /// Look up `key`, purging it if it has expired.
    pub fn read(&self, key: &K) -> Option<V> {
        let now = self.clock.now();

        let Some(entry) = self.entries.get(key) else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        if !entry.is_expired(now) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Some(entry.value().value().clone());
        }

        // Release the shard guard before removing.
        drop(entry);
        if self
            .entries
            .remove_if(key, |_, e| e.is_expired(now))
            .is_some()
        {
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Whether `key` holds an unexpired value. Expired entries are purged.
    pub fn contains_key(&self, key: &K) -> bool {
        let now = self.clock.now();
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => true,
            Some(entry) => {
                drop(entry);
                if self
                    .entries
                    .remove_if(key, |_, e| e.is_expired(now))
                    .is_some()
                {
                    self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                }
                false
            }
            None => false,
        }
    }

    /// Remove `key`. Absent keys are ignored.
    pub fn delete(&self, key: &K) {
        self.entries.remove(key);
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Scan the whole table and evict every expired entry.
    ///
    /// Returns the number of entries evicted.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        if let Ok(mut last) = self.last_sweep.lock() {
            *last = now;
        }
        self.sweep_at(now)
    }

    /// Raw number of entries held, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cleanup_interval(&self) -> Duration {
        self.cleanup_interval
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            sweeps: self.counters.sweeps.load(Ordering::Relaxed),
        }
    }

    fn maybe_sweep(&self, now: Instant) {
        let due = {
            let Ok(mut last) = self.last_sweep.lock() else {
                return;
            };
            if now.saturating_duration_since(*last) > self.cleanup_interval {
                *last = now;
                true
            } else {
                false
            }
        };

        if due {
            self.sweep_at(now);
        }
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let mut evicted = 0usize;
        self.entries.retain(|_, entry| {
            let keep = !entry.is_expired(now);
            if !keep {
                evicted += 1;
            }
            keep
        });

        self.counters.sweeps.fetch_add(1, Ordering::Relaxed);
        self.counters
            .evictions
            .fetch_add(evicted as u64, Ordering::Relaxed);
        debug!(evicted, remaining = self.entries.len(), "Swept expired entries");
        evicted
    }
}

impl<K: Eq + Hash, V> std::fmt::Debug for EntryStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryStore")
            .field("entries", &self.entries.len())
            .field("cleanup_interval", &self.cleanup_interval)
            .finish_non_exhaustive()
    }
}
