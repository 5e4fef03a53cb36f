//! The cache facade: entry store plus update notification.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::clock::{SharedClock, SystemClock};
use crate::entry::Lifetime;
use crate::error::{CacheError, Result};
use crate::events::{DEFAULT_HOOK_TIMEOUT, SubscriptionRegistry};
use crate::store::{CacheStats, DEFAULT_CLEANUP_INTERVAL, EntryStore};

/// Configuration for a cache instance.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Namespace of this instance; used in log fields.
    pub name: String,
    /// Minimum time between write-triggered sweeps.
    pub cleanup_interval: Duration,
    /// Timeout applied to each update hook.
    pub hook_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            hook_timeout: DEFAULT_HOOK_TIMEOUT,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the namespace.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the sweep interval.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Set the hook timeout.
    pub fn with_hook_timeout(mut self, timeout: Duration) -> Self {
        self.hook_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CacheError::configuration("cache name must not be empty"));
        }
        if self.cleanup_interval.is_zero() {
            return Err(CacheError::configuration("cleanup interval must be > 0"));
        }
        if self.hook_timeout.is_zero() {
            return Err(CacheError::configuration("hook timeout must be > 0"));
        }
        Ok(())
    }
}

/// A TTL cache that notifies subscribers on every write.
///
/// # Example
///
/// ```ignore
/// let cache: Cache<String, u32> = Cache::new(CacheConfig::new().with_name("scores"))?;
///
/// cache.write_with_lifetime("score".into(), 42, Duration::from_secs(10));
/// assert_eq!(cache.read(&"score".into()), Some(42));
///
/// let value = cache.read_or_compute("other".into(), || load_from_db());
/// ```
pub struct Cache<K, V> {
    name: String,
    store: EntryStore<K, V>,
    registry: SubscriptionRegistry<K>,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache on the system clock.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a cache on an explicit clock.
    pub fn with_clock(config: CacheConfig, clock: SharedClock) -> Result<Self> {
        config.validate()?;
        let registry = SubscriptionRegistry::with_timeout(config.name.clone(), config.hook_timeout);
        Ok(Self {
            store: EntryStore::new(clock, config.cleanup_interval),
            registry,
            name: config.name,
        })
    }

    /// Create a cache wrapped in an Arc for sharing.
    pub fn new_shared(config: CacheConfig) -> Result<Arc<Self>> {
        Self::new(config).map(Arc::new)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write a value that never expires.
    pub fn write(&self, key: K, value: V) {
        self.write_with_lifetime(key, value, Lifetime::Unbounded);
    }

    /// Write a value with an explicit lifetime.
    ///
    /// The entry is stored before any hook is scheduled, so hooks observe
    /// the new value.
    pub fn write_with_lifetime(&self, key: K, value: V, lifetime: impl Into<Lifetime>) {
        let lifetime = lifetime.into();
        self.store.write(key.clone(), value, lifetime);
        debug!(cache = %self.name, key = ?key, ?lifetime, "Wrote entry");
        self.registry.notify_write(&key);
    }

    /// Read an unexpired value.
    pub fn read(&self, key: &K) -> Option<V> {
        self.store.read(key)
    }

    /// Read a value, computing and caching it on a miss.
    ///
    /// `fallback` runs at most once. A `Some` result is written back with an
    /// unbounded lifetime; `None` stores nothing.
    pub fn read_or_compute<F>(&self, key: K, fallback: F) -> Option<V>
    where
        F: FnOnce() -> Option<V>,
    {
        if let Some(value) = self.store.read(&key) {
            return Some(value);
        }

        let value = fallback()?;
        self.write(key, value.clone());
        Some(value)
    }

    /// Whether `key` holds an unexpired value.
    pub fn contains_key(&self, key: &K) -> bool {
        self.store.contains_key(key)
    }

    pub fn delete(&self, key: &K) {
        self.store.delete(key);
    }

    pub fn clear(&self) {
        self.store.clear();
    }

    /// Force a full sweep; returns the number of entries evicted.
    pub fn sweep(&self) -> usize {
        self.store.sweep()
    }

    /// Raw entry count, including expired entries not yet purged.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }

    /// Register a callback fired each time `key` is written again.
    ///
    /// Returns `false`, registering nothing, if `key` was never written.
    pub fn on_key_update<F>(&self, key: &K, callback: F) -> bool
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.registry.on_key_update(key, callback)
    }

    /// Register a callback fired with the key on every write.
    pub fn on_any_update<F>(&self, callback: F)
    where
        F: Fn(K) + Send + Sync + 'static,
    {
        self.registry.on_any_update(callback);
    }

    /// Whether `key` has ever been written, even if since expired or deleted.
    pub fn has_been_written(&self, key: &K) -> bool {
        self.registry.has_been_written(key)
    }

    pub fn registry(&self) -> &SubscriptionRegistry<K> {
        &self.registry
    }
}

impl<K: Eq + Hash, V> fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.name)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
