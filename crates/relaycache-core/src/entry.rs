//! Cached entries with TTL support.

use std::time::{Duration, Instant};

/// How long an entry stays readable after it was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifetime {
    /// Never expires.
    #[default]
    Unbounded,
    /// Expires once this much time has passed since the write.
    Bounded(Duration),
}

impl Lifetime {
    /// Whether an entry written at `written_at` is still readable at `now`.
    ///
    /// Validity is the half-open window `[written_at, written_at + ttl)`.
    pub fn is_valid(&self, written_at: Instant, now: Instant) -> bool {
        match self {
            Lifetime::Unbounded => true,
            Lifetime::Bounded(ttl) => now.saturating_duration_since(written_at) < *ttl,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, Lifetime::Unbounded)
    }
}

impl From<Duration> for Lifetime {
    fn from(ttl: Duration) -> Self {
        Lifetime::Bounded(ttl)
    }
}

impl From<Option<Duration>> for Lifetime {
    fn from(ttl: Option<Duration>) -> Self {
        ttl.map_or(Lifetime::Unbounded, Lifetime::Bounded)
    }
}

/// A cached value with the instant it was written and its lifetime.
///
/// Entries are never mutated in place; an overwrite replaces the whole entry.
#[derive(Clone, Debug)]
pub struct CacheEntry<V> {
    value: V,
    written_at: Instant,
    lifetime: Lifetime,
}

impl<V> CacheEntry<V> {
    /// Create a new cached entry.
    pub fn new(value: V, written_at: Instant, lifetime: Lifetime) -> Self {
        Self {
            value,
            written_at,
            lifetime,
        }
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn into_value(self) -> V {
        self.value
    }

    pub fn written_at(&self) -> Instant {
        self.written_at
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// Check if this entry has expired as of `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        !self.lifetime.is_valid(self.written_at, now)
    }
}
