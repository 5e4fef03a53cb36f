//! Core building blocks for RelayCache.
//!
//! - [`store`]: TTL entry store with lazy, write-triggered sweeping
//! - [`events`]: per-key and global update hooks with isolated dispatch
//! - [`gate`]: ordered authorization rules over `(peer, key)`
//! - [`cache`]: the [`Cache`] facade tying store and hooks together

pub mod cache;
pub mod clock;
pub mod entry;
pub mod error;
pub mod events;
pub mod gate;
pub mod store;

pub use cache::{Cache, CacheConfig};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use entry::{CacheEntry, Lifetime};
pub use error::{CacheError, Result};
pub use events::{HookError, KeyHook, SubscriptionRegistry, UpdateHook};
pub use gate::{AuthorizationGate, FnRule, GateDecision, GateRule};
pub use store::{CacheStats, EntryStore};
