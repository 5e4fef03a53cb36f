//! Subscription registry and fire-and-forget dispatch.
//!
//! The registry keeps a hook list per key plus a list of global hooks.
//! A key's hook list is created, empty, by the first write to that key and
//! is never removed, so "has this key ever been written" is observable via
//! [`SubscriptionRegistry::has_been_written`].

use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::FutureExt;
use tokio::runtime::Handle;
use tracing::{debug, error, warn};

use super::hooks::{FnKeyHook, FnUpdateHook, HookError, KeyHook, UpdateHook};

/// Default timeout for hook execution.
pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(30);

type KeyHooks = Vec<Arc<dyn KeyHook>>;
type GlobalHooks<K> = Vec<Arc<dyn UpdateHook<K>>>;

/// Registry for per-key and global update hooks.
pub struct SubscriptionRegistry<K> {
    /// Hooks bound to one key; an entry exists once the key has been written.
    per_key: DashMap<K, KeyHooks>,
    /// Hooks fired for every key.
    global: ArcSwap<GlobalHooks<K>>,
    /// Hook execution timeout.
    timeout: Duration,
    /// Cache name, for log fields.
    scope: String,
    /// Runtime to spawn hook tasks on; falls back to the ambient one.
    runtime: OnceLock<Handle>,
}

impl<K> SubscriptionRegistry<K>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
{
    /// Create a new empty registry.
    pub fn new(scope: impl Into<String>) -> Self {
        Self::with_timeout(scope, DEFAULT_HOOK_TIMEOUT)
    }

    /// Create a new registry with custom timeout.
    pub fn with_timeout(scope: impl Into<String>, timeout: Duration) -> Self {
        Self {
            per_key: DashMap::new(),
            global: ArcSwap::from_pointee(Vec::new()),
            timeout,
            scope: scope.into(),
            runtime: OnceLock::new(),
        }
    }

    /// Pin hook dispatch to `handle`, so writes from threads outside any
    /// runtime still dispatch. The first pin wins; returns `false` if one
    /// was already set.
    pub fn pin_runtime(&self, handle: Handle) -> bool {
        let pinned = self.runtime.set(handle).is_ok();
        if pinned {
            debug!(cache = %self.scope, "Pinned hook dispatch to runtime");
        }
        pinned
    }

    /// Whether dispatch is pinned to a runtime.
    pub fn has_pinned_runtime(&self) -> bool {
        self.runtime.get().is_some()
    }

    /// Register a hook fired each time `key` is written.
    ///
    /// Only keys that have already been written accept subscriptions;
    /// returns `false` and registers nothing otherwise.
    pub fn register_key_hook(&self, key: &K, hook: Arc<dyn KeyHook>) -> bool {
        match self.per_key.get_mut(key) {
            Some(mut hooks) => {
                debug!(cache = %self.scope, key = ?key, hook = %hook.name(), "Registered key hook");
                hooks.push(hook);
                true
            }
            None => {
                debug!(
                    cache = %self.scope,
                    key = ?key,
                    hook = %hook.name(),
                    "Ignoring key hook for a key that was never written"
                );
                false
            }
        }
    }

    /// Register a closure fired each time `key` is written.
    pub fn on_key_update<F>(&self, key: &K, f: F) -> bool
    where
        F: Fn() + Send + Sync + 'static,
    {
        let name = format!("{}:key:{:?}", self.scope, key);
        self.register_key_hook(key, Arc::new(FnKeyHook::new(name, f)))
    }

    /// Register a hook fired on every write to any key.
    pub fn register_hook(&self, hook: Arc<dyn UpdateHook<K>>) {
        let name = hook.name().to_string();
        self.global.rcu(|hooks| {
            let mut next = Vec::with_capacity(hooks.len() + 1);
            next.extend(hooks.iter().cloned());
            next.push(hook.clone());
            next
        });
        debug!(cache = %self.scope, hook = %name, "Registered update hook");
    }

    /// Register a closure fired with the key on every write.
    pub fn on_any_update<F>(&self, f: F)
    where
        F: Fn(K) + Send + Sync + 'static,
    {
        let name = format!("{}:any:{}", self.scope, self.global.load().len());
        self.register_hook(Arc::new(FnUpdateHook::new(name, f)));
    }

    /// Whether `key` has ever been written through this registry.
    pub fn has_been_written(&self, key: &K) -> bool {
        self.per_key.contains_key(key)
    }

    /// Total number of registered hooks, per-key and global.
    pub fn hook_count(&self) -> usize {
        let per_key: usize = self.per_key.iter().map(|e| e.value().len()).sum();
        per_key + self.global.load().len()
    }

    /// Number of keys that have a (possibly empty) hook list.
    pub fn tracked_keys(&self) -> usize {
        self.per_key.len()
    }

    /// Dispatch a write of `key` to its hooks and every global hook.
    ///
    /// Per-key hooks are spawned first, then global hooks. Each runs in its
    /// own task with:
    /// - Timeout protection
    /// - Panic recovery
    /// - Error isolation (errors don't propagate)
    ///
    /// Returns without waiting for any hook to finish.
    pub fn notify_write(&self, key: &K) {
        let key_hooks: KeyHooks = match self.per_key.entry(key.clone()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                entry.insert(Vec::new());
                Vec::new()
            }
        };

        let global = self.global.load_full();
        let global: GlobalHooks<K> = global.iter().filter(|h| h.matches(key)).cloned().collect();

        if key_hooks.is_empty() && global.is_empty() {
            return;
        }

        let handle = self
            .runtime
            .get()
            .cloned()
            .or_else(|| Handle::try_current().ok());
        let Some(handle) = handle else {
            warn!(
                cache = %self.scope,
                key = ?key,
                hooks = key_hooks.len() + global.len(),
                "No async runtime available, dropping update hooks"
            );
            return;
        };

        for hook in key_hooks {
            let name = hook.name().to_string();
            spawn_isolated(&handle, name, self.timeout, async move { hook.on_update().await });
        }

        for hook in global {
            let name = hook.name().to_string();
            let key = key.clone();
            spawn_isolated(&handle, name, self.timeout, async move {
                hook.on_update(&key).await
            });
        }
    }
}

/// Run a hook future in its own task, logging its outcome.
fn spawn_isolated<F>(handle: &Handle, hook_name: String, timeout: Duration, fut: F)
where
    F: Future<Output = Result<(), HookError>> + Send + 'static,
{
    handle.spawn(async move {
        // Wrap in timeout, then catch_unwind for panic protection
        let result = tokio::time::timeout(timeout, AssertUnwindSafe(fut).catch_unwind()).await;

        match result {
            Ok(Ok(Ok(()))) => {
                debug!(hook = %hook_name, "Hook executed successfully");
            }
            Ok(Ok(Err(e))) => {
                warn!(
                    hook = %hook_name,
                    error = %e,
                    "Hook execution failed"
                );
            }
            Ok(Err(panic)) => {
                let panic_msg = if let Some(s) = panic.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                error!(
                    hook = %hook_name,
                    panic = %panic_msg,
                    "Hook panicked!"
                );
            }
            Err(_) => {
                error!(
                    hook = %hook_name,
                    timeout_ms = timeout.as_millis() as u64,
                    "Hook timed out"
                );
            }
        }
    });
}

impl<K: Eq + Hash> fmt::Debug for SubscriptionRegistry<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("scope", &self.scope)
            .field("timeout", &self.timeout)
            .field("tracked_keys", &self.per_key.len())
            .finish_non_exhaustive()
    }
}
