//! Authority/replica coordinator.
//!
//! ```text
//!  Authority                                   Replica
//!  ─────────                                   ───────
//!  Cache::write(k, v)
//!    └─ PushHook ── gate(peer, k)? ──notice(k)──▶ listener
//!                                                 └─ gate(local, k)?
//!                                                    └─ spawn pull task
//!  PullEndpoint ◀──────────────pull(k)──────────────┘
//!    └─ gate(peer, k)? ─ read(k) ─ encode ──────▶ decode ─ Cache::write(k, v)
//! ```
//!
//! Notices are best-effort and never retried. A missed notice is only
//! corrected by the next write of the same key or an explicit [`Replicator::grab`].

use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use relaycache_core::events::{HookError, UpdateHook};
use relaycache_core::{AuthorizationGate, Cache, GateDecision};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::codec::{Codec, Payload};
use crate::error::{CodecError, ReplicationError, Result};
use crate::role::Role;
use crate::transport::{PullHandler, Transport};

/// Default upper bound on a single pull round-trip.
pub const DEFAULT_PULL_TIMEOUT: Duration = Duration::from_secs(30);

/// Replication settings.
#[derive(Debug, Clone)]
pub struct ReplicationConfig {
    /// Whether the authority sends notices on writes. Pulls are served either way.
    pub push_enabled: bool,
    /// Upper bound on a single pull round-trip.
    pub pull_timeout: Duration,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            push_enabled: true,
            pull_timeout: DEFAULT_PULL_TIMEOUT,
        }
    }
}

impl ReplicationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_push(mut self, enabled: bool) -> Self {
        self.push_enabled = enabled;
        self
    }

    pub fn with_pull_timeout(mut self, timeout: Duration) -> Self {
        self.pull_timeout = timeout;
        self
    }
}

/// Wires a [`Cache`] to a [`Transport`] in a fixed [`Role`].
pub struct Replicator<K, V, T>
where
    T: Transport<K, V>,
{
    role: Role,
    cache: Arc<Cache<K, V>>,
    gate: Arc<AuthorizationGate<T::Peer, K>>,
    transport: Arc<T>,
    codec: Option<Arc<dyn Codec<V>>>,
    config: ReplicationConfig,
    enabled: AtomicBool,
    /// Dropping the sender stops the replica listener.
    listener_stop: Mutex<Option<oneshot::Sender<()>>>,
}

impl<K, V, T> Replicator<K, V, T>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    T: Transport<K, V>,
{
    pub fn new(
        role: Role,
        cache: Arc<Cache<K, V>>,
        transport: Arc<T>,
        config: ReplicationConfig,
    ) -> Self {
        Self {
            role,
            cache,
            gate: Arc::new(AuthorizationGate::new()),
            transport,
            codec: None,
            config,
            enabled: AtomicBool::new(false),
            listener_stop: Mutex::new(None),
        }
    }

    /// Set the encode/decode hooks.
    pub fn with_codec(mut self, codec: Arc<dyn Codec<V>>) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn cache(&self) -> &Arc<Cache<K, V>> {
        &self.cache
    }

    pub fn gate(&self) -> &AuthorizationGate<T::Peer, K> {
        &self.gate
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    /// Append an authorization rule.
    pub fn add_rule<F>(&self, rule: F)
    where
        F: Fn(&T::Peer, &K) -> bool + Send + Sync + 'static,
    {
        self.gate.add_rule(rule);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Start replicating in this instance's role.
    ///
    /// - Authority: serves pulls and, when push is enabled, sends a notice to
    ///   every authorized peer on each write.
    /// - Replica: listens for notices and pulls each authorized key.
    ///
    /// May be called once; must be called from within a tokio runtime. The
    /// cache's hook dispatch is pinned to that runtime, so later writes from
    /// any thread still replicate.
    pub fn enable_replication(self: &Arc<Self>) -> Result<()> {
        if self
            .enabled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ReplicationError::AlreadyEnabled);
        }

        let result = match Handle::try_current() {
            Ok(handle) => {
                let started = match self.role {
                    Role::Authority => self.start_authority(),
                    Role::Replica => self.start_replica(handle.clone()),
                };
                if started.is_ok() {
                    self.cache.registry().pin_runtime(handle);
                }
                started
            }
            Err(_) => Err(ReplicationError::NoRuntime),
        };

        if result.is_err() {
            self.enabled.store(false, Ordering::SeqCst);
        }
        result
    }

    /// Fetch the authority's current value for `key` without caching it.
    ///
    /// Pair with [`Cache::write`] when the result should be kept locally.
    pub async fn grab(&self, key: &K) -> Result<Option<V>> {
        if !self.role.is_replica() {
            return Err(ReplicationError::WrongRole {
                expected: Role::Replica,
                actual: self.role,
            });
        }
        self.pull_value(key).await
    }

    fn start_authority(&self) -> Result<()> {
        let endpoint = PullEndpoint {
            scope: self.cache.name().to_string(),
            cache: Arc::downgrade(&self.cache),
            gate: self.gate.clone(),
            codec: self.codec.clone(),
        };
        self.transport.serve_pulls(Arc::new(endpoint))?;

        if self.config.push_enabled {
            let hook = PushHook {
                name: format!("{}:replication-push", self.cache.name()),
                cache: Arc::downgrade(&self.cache),
                gate: self.gate.clone(),
                transport: self.transport.clone(),
            };
            self.cache.registry().register_hook(Arc::new(hook));
        }

        info!(
            cache = %self.cache.name(),
            push = self.config.push_enabled,
            "Replication enabled as authority"
        );
        Ok(())
    }

    fn start_replica(self: &Arc<Self>, handle: Handle) -> Result<()> {
        let local = self.transport.local_peer()?;
        let mut notices = self.transport.take_notices()?;
        let weak = Arc::downgrade(self);
        let scope = self.cache.name().to_string();
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        *self
            .listener_stop
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(stop_tx);

        info!(cache = %scope, peer = %local, "Replication enabled as replica");

        handle.spawn(async move {
            loop {
                let key = tokio::select! {
                    _ = &mut stop_rx => break,
                    next = notices.recv() => match next {
                        Some(key) => key,
                        None => break,
                    },
                };
                let Some(this) = weak.upgrade() else {
                    break;
                };

                if let GateDecision::Deny { rule } = this.gate.evaluate(&local, &key) {
                    debug!(cache = %scope, key = ?key, rule = %rule, "Ignoring notice denied by local gate");
                    continue;
                }

                // One task per notice so a slow pull never holds up the next.
                tokio::spawn(async move {
                    this.apply_notice(key).await;
                });
            }
            debug!(cache = %scope, "Replica listener stopped");
        });

        Ok(())
    }

    async fn apply_notice(&self, key: K) {
        match self.pull_value(&key).await {
            Ok(Some(value)) => {
                debug!(cache = %self.cache.name(), key = ?key, "Applied pulled value");
                self.cache.write(key, value);
            }
            Ok(None) => {
                debug!(cache = %self.cache.name(), key = ?key, "Pulled value absent, nothing to store");
            }
            Err(e) => {
                warn!(cache = %self.cache.name(), key = ?key, error = %e, "Pull after notice failed");
            }
        }
    }

    async fn pull_value(&self, key: &K) -> Result<Option<V>> {
        let timeout = self.config.pull_timeout;
        let payload = tokio::time::timeout(timeout, self.transport.pull(key))
            .await
            .map_err(|_| ReplicationError::Timeout(timeout))??;

        match payload {
            Some(payload) => Ok(Some(self.decode(payload)?)),
            None => Ok(None),
        }
    }

    fn decode(&self, payload: Payload<V>) -> std::result::Result<V, CodecError> {
        match (payload, &self.codec) {
            (Payload::Value(value), _) => Ok(value),
            (Payload::Encoded(bytes), Some(codec)) => codec.decode(&bytes),
            (Payload::Encoded(_), None) => Err(CodecError::MissingDecoder),
        }
    }
}

impl<K, V, T> fmt::Debug for Replicator<K, V, T>
where
    T: Transport<K, V>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Replicator")
            .field("role", &self.role)
            .field("config", &self.config)
            .field("enabled", &self.enabled.load(Ordering::Relaxed))
            .field("codec", &self.codec.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Authority side
// ============================================================================

/// Global update hook that fans a write out to every authorized peer.
struct PushHook<K, V, T>
where
    T: Transport<K, V>,
{
    name: String,
    cache: Weak<Cache<K, V>>,
    gate: Arc<AuthorizationGate<T::Peer, K>>,
    transport: Arc<T>,
}

#[async_trait]
impl<K, V, T> UpdateHook<K> for PushHook<K, V, T>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    T: Transport<K, V>,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_update(&self, key: &K) -> std::result::Result<(), HookError> {
        let Some(cache) = self.cache.upgrade() else {
            return Ok(());
        };
        if !cache.contains_key(key) {
            debug!(key = ?key, "Entry gone before push, skipping notices");
            return Ok(());
        }

        for peer in self.transport.peers() {
            if let GateDecision::Deny { rule } = self.gate.evaluate(&peer, key) {
                debug!(key = ?key, peer = %peer, rule = %rule, "Notice suppressed by gate");
                continue;
            }

            // Sends are independent; one slow or failing peer affects no other.
            let transport = self.transport.clone();
            let key = key.clone();
            tokio::spawn(async move {
                match transport.notify(&peer, &key).await {
                    Ok(()) => debug!(key = ?key, peer = %peer, "Sent update notice"),
                    Err(e) => warn!(key = ?key, peer = %peer, error = %e, "Failed to send update notice"),
                }
            });
        }
        Ok(())
    }
}

/// Pull endpoint served by the authority.
struct PullEndpoint<K, V, P> {
    scope: String,
    cache: Weak<Cache<K, V>>,
    gate: Arc<AuthorizationGate<P, K>>,
    codec: Option<Arc<dyn Codec<V>>>,
}

#[async_trait]
impl<K, V, P> PullHandler<P, K, V> for PullEndpoint<K, V, P>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    P: fmt::Display + Send + Sync + 'static,
{
    async fn handle_pull(&self, peer: &P, key: &K) -> Option<Payload<V>> {
        if let GateDecision::Deny { rule } = self.gate.evaluate(peer, key) {
            debug!(cache = %self.scope, key = ?key, peer = %peer, rule = %rule, "Pull denied by gate");
            return None;
        }

        let value = self.cache.upgrade()?.read(key)?;

        match &self.codec {
            None => Some(Payload::Value(value)),
            Some(codec) => match codec.encode(&value) {
                Ok(bytes) => Some(Payload::Encoded(bytes)),
                Err(e) => {
                    warn!(cache = %self.scope, key = ?key, error = %e, "Failed to encode value for pull");
                    None
                }
            },
        }
    }
}
