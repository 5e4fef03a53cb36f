//! In-process transport.
//!
//! A [`MemoryNetwork`] is a hub with one authority endpoint and any number
//! of replica endpoints. Notices travel over unbounded channels; pulls call
//! the authority's handler directly. Peers can be disconnected, and notice
//! delivery to a single peer can be switched off to simulate loss.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::codec::Payload;
use crate::error::TransportError;
use crate::transport::{PullHandler, Transport};

/// Identity of a connected replica.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

type SharedPullHandler<K, V> = Arc<dyn PullHandler<PeerId, K, V>>;

struct ReplicaSlot<K> {
    sender: mpsc::UnboundedSender<K>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<K>>>,
    drop_notices: AtomicBool,
}

struct Hub<K, V> {
    handler: RwLock<Option<SharedPullHandler<K, V>>>,
    replicas: DashMap<PeerId, Arc<ReplicaSlot<K>>>,
}

impl<K, V> Hub<K, V> {
    fn slot(&self, peer: &PeerId) -> Option<Arc<ReplicaSlot<K>>> {
        self.replicas.get(peer).map(|slot| slot.value().clone())
    }

    fn handler(&self) -> Option<SharedPullHandler<K, V>> {
        self.handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// In-process hub connecting one authority to many replicas.
pub struct MemoryNetwork<K, V> {
    hub: Arc<Hub<K, V>>,
}

impl<K, V> MemoryNetwork<K, V> {
    pub fn new() -> Self {
        Self {
            hub: Arc::new(Hub {
                handler: RwLock::new(None),
                replicas: DashMap::new(),
            }),
        }
    }

    /// Endpoint for the authority process.
    pub fn authority(&self) -> MemoryEndpoint<K, V> {
        MemoryEndpoint {
            hub: self.hub.clone(),
            side: Side::Authority,
        }
    }

    /// Connect a replica. Reconnecting an existing id replaces its channel.
    pub fn connect(&self, peer: impl Into<PeerId>) -> MemoryEndpoint<K, V> {
        let peer = peer.into();
        let (sender, receiver) = mpsc::unbounded_channel();
        self.hub.replicas.insert(
            peer.clone(),
            Arc::new(ReplicaSlot {
                sender,
                receiver: Mutex::new(Some(receiver)),
                drop_notices: AtomicBool::new(false),
            }),
        );
        debug!(peer = %peer, "Replica connected");

        MemoryEndpoint {
            hub: self.hub.clone(),
            side: Side::Replica(peer),
        }
    }

    /// Remove a replica. Its notice stream ends and later calls fail.
    pub fn disconnect(&self, peer: &PeerId) -> bool {
        let removed = self.hub.replicas.remove(peer).is_some();
        if removed {
            debug!(peer = %peer, "Replica disconnected");
        }
        removed
    }

    /// Silently discard notices addressed to `peer` while `drop` is set.
    pub fn set_drop_notices(&self, peer: &PeerId, drop: bool) -> bool {
        match self.hub.slot(peer) {
            Some(slot) => {
                slot.drop_notices.store(drop, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    pub fn connected_peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self.hub.replicas.iter().map(|e| e.key().clone()).collect();
        peers.sort();
        peers
    }

    /// Whether the authority has installed a pull handler.
    pub fn is_serving(&self) -> bool {
        self.hub.handler().is_some()
    }
}

impl<K, V> Default for MemoryNetwork<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for MemoryNetwork<K, V> {
    fn clone(&self) -> Self {
        Self {
            hub: self.hub.clone(),
        }
    }
}

impl<K, V> fmt::Debug for MemoryNetwork<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryNetwork")
            .field("replicas", &self.hub.replicas.len())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
enum Side {
    Authority,
    Replica(PeerId),
}

/// One side of a [`MemoryNetwork`].
pub struct MemoryEndpoint<K, V> {
    hub: Arc<Hub<K, V>>,
    side: Side,
}

impl<K, V> MemoryEndpoint<K, V> {
    fn require_authority(&self, op: &'static str) -> Result<(), TransportError> {
        match self.side {
            Side::Authority => Ok(()),
            Side::Replica(_) => Err(TransportError::Unsupported(op)),
        }
    }

    fn require_replica(&self, op: &'static str) -> Result<&PeerId, TransportError> {
        match &self.side {
            Side::Replica(peer) => Ok(peer),
            Side::Authority => Err(TransportError::Unsupported(op)),
        }
    }
}

impl<K, V> fmt::Debug for MemoryEndpoint<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryEndpoint")
            .field("side", &self.side)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<K, V> Transport<K, V> for MemoryEndpoint<K, V>
where
    K: Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    type Peer = PeerId;

    fn peers(&self) -> Vec<PeerId> {
        match self.side {
            Side::Authority => {
                let mut peers: Vec<PeerId> =
                    self.hub.replicas.iter().map(|e| e.key().clone()).collect();
                peers.sort();
                peers
            }
            Side::Replica(_) => Vec::new(),
        }
    }

    async fn notify(&self, peer: &PeerId, key: &K) -> Result<(), TransportError> {
        self.require_authority("notify")?;
        let slot = self
            .hub
            .slot(peer)
            .ok_or_else(|| TransportError::unreachable(peer))?;

        if slot.drop_notices.load(Ordering::SeqCst) {
            trace!(peer = %peer, "Notice dropped");
            return Ok(());
        }

        slot.sender
            .send(key.clone())
            .map_err(|_| TransportError::Closed)
    }

    fn serve_pulls(
        &self,
        handler: Arc<dyn PullHandler<PeerId, K, V>>,
    ) -> Result<(), TransportError> {
        self.require_authority("serve_pulls")?;
        *self
            .hub
            .handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(handler);
        Ok(())
    }

    fn local_peer(&self) -> Result<PeerId, TransportError> {
        self.require_replica("local_peer").cloned()
    }

    fn take_notices(&self) -> Result<mpsc::UnboundedReceiver<K>, TransportError> {
        let peer = self.require_replica("take_notices")?;
        let slot = self
            .hub
            .slot(peer)
            .ok_or_else(|| TransportError::unreachable(peer))?;

        slot.receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(TransportError::AlreadySubscribed)
    }

    async fn pull(&self, key: &K) -> Result<Option<Payload<V>>, TransportError> {
        let peer = self.require_replica("pull")?;
        if !self.hub.replicas.contains_key(peer) {
            return Err(TransportError::unreachable(peer));
        }

        let handler = self.hub.handler().ok_or(TransportError::NotServing)?;
        Ok(handler.handle_pull(peer, key).await)
    }
}
