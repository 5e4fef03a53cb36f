//! Transport abstraction between authority and replicas.
//!
//! The transport is supplied by the environment. It must offer a
//! fire-and-forget notice to one peer, a request/response pull against the
//! authority, and the set of currently connected peers. A single trait
//! covers both halves; an endpoint rejects the half that does not apply to
//! its role with [`TransportError::Unsupported`].

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::codec::Payload;
use crate::error::TransportError;

/// Authority-side handler answering pull requests.
#[async_trait]
pub trait PullHandler<P, K, V>: Send + Sync {
    /// Answer a pull of `key` issued by `peer`. `None` means "not available".
    async fn handle_pull(&self, peer: &P, key: &K) -> Option<Payload<V>>;
}

/// Peer-addressable channel between one authority and its replicas.
#[async_trait]
pub trait Transport<K, V>: Send + Sync + 'static {
    /// Peer identity.
    type Peer: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static;

    // ------------------------------------------------------------------
    // Authority half
    // ------------------------------------------------------------------

    /// Peers currently connected to the authority.
    fn peers(&self) -> Vec<Self::Peer>;

    /// Send a "key changed" notice to `peer`.
    async fn notify(&self, peer: &Self::Peer, key: &K) -> Result<(), TransportError>;

    /// Route incoming pulls to `handler`, replacing any previous handler.
    fn serve_pulls(
        &self,
        handler: Arc<dyn PullHandler<Self::Peer, K, V>>,
    ) -> Result<(), TransportError>;

    // ------------------------------------------------------------------
    // Replica half
    // ------------------------------------------------------------------

    /// This process's identity as seen by the authority.
    fn local_peer(&self) -> Result<Self::Peer, TransportError>;

    /// Take the stream of incoming notices. Only one taker is allowed.
    fn take_notices(&self) -> Result<mpsc::UnboundedReceiver<K>, TransportError>;

    /// Ask the authority for the current value of `key`.
    async fn pull(&self, key: &K) -> Result<Option<Payload<V>>, TransportError>;
}
