//! Push-then-pull replication between one authority and many replicas.
//!
//! The authority owns the data. On each write it sends a small "key changed"
//! notice to every peer the [`AuthorizationGate`](relaycache_core::AuthorizationGate)
//! admits; each replica then pulls the value, optionally through a [`Codec`],
//! and stores it locally without a lifetime.
//!
//! Transports are pluggable through [`Transport`]. [`MemoryNetwork`] is an
//! in-process implementation used by tests and the CLI demo.

pub mod codec;
pub mod error;
pub mod memory;
pub mod replicator;
pub mod role;
pub mod transport;

pub use codec::{Codec, FnCodec, JsonCodec, Payload};
pub use error::{CodecError, ReplicationError, Result, TransportError};
pub use memory::{MemoryEndpoint, MemoryNetwork, PeerId};
pub use replicator::{DEFAULT_PULL_TIMEOUT, ReplicationConfig, Replicator};
pub use role::Role;
pub use transport::{PullHandler, Transport};
