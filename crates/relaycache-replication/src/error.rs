use std::time::Duration;

use thiserror::Error;

use crate::role::Role;

/// Failures of the underlying message channel.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Peer unreachable: {0}")]
    Unreachable(String),

    #[error("No pull endpoint is being served")]
    NotServing,

    #[error("Operation not supported on this endpoint: {0}")]
    Unsupported(&'static str),

    #[error("Notice stream already taken")]
    AlreadySubscribed,

    #[error("Channel closed")]
    Closed,
}

impl TransportError {
    pub fn unreachable(peer: impl std::fmt::Display) -> Self {
        Self::Unreachable(peer.to_string())
    }
}

/// Failures of the encode/decode hooks.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Encode failed: {0}")]
    Encode(String),

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Received an encoded payload but no decoder is configured")]
    MissingDecoder,

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CodecError {
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }
}

/// Errors surfaced by replication entry points.
#[derive(Debug, Error)]
pub enum ReplicationError {
    #[error("Replication is already enabled")]
    AlreadyEnabled,

    #[error("Operation requires the {expected} role, but this instance is {actual}")]
    WrongRole { expected: Role, actual: Role },

    #[error("No async runtime available")]
    NoRuntime,

    #[error("Pull timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Result type for replication operations
pub type Result<T> = std::result::Result<T, ReplicationError>;
