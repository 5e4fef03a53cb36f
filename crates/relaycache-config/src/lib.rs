//! Configuration for RelayCache processes.
//!
//! Settings come from an optional TOML file overlaid with
//! `RELAYCACHE__SECTION__KEY` environment variables:
//!
//! ```toml
//! [cache]
//! name = "scores"
//! cleanup_interval_ms = 60000
//!
//! [replication]
//! role = "replica"
//! pull_timeout_ms = 5000
//! codec = "json"
//!
//! [logging]
//! level = "debug"
//! ```

pub mod loader;
pub mod observability;
pub mod settings;

pub use loader::{DEFAULT_CONFIG_FILE, load_config, load_config_str};
pub use settings::{CacheSettings, CodecKind, LoggingConfig, RelayCacheConfig, ReplicationSettings};

/// Error types for configuration operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl ConfigError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(e: config::ConfigError) -> Self {
        Self::Parse(e.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
