use std::time::Duration;

use relaycache_core::CacheConfig;
use relaycache_replication::{ReplicationConfig, Role};
use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

const VALID_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayCacheConfig {
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub replication: ReplicationSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RelayCacheConfig {
    pub fn validate(&self) -> Result<()> {
        if self.cache.name.trim().is_empty() {
            return Err(ConfigError::validation("cache.name must not be empty"));
        }
        if self.cache.cleanup_interval_ms == 0 {
            return Err(ConfigError::validation("cache.cleanup_interval_ms must be > 0"));
        }
        if self.cache.hook_timeout_ms == 0 {
            return Err(ConfigError::validation("cache.hook_timeout_ms must be > 0"));
        }
        if self.replication.pull_timeout_ms == 0 {
            return Err(ConfigError::validation(
                "replication.pull_timeout_ms must be > 0",
            ));
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        if !VALID_LEVELS.contains(&lvl.as_str()) {
            return Err(ConfigError::validation(format!(
                "logging.level must be one of {VALID_LEVELS:?}"
            )));
        }
        Ok(())
    }

    /// Settings for the local [`Cache`](relaycache_core::Cache).
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .with_name(self.cache.name.clone())
            .with_cleanup_interval(Duration::from_millis(self.cache.cleanup_interval_ms))
            .with_hook_timeout(Duration::from_millis(self.cache.hook_timeout_ms))
    }

    /// Settings for the [`Replicator`](relaycache_replication::Replicator).
    pub fn replication_config(&self) -> ReplicationConfig {
        ReplicationConfig::new()
            .with_push(self.replication.push_enabled)
            .with_pull_timeout(Duration::from_millis(self.replication.pull_timeout_ms))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Namespace of the instance; appears in every log line.
    #[serde(default = "default_cache_name")]
    pub name: String,
    #[serde(default = "default_cleanup_interval_ms")]
    pub cleanup_interval_ms: u64,
    #[serde(default = "default_hook_timeout_ms")]
    pub hook_timeout_ms: u64,
}

fn default_cache_name() -> String {
    "default".into()
}
fn default_cleanup_interval_ms() -> u64 {
    60_000
}
fn default_hook_timeout_ms() -> u64 {
    30_000
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            name: default_cache_name(),
            cleanup_interval_ms: default_cleanup_interval_ms(),
            hook_timeout_ms: default_hook_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationSettings {
    #[serde(default = "default_role")]
    pub role: Role,
    #[serde(default = "default_true")]
    pub push_enabled: bool,
    #[serde(default = "default_pull_timeout_ms")]
    pub pull_timeout_ms: u64,
    #[serde(default)]
    pub codec: CodecKind,
}

fn default_role() -> Role {
    Role::Authority
}
fn default_true() -> bool {
    true
}
fn default_pull_timeout_ms() -> u64 {
    30_000
}

impl Default for ReplicationSettings {
    fn default() -> Self {
        Self {
            role: default_role(),
            push_enabled: true,
            pull_timeout_ms: default_pull_timeout_ms(),
            codec: CodecKind::default(),
        }
    }
}

/// Wire treatment of replicated values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    /// Values cross the transport unmodified.
    #[default]
    None,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = RelayCacheConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.cache.name, "default");
        assert_eq!(cfg.replication.role, Role::Authority);
        assert_eq!(cfg.replication.codec, CodecKind::None);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_zero_intervals_rejected() {
        let mut cfg = RelayCacheConfig::default();
        cfg.cache.cleanup_interval_ms = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("cleanup_interval_ms"));

        let mut cfg = RelayCacheConfig::default();
        cfg.replication.pull_timeout_ms = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        let mut cfg = RelayCacheConfig::default();
        cfg.logging.level = "loud".into();
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));

        cfg.logging.level = "DEBUG".into();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_conversion_into_runtime_settings() {
        let mut cfg = RelayCacheConfig::default();
        cfg.cache.name = "scores".into();
        cfg.cache.cleanup_interval_ms = 1_500;
        cfg.replication.push_enabled = false;
        cfg.replication.pull_timeout_ms = 250;

        let cache = cfg.cache_config();
        assert_eq!(cache.name, "scores");
        assert_eq!(cache.cleanup_interval, Duration::from_millis(1_500));

        let repl = cfg.replication_config();
        assert!(!repl.push_enabled);
        assert_eq!(repl.pull_timeout, Duration::from_millis(250));
    }
}
