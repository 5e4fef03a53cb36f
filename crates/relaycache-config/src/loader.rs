use std::io;
use std::path::PathBuf;

use config::{Config, Environment, File};
use tracing::debug;

use crate::settings::RelayCacheConfig;
use crate::{ConfigError, Result};

/// File picked up from the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "relaycache.toml";

/// Load configuration from `path` (or [`DEFAULT_CONFIG_FILE`] if present),
/// then apply environment overrides, e.g. `RELAYCACHE__REPLICATION__ROLE=replica`.
///
/// An explicit path that does not exist is an error; a missing default file is not.
pub fn load_config(path: Option<&str>) -> Result<RelayCacheConfig> {
    let mut builder = Config::builder();
    match path {
        Some(p) => {
            let pathbuf = PathBuf::from(p);
            if !pathbuf.exists() {
                return Err(ConfigError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("config file not found: {p}"),
                )));
            }
            builder = builder.add_source(File::from(pathbuf));
        }
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                debug!(path = DEFAULT_CONFIG_FILE, "Using default config file");
                builder = builder.add_source(File::from(default_path));
            }
        }
    }
    builder = builder.add_source(
        Environment::with_prefix("RELAYCACHE")
            .try_parsing(true)
            .separator("__"),
    );

    let merged: RelayCacheConfig = builder.build()?.try_deserialize()?;
    merged.validate()?;
    Ok(merged)
}

/// Parse and validate a TOML document without consulting the environment.
pub fn load_config_str(content: &str) -> Result<RelayCacheConfig> {
    let cfg: RelayCacheConfig = toml::from_str(content)?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CodecKind;
    use relaycache_replication::Role;

    #[test]
    fn test_empty_document_uses_defaults() {
        let cfg = load_config_str("").unwrap();
        assert_eq!(cfg.cache.cleanup_interval_ms, 60_000);
        assert!(cfg.replication.push_enabled);
    }

    #[test]
    fn test_sections_parse() {
        let cfg = load_config_str(
            r#"
[cache]
name = "scores"

[replication]
role = "replica"
codec = "json"
"#,
        )
        .unwrap();
        assert_eq!(cfg.cache.name, "scores");
        assert_eq!(cfg.replication.role, Role::Replica);
        assert_eq!(cfg.replication.codec, CodecKind::Json);
    }

    #[test]
    fn test_bad_role_is_parse_error() {
        let err = load_config_str("[replication]\nrole = \"leader\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_explicit_file_is_io_error() {
        let err = load_config(Some("/definitely/not/here/relaycache.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
