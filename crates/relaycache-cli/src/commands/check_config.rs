use anyhow::Result;
use relaycache_config::RelayCacheConfig;

use crate::cli::OutputFormat;
use crate::output::{print_json, print_rows, print_success};

pub fn run(cfg: &RelayCacheConfig, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&serde_json::to_value(cfg)?),
        OutputFormat::Table => print_rows(&["Setting", "Value"], &settings_rows(cfg), format),
    }
    print_success("Configuration is valid");
    Ok(())
}

fn settings_rows(cfg: &RelayCacheConfig) -> Vec<Vec<String>> {
    let rows = [
        ("cache.name", cfg.cache.name.clone()),
        ("cache.cleanup_interval_ms", cfg.cache.cleanup_interval_ms.to_string()),
        ("cache.hook_timeout_ms", cfg.cache.hook_timeout_ms.to_string()),
        ("replication.role", cfg.replication.role.to_string()),
        ("replication.push_enabled", cfg.replication.push_enabled.to_string()),
        ("replication.pull_timeout_ms", cfg.replication.pull_timeout_ms.to_string()),
        ("replication.codec", format!("{:?}", cfg.replication.codec).to_lowercase()),
        ("logging.level", cfg.logging.level.clone()),
    ];
    rows.into_iter()
        .map(|(name, value)| vec![name.to_string(), value])
        .collect()
}
