mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use relaycache_config::{load_config, observability};

use cli::{Cli, Commands};
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let format = cli.format.unwrap_or_default();
    observability::init_tracing_with_level(cli.log_level.as_deref().unwrap_or("info"));

    let cfg = load_config(cli.config.as_deref())?;
    // --log-level and RUST_LOG both outrank the configured level.
    if cli.log_level.is_none() && std::env::var_os("RUST_LOG").is_none() {
        observability::apply_logging_level(&cfg.logging.level);
    }

    match &cli.command {
        Commands::Demo(args) => commands::demo::run(&cfg, args, format).await?,
        Commands::CheckConfig => commands::check_config::run(&cfg, format)?,
    }
    Ok(())
}
