use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "relaycache")]
#[command(about = "RelayCache: replicated TTL cache toolkit")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to ./relaycache.toml when present)
    #[arg(short, long, global = true, env = "RELAYCACHE_CONFIG")]
    pub config: Option<String>,

    /// Log level override (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run an authority and replicas in-process and report what each replica sees
    Demo(DemoArgs),
    /// Validate configuration and print the resolved settings
    CheckConfig,
}

#[derive(Args, Debug, Clone)]
pub struct DemoArgs {
    /// Number of replicas to connect
    #[arg(short, long, default_value_t = 2)]
    pub replicas: usize,

    /// Key written by the authority
    #[arg(short, long, default_value = "score")]
    pub key: String,

    /// Value written by the authority; parsed as JSON, otherwise taken as a string
    #[arg(short, long, default_value = "42")]
    pub value: String,

    /// Lifetime of the authority's entry in milliseconds (unbounded if omitted)
    #[arg(long)]
    pub ttl_ms: Option<u64>,

    /// Replica ids the authority refuses to replicate to (e.g. replica-2)
    #[arg(long)]
    pub deny: Vec<String>,

    /// Replica ids whose notices are lost in transit
    #[arg(long)]
    pub drop: Vec<String>,

    /// How long to wait for pushes to settle, in milliseconds
    #[arg(long, default_value_t = 200)]
    pub wait_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_defaults() {
        let cli = Cli::try_parse_from(["relaycache", "demo"]).unwrap();
        let Commands::Demo(args) = cli.command else {
            panic!("expected demo");
        };
        assert_eq!(args.replicas, 2);
        assert_eq!(args.key, "score");
        assert!(args.ttl_ms.is_none());
        assert!(cli.format.is_none());
    }

    #[test]
    fn test_repeated_flags_collect() {
        let cli = Cli::try_parse_from([
            "relaycache",
            "demo",
            "--deny",
            "replica-1",
            "--deny",
            "replica-3",
            "--format",
            "json",
        ])
        .unwrap();
        let Commands::Demo(args) = cli.command else {
            panic!("expected demo");
        };
        assert_eq!(args.deny, vec!["replica-1", "replica-3"]);
        assert_eq!(cli.format, Some(OutputFormat::Json));
    }

    #[test]
    fn test_check_config_accepts_global_config_flag() {
        let cli =
            Cli::try_parse_from(["relaycache", "check-config", "--config", "x.toml"]).unwrap();
        assert!(matches!(cli.command, Commands::CheckConfig));
        assert_eq!(cli.config.as_deref(), Some("x.toml"));
    }
}
