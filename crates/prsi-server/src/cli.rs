//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Flags override whatever the configuration file says.
#[derive(Debug, Clone, Default, PartialEq, Eq, Parser)]
#[command(name = "prsi-server", version, about = "Authoritative server for the Prsi card game")]
pub struct Cli {
    /// TOML configuration file with `[server]` and `[logging]` tables
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Bind address, e.g. 127.0.0.1:3750
    #[arg(short, long, value_name = "ADDRESS")]
    pub bind: Option<String>,

    /// Log filter (trace, debug, info, warn, error or a full directive)
    #[arg(short, long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Output logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Seed for deck shuffling, for reproducible games
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,
}
