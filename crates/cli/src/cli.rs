//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Loki Event Collector - forwards Kubernetes events to log receivers
#[derive(Parser, Debug)]
#[command(
    name = "loki-event-collector",
    author,
    version,
    about = "Kubernetes event collector",
    long_about = "Watches Kubernetes Event objects and forwards recent events to Loki,\n\
                  stdout or a discard receiver.\n\n\
                  Optionally runs as a singleton across replicas via lease-based \n\
                  leader election."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "EVENT_COLLECTOR_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format (overrides the config file)
    #[arg(long, value_enum, global = true, env = "EVENT_COLLECTOR_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Log level from flags, `None` to use the configured one
    pub fn level_override(&self) -> Option<&'static str> {
        if self.quiet {
            return Some("error");
        }
        match self.verbose {
            0 => None,
            1 => Some("debug"),
            _ => Some("trace"),
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch events and forward them to the configured receivers
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); searched for when omitted
    #[arg(short, long, env = "EVENT_COLLECTOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Only process events while holding the leader lease
    #[arg(long, env = "EVENT_COLLECTOR_LEADER_ELECT")]
    pub leader_elect: bool,

    /// Override the number of queue workers
    #[arg(long, env = "EVENT_COLLECTOR_WORKERS")]
    pub workers: Option<usize>,

    /// Override the metrics server port (0 = disabled)
    #[arg(long, env = "EVENT_COLLECTOR_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate; searched for when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
