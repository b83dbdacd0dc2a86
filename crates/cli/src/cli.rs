//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// timelink - demand-driven linking of time-stepping components
#[derive(Parser, Debug)]
#[command(
    name = "timelink",
    author,
    version,
    about = "Pull-driven component linking engine",
    long_about = "Links time-stepping components through exchange items.\n\n\
                  Consumers pull values at requested times; producers are advanced \n\
                  on demand, and adapters transform records along the way."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "TIMELINK_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format (overrides the settings file)
    #[arg(long, value_enum, global = true, env = "TIMELINK_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the built-in demo composition
    Demo(DemoArgs),

    /// Validate a settings file without running
    Validate(ValidateArgs),

    /// Display settings and built-in adapters
    Info(InfoArgs),
}

/// Arguments for the `demo` command
#[derive(Parser, Debug, Clone)]
pub struct DemoArgs {
    /// Settings file (TOML or JSON); engine defaults when omitted
    #[arg(short, long, env = "TIMELINK_CONFIG")]
    pub config: Option<PathBuf>,

    /// First pulled time
    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    pub start: f64,

    /// Last pulled time
    #[arg(long, default_value = "10")]
    pub end: f64,

    /// Distance between pulled times
    #[arg(long, default_value = "1")]
    pub step: f64,

    /// Time step of the ramp producer
    #[arg(long, default_value = "0.5")]
    pub ramp_step: f64,

    /// Time after which the ramp producer reports done
    #[arg(long)]
    pub ramp_end: Option<f64>,

    /// Number of elements the ramp publishes
    #[arg(long, default_value = "3")]
    pub elements: usize,

    /// Factor of the linear conversion stage
    #[arg(long, default_value = "2", allow_negative_numbers = true)]
    pub factor: f64,

    /// Offset of the linear conversion stage
    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    pub offset: f64,

    /// Append a time-average stage with this window
    #[arg(long)]
    pub average_window: Option<f64>,

    /// Also run a bidirectionally coupled component pair
    #[arg(long)]
    pub coupled: bool,

    /// Override engine.retry_limit from the settings file
    #[arg(long, env = "TIMELINK_RETRY_LIMIT")]
    pub retry_limit: Option<usize>,

    /// Wall-clock timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "30", env = "TIMELINK_TIMEOUT")]
    pub timeout: u64,

    /// Prometheus metrics port (overrides the settings file)
    #[arg(long, env = "TIMELINK_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to settings file to validate
    #[arg(short, long, default_value = "timelink.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to settings file; engine defaults when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// List the built-in adapter stages
    #[arg(long)]
    pub adapters: bool,
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

impl From<LogFormat> for contracts::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
