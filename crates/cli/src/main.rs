//! # timelink CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - 内置演示组合的运行
//! - 墙钟超时保护

mod cli;
mod commands;
mod error;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use contracts::{EngineSettings, LoggingConfig};
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{load_demo_settings, run_demo, run_info, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // The demo reads its logging section before the subscriber exists
    let settings = match &cli.command {
        Commands::Demo(args) => load_demo_settings(args)?,
        _ => EngineSettings::default(),
    };

    observability::init_with_config(observability_config(&cli, &settings.logging))?;

    info!(version = env!("CARGO_PKG_VERSION"), "timelink starting");

    let result = match &cli.command {
        Commands::Demo(args) => run_demo(args, settings).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Merge CLI logging flags over the settings file
fn observability_config(cli: &Cli, logging: &LoggingConfig) -> ObservabilityConfig {
    let mut config = ObservabilityConfig::from(logging);

    if cli.quiet {
        config.default_log_level = "warn".to_string();
    } else if cli.verbose > 0 {
        config.default_log_level = match cli.verbose {
            1 => "debug",
            _ => "trace",
        }
        .to_string();
    }
    if let Some(format) = cli.log_format {
        config.log_format = format.into();
    }
    config
}
