//! `demo` command implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::EngineSettings;
use tracing::info;

use crate::cli::DemoArgs;
use crate::error::CliError;
use crate::pipeline::{DemoConfig, DemoPipeline};

/// Load the settings file (if any) and apply CLI overrides
pub fn load_demo_settings(args: &DemoArgs) -> Result<EngineSettings> {
    let mut settings = match &args.config {
        Some(path) => {
            if !path.exists() {
                return Err(CliError::config_not_found(path.display().to_string()).into());
            }
            ConfigLoader::load_from_path(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?
        }
        None => EngineSettings::default(),
    };

    if let Some(limit) = args.retry_limit {
        settings.engine.retry_limit = limit;
    }
    if let Some(port) = args.metrics_port {
        settings.logging.metrics_port = Some(port);
    }

    ConfigLoader::validate(&settings).context("Invalid settings after CLI overrides")?;
    Ok(settings)
}

/// Execute the `demo` command
pub async fn run_demo(args: &DemoArgs, settings: EngineSettings) -> Result<()> {
    let config = DemoConfig {
        engine: settings.engine,
        start: args.start,
        end: args.end,
        step: args.step,
        ramp_step: args.ramp_step,
        ramp_end: args.ramp_end,
        elements: args.elements,
        factor: args.factor,
        offset: args.offset,
        average_window: args.average_window,
        coupled: args.coupled,
    };
    config.check()?;

    info!(
        start = config.start,
        end = config.end,
        step = config.step,
        retry_limit = config.engine.retry_limit,
        coupled = config.coupled,
        "Starting demo composition"
    );

    // The pull loop is synchronous; keep it off the async workers
    let pipeline = DemoPipeline::new(config);
    let task = tokio::task::spawn_blocking(move || pipeline.run());

    let joined = if args.timeout == 0 {
        task.await
    } else {
        tokio::time::timeout(Duration::from_secs(args.timeout), task)
            .await
            .map_err(|_| CliError::Timeout {
                seconds: args.timeout,
            })?
    };
    let stats = joined
        .context("Demo task panicked")?
        .context("Demo execution failed")?;

    if args.json {
        println!("{}", stats.to_json().context("Failed to serialize demo result")?);
    } else {
        stats.print_summary();
    }

    info!(
        pulls = stats.metrics.total_pulls,
        duration_secs = stats.duration.as_secs_f64(),
        "Demo completed"
    );
    Ok(())
}
