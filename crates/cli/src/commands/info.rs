//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{AdapterSpec, EngineSettings, Reduction};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Settings info for JSON output
#[derive(Serialize)]
struct SettingsInfo {
    version: String,
    source: String,
    engine: EngineInfo,
    logging: LoggingInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    adapters: Vec<AdapterInfo>,
}

#[derive(Serialize)]
struct EngineInfo {
    retry_limit: usize,
    interpolation: String,
    extrapolation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    keep_history: Option<f64>,
    event_log_capacity: usize,
}

#[derive(Serialize)]
struct LoggingInfo {
    level: String,
    format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics_port: Option<u16>,
}

#[derive(Serialize)]
struct AdapterInfo {
    kind: &'static str,
    example: AdapterSpec,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    let (settings, source) = match &args.config {
        Some(path) => {
            info!(config = %path.display(), "Loading settings info");
            if !path.exists() {
                anyhow::bail!("Settings file not found: {}", path.display());
            }
            let settings = config_loader::ConfigLoader::load_from_path(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?;
            (settings, path.display().to_string())
        }
        None => (EngineSettings::default(), "defaults".to_string()),
    };

    let info = build_settings_info(&settings, source, args.adapters)?;
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize settings info")?;
        println!("{}", json);
    } else {
        print_settings_info(&info);
    }

    Ok(())
}

/// One example per built-in stage, instantiated to read its kind
fn builtin_adapters() -> Result<Vec<AdapterInfo>> {
    let examples = [
        AdapterSpec::LinearConversion {
            factor: 1.0,
            offset: 0.0,
        },
        AdapterSpec::ElementReduce {
            op: Reduction::Mean,
        },
        AdapterSpec::TimeAverage { window: 1.0 },
        AdapterSpec::ToScalar,
    ];

    examples
        .into_iter()
        .map(|example| {
            let stage = sync_engine::adapter::build(&example)
                .context("Failed to instantiate built-in adapter")?;
            Ok(AdapterInfo {
                kind: stage.kind(),
                example,
            })
        })
        .collect()
}

fn build_settings_info(
    settings: &EngineSettings,
    source: String,
    with_adapters: bool,
) -> Result<SettingsInfo> {
    let engine = &settings.engine;
    Ok(SettingsInfo {
        version: format!("{:?}", settings.version),
        source,
        engine: EngineInfo {
            retry_limit: engine.retry_limit,
            interpolation: format!("{:?}", engine.cache.interpolation),
            extrapolation: format!("{:?}", engine.cache.extrapolation),
            keep_history: engine.cache.keep_history,
            event_log_capacity: engine.event_log_capacity,
        },
        logging: LoggingInfo {
            level: settings.logging.level.clone(),
            format: format!("{:?}", settings.logging.format),
            metrics_port: settings.logging.metrics_port,
        },
        adapters: if with_adapters {
            builtin_adapters()?
        } else {
            Vec::new()
        },
    })
}

fn print_settings_info(info: &SettingsInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                   timelink Settings                          ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📄 Source: {} ({})", info.source, info.version);

    let engine = &info.engine;
    println!("\n⚙️  Engine");
    println!("   ├─ Retry limit: {}", engine.retry_limit);
    println!("   ├─ Interpolation: {}", engine.interpolation);
    println!("   ├─ Extrapolation: {}", engine.extrapolation);
    match engine.keep_history {
        Some(keep) => println!("   ├─ Keep history: {}", keep),
        None => println!("   ├─ Keep history: unbounded"),
    }
    println!("   └─ Event log capacity: {}", engine.event_log_capacity);

    let logging = &info.logging;
    println!("\n📝 Logging");
    println!("   ├─ Level: {}", logging.level);
    println!("   ├─ Format: {}", logging.format);
    match logging.metrics_port {
        Some(port) => println!("   └─ Metrics port: {}", port),
        None => println!("   └─ Metrics: disabled"),
    }

    if !info.adapters.is_empty() {
        println!("\n🔧 Built-in adapters ({})", info.adapters.len());
        for (i, adapter) in info.adapters.iter().enumerate() {
            let prefix = if i == info.adapters.len() - 1 { "└─" } else { "├─" };
            println!("   {} {} ({:?})", prefix, adapter.kind, adapter.example);
        }
    }

    println!();
}
