//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{EngineSettings, ExtrapolationPolicy};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<SettingsSummary>,
}

#[derive(Serialize)]
struct SettingsSummary {
    version: String,
    retry_limit: usize,
    interpolation: String,
    extrapolation: String,
    event_log_capacity: usize,
    log_level: String,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating settings");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Settings validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(settings) => {
            let warnings = collect_warnings(&settings);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(SettingsSummary {
                    version: format!("{:?}", settings.version),
                    retry_limit: settings.engine.retry_limit,
                    interpolation: format!("{:?}", settings.engine.cache.interpolation),
                    extrapolation: format!("{:?}", settings.engine.cache.extrapolation),
                    event_log_capacity: settings.engine.event_log_capacity,
                    log_level: settings.logging.level.clone(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect settings warnings (non-fatal issues)
fn collect_warnings(settings: &EngineSettings) -> Vec<String> {
    let mut warnings = Vec::new();
    let engine = &settings.engine;

    if engine.cache.keep_history.is_none() {
        warnings.push(
            "engine.cache.keep_history is unset - producer caches are never trimmed".to_string(),
        );
    }

    if engine.retry_limit > 100_000 {
        warnings.push(format!(
            "engine.retry_limit = {} - a stalled producer may block a pull for a long time",
            engine.retry_limit
        ));
    }

    if let ExtrapolationPolicy::Linear { relaxation } = engine.cache.extrapolation {
        if relaxation >= 1.0 {
            warnings.push(
                "linear extrapolation with relaxation 1 behaves like hold_nearest".to_string(),
            );
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Settings are valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Retry limit: {}", summary.retry_limit);
            println!("  Interpolation: {}", summary.interpolation);
            println!("  Extrapolation: {}", summary.extrapolation);
            println!("  Event log capacity: {}", summary.event_log_capacity);
            println!("  Log level: {}", summary.log_level);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Settings are invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args_for(content: &str, suffix: &str) -> (tempfile::NamedTempFile, ValidateArgs) {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        };
        (file, args)
    }

    #[test]
    fn test_valid_file_with_warning() {
        let (_file, args) = args_for("[engine]\nretry_limit = 10\n", ".toml");
        let result = validate_config(&args);
        assert!(result.valid);
        assert_eq!(result.summary.as_ref().unwrap().retry_limit, 10);
        assert!(result.warnings.unwrap()[0].contains("keep_history"));
    }

    #[test]
    fn test_invalid_file() {
        let (_file, args) = args_for(r#"{"engine": {"retry_limit": 0}}"#, ".json");
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("retry_limit"));
        assert!(run_validate(&args).is_err());
    }

    #[test]
    fn test_missing_file() {
        let args = ValidateArgs {
            config: "/nonexistent/timelink.toml".into(),
            json: false,
        };
        assert!(!validate_config(&args).valid);
    }
}
