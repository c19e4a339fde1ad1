//! `validate` command implementation.

use anyhow::{Context, Result};
use config_loader::{ConfigLoader, ObserverSettings};
use contracts::{FlushMode, DEFAULT_FRAME_INTERVAL_MS};
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
    settings: Option<ObserverSettings>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

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
        anyhow::bail!("Configuration validation failed")
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
            settings: None,
        };
    }

    match ConfigLoader::load_from_path(&args.config) {
        Ok(settings) => {
            let warnings = collect_warnings(&settings);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                settings: Some(settings),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            settings: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(settings: &ObserverSettings) -> Vec<String> {
    let mut warnings = Vec::new();
    let engine = &settings.engine;

    if engine.poll_interval_ms < 10 {
        warnings.push(format!(
            "engine.poll_interval_ms = {} polls the source very often",
            engine.poll_interval_ms
        ));
    }
    if engine.poll_interval_ms > 5_000 {
        warnings.push(format!(
            "engine.poll_interval_ms = {} delays delivery by up to {:.1}s",
            engine.poll_interval_ms,
            engine.poll_interval_ms as f64 / 1000.0
        ));
    }
    if engine.flush_mode == FlushMode::Immediate
        && engine.frame_interval_ms != DEFAULT_FRAME_INTERVAL_MS
    {
        warnings
            .push("engine.frame_interval_ms is ignored when flush_mode is immediate".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref settings) = result.settings {
            println!("\n  Poll interval: {} ms", settings.engine.poll_interval_ms);
            println!("  Flush mode: {:?}", settings.engine.flush_mode);
            println!("  Frame interval: {} ms", settings.engine.frame_interval_ms);
            println!("  Resource buffer: {}", settings.timeline.resource_buffer_size);
            println!("  User timing buffer: {}", settings.timeline.user_timing_buffer_size);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
