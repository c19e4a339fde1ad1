//! `info` command implementation.

use anyhow::{Context, Result};
use config_loader::ObserverSettings;
use contracts::EntryType;
use observer::PerformanceObserver;
use serde::Serialize;
use tracing::info;

use super::load_settings;
use crate::cli::InfoArgs;

/// Info for JSON output
#[derive(Serialize)]
struct ObserverInfo {
    version: &'static str,
    supported_entry_types: Vec<EntryType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    config_path: Option<String>,
    settings: ObserverSettings,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    if let Some(ref path) = args.config {
        info!(config = %path.display(), "Loading configuration info");
    }

    let settings = load_settings(args.config.as_deref())?;
    let report = ObserverInfo {
        version: env!("CARGO_PKG_VERSION"),
        supported_entry_types: PerformanceObserver::supported_entry_types().to_vec(),
        config_path: args.config.as_ref().map(|p| p.display().to_string()),
        settings,
    };

    if args.json {
        let json =
            serde_json::to_string_pretty(&report).context("Failed to serialize observer info")?;
        println!("{}", json);
    } else {
        print_info(&report);
    }

    Ok(())
}

fn print_info(report: &ObserverInfo) {
    println!("\n=== perf-observer {} ===\n", report.version);

    println!("Supported entry types:");
    for entry_type in &report.supported_entry_types {
        println!("  - {}", entry_type);
    }

    match report.config_path {
        Some(ref path) => println!("\nSettings ({}):", path),
        None => println!("\nSettings (defaults):"),
    }
    let engine = &report.settings.engine;
    println!("  Engine:");
    println!("    poll_interval_ms: {}", engine.poll_interval_ms);
    println!("    flush_mode: {:?}", engine.flush_mode);
    println!("    frame_interval_ms: {}", engine.frame_interval_ms);
    let timeline = &report.settings.timeline;
    println!("  Timeline:");
    println!("    resource_buffer_size: {}", timeline.resource_buffer_size);
    println!("    user_timing_buffer_size: {}", timeline.user_timing_buffer_size);

    println!();
}
