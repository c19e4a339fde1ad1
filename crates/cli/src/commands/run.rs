//! `run` command implementation.

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use std::time::Duration;
use timeline::MockWorkloadConfig;
use tracing::{info, warn};

use super::load_settings;
use crate::cli::RunArgs;
use crate::session::{Session, SessionConfig};

/// Execute the `run` command
pub async fn run_session(args: &RunArgs) -> Result<()> {
    let mut settings = load_settings(args.config.as_deref())?;

    // Apply CLI overrides
    if let Some(poll_interval_ms) = args.poll_interval_ms {
        info!(poll_interval_ms, "Overriding poll interval from CLI");
        settings.engine.poll_interval_ms = poll_interval_ms;
    }
    if let Some(flush_mode) = args.flush_mode {
        info!(?flush_mode, "Overriding flush mode from CLI");
        settings.engine.flush_mode = flush_mode.into();
    }
    ConfigLoader::validate(&settings).context("Invalid settings after CLI overrides")?;

    info!(
        poll_interval_ms = settings.engine.poll_interval_ms,
        flush_mode = ?settings.engine.flush_mode,
        observers = args.observe.len(),
        "Configuration loaded"
    );

    let session = Session::new(SessionConfig {
        settings,
        observers: args.observe.iter().map(|list| split_types(list)).collect(),
        duration: (args.duration > 0).then(|| Duration::from_secs(args.duration)),
        workload: MockWorkloadConfig {
            rate_hz: args.rate,
            resource_ratio: args.resource_ratio,
            navigation: true,
            seed: args.seed,
        },
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    });

    let stats = session
        .run(shutdown_signal())
        .await
        .context("Session failed")?;
    stats.print_summary();

    info!("perf-observer finished");
    Ok(())
}

/// Split a comma-separated entry type list, dropping blanks
fn split_types(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolve on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed never resolves.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
