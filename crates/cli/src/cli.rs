//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::FlushMode;
use std::path::PathBuf;

/// perf-observer - polling PerformanceObserver driver
#[derive(Parser, Debug)]
#[command(
    name = "perf-observer",
    author,
    version,
    about = "Polling performance observer driver",
    long_about = "Runs a simulated instrumentation workload against a performance timeline \n\
                  and delivers new entries to observers through the polling dispatch engine."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "PERF_OBSERVER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "PERF_OBSERVER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a simulated workload through the dispatch engine
    Run(RunArgs),

    /// Validate a settings file without running
    Validate(ValidateArgs),

    /// Display supported entry types and effective settings
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Settings file (TOML or JSON); defaults apply when omitted
    #[arg(short, long, env = "PERF_OBSERVER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Comma-separated entry types for one observer (repeatable)
    #[arg(
        short,
        long = "observe",
        value_name = "TYPES",
        default_value = "mark,measure,navigation,resource"
    )]
    pub observe: Vec<String>,

    /// Run time in seconds (0 = until Ctrl+C)
    #[arg(short, long, default_value = "10", env = "PERF_OBSERVER_DURATION")]
    pub duration: u64,

    /// Workload recording rate (operations per second)
    #[arg(long, default_value = "50")]
    pub rate: f64,

    /// Share of workload operations that record a resource timing
    #[arg(long, default_value = "0.4")]
    pub resource_ratio: f64,

    /// Fixed workload RNG seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Override engine.poll_interval_ms
    #[arg(long, env = "PERF_OBSERVER_POLL_INTERVAL_MS")]
    pub poll_interval_ms: Option<u64>,

    /// Override engine.flush_mode
    #[arg(long, value_enum)]
    pub flush_mode: Option<FlushModeArg>,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "PERF_OBSERVER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Settings file to validate
    #[arg(short, long, default_value = "observer.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Settings file; defaults apply when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
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

/// Flush scheduling strategy
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum FlushModeArg {
    /// Frame-aligned, falling back to zero-delay
    Frame,
    /// Zero-delay deferral
    Immediate,
}

impl From<FlushModeArg> for FlushMode {
    fn from(mode: FlushModeArg) -> Self {
        match mode {
            FlushModeArg::Frame => FlushMode::Frame,
            FlushModeArg::Immediate => FlushMode::Immediate,
        }
    }
}
