//! Engine and timeline configuration contracts shared across crates.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Default polling interval (milliseconds)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default frame interval for frame-aligned flushes (milliseconds, ~60 Hz)
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 16;

/// How the batched flush pass is scheduled after each poll
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushMode {
    /// Prefer frame-aligned scheduling, fall back to zero-delay deferral
    #[default]
    Frame,
    /// Always use zero-delay deferral
    Immediate,
}

/// Dispatch engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EngineConfig {
    /// Polling interval in milliseconds
    #[validate(range(min = 1, max = 60000))]
    pub poll_interval_ms: u64,

    /// Flush scheduling strategy
    pub flush_mode: FlushMode,

    /// Frame length used by frame-aligned schedulers (milliseconds)
    #[validate(range(min = 1, max = 1000))]
    pub frame_interval_ms: u64,
}

impl EngineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            flush_mode: FlushMode::default(),
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
        }
    }
}

/// Performance timeline buffer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TimelineConfig {
    /// Capacity of the resource timing buffer
    #[validate(range(min = 1))]
    pub resource_buffer_size: usize,

    /// Capacity of the mark / measure buffer
    #[validate(range(min = 1))]
    pub user_timing_buffer_size: usize,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            resource_buffer_size: 250,
            user_timing_buffer_size: 10_000,
        }
    }
}

/// Top-level settings file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ObserverSettings {
    #[validate(nested)]
    pub engine: EngineConfig,

    #[validate(nested)]
    pub timeline: TimelineConfig,
}
