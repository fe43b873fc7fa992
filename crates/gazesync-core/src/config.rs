//! Monitor tunables — timing constants for liveness and reconnection
//!
//! The inactivity threshold and backoff schedule vary between deployments,
//! so they are configuration with defaults, not hard-coded constants.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Per-session monitoring configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Subject is inactive once no event has arrived for this long.
    pub inactivity_threshold_ms: u64,
    /// Period of the liveness re-evaluation tick.
    pub liveness_tick_ms: u64,
    /// Dwell credited per gaze sample: the nominal sampling interval.
    pub sample_interval_secs: f64,
    pub reconnect: ReconnectPolicy,
}

fn default_inactivity_threshold_ms() -> u64 {
    3000
}

fn default_liveness_tick_ms() -> u64 {
    1000
}

fn default_sample_interval_secs() -> f64 {
    0.1
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            inactivity_threshold_ms: default_inactivity_threshold_ms(),
            liveness_tick_ms: default_liveness_tick_ms(),
            sample_interval_secs: default_sample_interval_secs(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl MonitorConfig {
    /// Load from a JSON file, falling back to defaults when the file is
    /// missing or unparseable.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn inactivity_threshold(&self) -> Duration {
        Duration::from_millis(self.inactivity_threshold_ms)
    }

    pub fn liveness_tick(&self) -> Duration {
        Duration::from_millis(self.liveness_tick_ms)
    }
}

/// Bounded linear backoff: attempt `n` (1-indexed) waits `base * n`, and
/// automatic retries stop past the cap until a caller reconnects explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub base_delay_ms: u64,
    pub max_attempts: u32,
}

fn default_base_delay_ms() -> u64 {
    2000
}

fn default_max_attempts() -> u32 {
    5
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-indexed), or `None` once
    /// the retry budget is exhausted.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        Some(Duration::from_millis(self.base_delay_ms * attempt as u64))
    }
}
