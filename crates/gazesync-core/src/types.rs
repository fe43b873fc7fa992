//! Shared runtime types

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Transport connection state, driven by Session Transport callbacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

/// Injected time source. The engine never reads the wall clock directly,
/// which keeps liveness and recency deterministic under test.
pub trait Clock: Send + Sync {
    /// Current time in epoch milliseconds.
    fn now_ms(&self) -> i64;
}

/// Wall-clock implementation used by live sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Shared clock handle.
pub type SharedClock = Arc<dyn Clock>;

/// Convenience constructor for the default wall clock.
pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}
