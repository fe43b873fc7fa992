//! Liveness Monitor — subject activity from event recency
//!
//! A fixed-period tick compares `now - last_event_at` against the
//! inactivity threshold. Pure evaluation here; the timer itself lives with
//! the observer session so teardown can cancel it.

use crate::accumulator::Accumulator;
use gazesync_core::{MonitorConfig, SharedClock};
use tracing::debug;

pub struct LivenessMonitor {
    inactivity_threshold_ms: i64,
    clock: SharedClock,
}

impl LivenessMonitor {
    pub fn new(config: &MonitorConfig, clock: SharedClock) -> Self {
        Self {
            inactivity_threshold_ms: config.inactivity_threshold_ms as i64,
            clock,
        }
    }

    /// One tick: reclassify the subject. Returns the new `subject_active`.
    /// Independent of connection status, which transport callbacks drive.
    pub fn evaluate(&self, accumulator: &mut Accumulator) -> bool {
        let elapsed = self.clock.now_ms() - accumulator.last_event_at();
        let active = elapsed < self.inactivity_threshold_ms;
        if active != accumulator.subject_active() {
            debug!(elapsed_ms = elapsed, active, "subject activity changed");
        }
        accumulator.set_subject_active(active);
        active
    }
}
