//! Millisecond clock that never runs backwards.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Source of wall-clock milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// Wall-clock time captured once at construction, advanced by a monotonic timer.
///
/// Adjustments to the system clock after construction (NTP steps, manual
/// changes) do not affect the values returned.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    base_millis: u64,
    started: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        // Capture both back-to-back so the base and the timer agree.
        let base_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self::with_base(base_millis)
    }

    /// Start counting from an explicit epoch-millisecond base.
    pub fn with_base(base_millis: u64) -> Self {
        Self {
            base_millis,
            started: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_millis(&self) -> u64 {
        self.base_millis + self.started.elapsed().as_millis() as u64
    }
}
