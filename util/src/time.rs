//! General time utility functions
//!
//! Control code never reads the system clock directly. It is handed a [`Clock`] so that timing
//! behaviour (cycle pacing, procedure timeouts) can be driven by a [`ManualClock`] in tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use chrono;

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    if let Some(ns) = duration.num_nanoseconds() {
        Some(ns as f64 / NANOS_PER_SECOND as f64)
    }
    else {
        None
    }
}

// ---------------------------------------------------------------------------
// CLOCKS
// ---------------------------------------------------------------------------

/// A monotonic clock.
pub trait Clock {
    /// Time elapsed since the clock's epoch. Never decreases.
    fn now(&self) -> Duration;

    /// Suspend the caller for the given duration.
    fn sleep(&self, dur: Duration);

    /// Clock time in seconds.
    fn now_s(&self) -> f64 {
        self.now().as_secs_f64()
    }
}

/// Clock backed by `std::time::Instant`, with the epoch at construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    epoch: Instant
}

/// A clock which only moves when told to. Sleeping advances the clock immediately.
///
/// Clones share the same time, so a test can keep a handle while the code under test owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ns: Arc<AtomicU64>
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now()
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        Instant::now() - self.epoch
    }

    fn sleep(&self, dur: Duration) {
        std::thread::sleep(dur)
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward.
    pub fn advance(&self, dur: Duration) {
        self.now_ns.fetch_add(dur.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Move the clock forward by a number of seconds.
    pub fn advance_s(&self, secs: f64) {
        self.advance(Duration::from_secs_f64(secs))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.now_ns.load(Ordering::SeqCst))
    }

    fn sleep(&self, dur: Duration) {
        self.advance(dur)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new();
        let handle = clock.clone();

        assert_eq!(clock.now(), Duration::from_secs(0));

        handle.advance_s(1.5);
        assert_eq!(clock.now_s(), 1.5);

        clock.sleep(Duration::from_millis(500));
        assert_eq!(handle.now(), Duration::from_secs(2));
    }

    #[test]
    fn test_duration_to_seconds() {
        assert_eq!(
            duration_to_seconds(chrono::Duration::milliseconds(1500)),
            Some(1.5)
        );
    }
}
