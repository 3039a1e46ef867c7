//! # Cycle management
//!
//! The `CycleMgr` paces the main loop at a fixed period against an injected `Clock`. The only
//! place the loop waits is at the end of a cycle, and that wait is never longer than one period.
//! A `StopToken` can be cloned into other parts of the executable (or other threads) to request
//! the loop ends, it is checked once per cycle.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{Arc, atomic::{AtomicBool, Ordering}};
use std::time::Duration;
use log::warn;

use util::time::Clock;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Cooperative stop signal for the main loop.
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    stop: Arc<AtomicBool>
}

/// Fixed rate cycle manager.
pub struct CycleMgr<C: Clock> {
    clock: C,

    period: Duration,

    /// Number of cycles that make up one second
    cycles_per_second: u64,

    stop: StopToken,

    /// Start time of the current cycle, relative to the clock's epoch
    cycle_start: Duration,

    /// Start time of the previous cycle
    prev_cycle_start: Option<Duration>,

    /// Number of cycles already started
    num_cycles: u64,

    /// Number of consecutive cycle overruns
    num_consec_overruns: u64,

    /// Total number of cycle overruns
    num_overruns: u64
}

/// Information on the cycle that has just started.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleInfo {
    /// Index of the cycle, starting from zero
    pub index: u64,

    /// Time at the start of the cycle.
    ///
    /// Units: seconds
    pub time_s: f64,

    /// Time since the start of the previous cycle, zero on the first cycle.
    ///
    /// Units: seconds
    pub dt_s: f64,

    /// True if this cycle falls on a 1Hz boundary
    pub is_1_hz_cycle: bool
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CycleMgrError {
    #[error("The cycle period must be positive and finite, found {0} s")]
    InvalidPeriod(f64)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the loop stops at the next cycle boundary.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}

impl<C: Clock> CycleMgr<C> {
    /// Create a new cycle manager running at the given period.
    pub fn new(clock: C, period_s: f64, stop: StopToken) -> Result<Self, CycleMgrError> {
        if !(period_s.is_finite() && period_s > 0.0) {
            return Err(CycleMgrError::InvalidPeriod(period_s))
        }

        let period = Duration::from_secs_f64(period_s);
        let cycles_per_second = ((1.0 / period_s).round() as u64).max(1);

        Ok(Self {
            cycle_start: clock.now(),
            clock,
            period,
            cycles_per_second,
            stop,
            prev_cycle_start: None,
            num_cycles: 0,
            num_consec_overruns: 0,
            num_overruns: 0
        })
    }

    /// Start a new cycle, returning `None` if a stop has been requested.
    pub fn start_cycle(&mut self) -> Option<CycleInfo> {
        if self.stop.is_stopped() {
            return None
        }

        self.cycle_start = self.clock.now();

        let dt_s = match self.prev_cycle_start {
            Some(p) => (self.cycle_start - p).as_secs_f64(),
            None => 0.0
        };

        let info = CycleInfo {
            index: self.num_cycles,
            time_s: self.cycle_start.as_secs_f64(),
            dt_s,
            is_1_hz_cycle: self.num_cycles % self.cycles_per_second == 0
        };

        self.prev_cycle_start = Some(self.cycle_start);
        self.num_cycles += 1;

        Some(info)
    }

    /// End the current cycle, sleeping for whatever remains of the period.
    ///
    /// Returns the time spent sleeping.
    pub fn end_cycle(&mut self) -> Duration {
        let cycle_dur = self.clock.now() - self.cycle_start;

        match self.period.checked_sub(cycle_dur) {
            Some(d) => {
                self.num_consec_overruns = 0;
                self.clock.sleep(d);
                d
            },
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    (cycle_dur - self.period).as_secs_f64()
                );
                self.num_consec_overruns += 1;
                self.num_overruns += 1;
                Duration::from_secs(0)
            }
        }
    }

    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn num_cycles(&self) -> u64 {
        self.num_cycles
    }

    pub fn num_consec_overruns(&self) -> u64 {
        self.num_consec_overruns
    }

    pub fn num_overruns(&self) -> u64 {
        self.num_overruns
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
