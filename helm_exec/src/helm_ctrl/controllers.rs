//! # Helm controllers module
//!
//! This module provides the PID controller used to steer the boat, both when holding the goal
//! heading and when tracking a target apparent wind direction during a maneuver.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use util::maths::saturate;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A PID controller
#[derive(Debug, Serialize, Clone)]
pub struct PidController {
    /// Proportional gain
    k_p: f64,

    /// Integral gain
    k_i: f64,

    /// Dervative gain
    k_d: f64,

    /// Magnitude of the output limit, the output is saturated to `[-limit, +limit]`.
    output_limit: f64,

    /// Previous error
    prev_error: Option<f64>,

    /// The integral accumulation.
    ///
    /// The accumulation is never decayed or reset, and it is not bounded by the output limit.
    integral: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidController {

    /// Create a new controller with the given gains and output limit.
    pub fn new(k_p: f64, k_i: f64, k_d: f64, output_limit: f64) -> Self {
        Self {
            k_p, k_i, k_d,
            output_limit: output_limit.abs(),
            integral: 0f64,
            prev_error: None
        }
    }

    /// Get the saturated value of the controller for the given error, which was measured `dt`
    /// seconds after the previous one.
    pub fn update(&mut self, error: f64, dt: f64) -> f64 {
        let dt_valid = dt.is_finite() && dt > 0f64;

        // Accumulate the integral term.
        //
        // If there's no time difference then we don't accumulate the integral, adding on the raw
        // error would produce a large spike in integral compared to normal operation.
        if dt_valid {
            self.integral += error * dt;
        }

        // Calculate the derivative.
        //
        // The first sample has nothing to difference against, so it produces no derivative
        // rather than a kick of `error / dt`.
        let deriv = match (self.prev_error, dt_valid) {
            (Some(e), true) => (error - e) / dt,
            _ => 0f64
        };

        // Calculate the output
        let out =
            self.k_p * error
            + self.k_i * self.integral
            + self.k_d * deriv;

        // Remember the previous error
        self.prev_error = Some(error);

        saturate(out, -self.output_limit, self.output_limit)
    }

    /// Get the current integral accumulation.
    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// Get the magnitude of the output limit.
    pub fn output_limit(&self) -> f64 {
        self.output_limit
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_proportional() {
        let mut pid = PidController::new(0.5, 0.0, 0.0, 30.0);

        assert_eq!(pid.update(10.0, 0.1), 5.0);
        assert_eq!(pid.update(-20.0, 0.1), -10.0);
    }

    #[test]
    fn test_output_saturated() {
        let mut pid = PidController::new(0.5, 0.0, 0.0, 30.0);

        assert_eq!(pid.update(100.0, 0.1), 30.0);
        assert_eq!(pid.update(-100.0, 0.1), -30.0);
    }

    #[test]
    fn test_integral_persists_beyond_limit() {
        let mut pid = PidController::new(0.0, 1.0, 0.0, 1.0);

        // Sustained error grows the integral far past the output limit, but the output stays
        // within the limit the whole time.
        for _ in 0..1000 {
            let out = pid.update(50.0, 0.1);
            assert!(out <= 1.0 && out >= -1.0);
        }

        assert!((pid.integral() - 5000.0).abs() < 1e-6);

        // It takes just as long to unwind
        assert_eq!(pid.update(-50.0, 0.1), 1.0);
    }

    #[test]
    fn test_derivative() {
        let mut pid = PidController::new(0.0, 0.0, 1.0, 100.0);

        // First sample has no derivative
        assert_eq!(pid.update(5.0, 0.5), 0.0);

        // (6 - 5) / 0.5
        assert_eq!(pid.update(6.0, 0.5), 2.0);
    }

    #[test]
    fn test_zero_dt() {
        let mut pid = PidController::new(1.0, 1.0, 1.0, 100.0);

        pid.update(5.0, 0.1);
        let before = pid.integral();

        // No integral accumulation or derivative when no time has passed
        assert_eq!(pid.update(7.0, 0.0), 7.0 + before);
        assert_eq!(pid.integral(), before);
    }

    #[test]
    fn test_output_always_within_limit() {
        let limits = [0.0, 0.5, 1.0, 30.0, 1e6];
        let errors = [-1e9, -180.0, -1.0, 0.0, 0.3, 90.0, 1e12, f64::NAN];

        for &limit in limits.iter() {
            let mut pid = PidController::new(2.0, 3.0, 0.5, limit);

            for &e in errors.iter().cycle().take(200) {
                let out = pid.update(e, 0.1);
                assert!(out >= -limit && out <= limit, "{} outside +/-{}", out, limit);
            }
        }
    }
}
