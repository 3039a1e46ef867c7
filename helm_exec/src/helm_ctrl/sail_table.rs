//! # Sail table
//!
//! Maps the apparent wind angle onto a normalised sheet setting. The table holds a set of
//! `(angle, setting)` points around the compass and values between points are linearly
//! interpolated, wrapping through 360 degrees.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Internal
use util::maths::{lin_map, saturate, wrap_360};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Sheet setting for fully sheeted in.
pub const SHEET_IN: f64 = 0.0;

/// Sheet setting for fully let out.
pub const SHEET_OUT: f64 = 1.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The sail table, immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct SailTable {
    /// Points sorted by angle, every angle in `[0, 360)`.
    points: Vec<(f64, f64)>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The sheet command a procedure or normal sailing asks for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SheetCmd {
    /// Use the sail table with an offset added to its value.
    Wind {
        offset: f64
    },

    /// Sheet fully in.
    In,

    /// Let the sheet fully out.
    Out
}

#[derive(Debug, Error, PartialEq)]
pub enum SailTableError {
    #[error("The sail table must contain at least one point")]
    Empty,

    #[error("The sail table point at {0} deg is not finite")]
    NonFinite(f64),

    #[error("The sail table setting at {0} deg is {1}, expected a value in [0, 1]")]
    SettingOutOfRange(f64, f64),

    #[error("The sail table contains more than one point at {0} deg")]
    DuplicateAngle(f64)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for SailTable {
    /// A table giving half sheet at every angle.
    fn default() -> Self {
        Self {
            points: (0..8).map(|i| (i as f64 * 45.0, 0.5)).collect()
        }
    }
}

impl SailTable {
    /// Build a new table from `[angle_deg, setting]` points.
    ///
    /// Angles are wrapped into `[0, 360)`, the points do not need to be sorted.
    pub fn new(points: &[[f64; 2]]) -> Result<Self, SailTableError> {
        if points.is_empty() {
            return Err(SailTableError::Empty)
        }

        let mut sorted = Vec::with_capacity(points.len());

        for p in points {
            if !p[0].is_finite() || !p[1].is_finite() {
                return Err(SailTableError::NonFinite(p[0]))
            }
            if p[1] < SHEET_IN || p[1] > SHEET_OUT {
                return Err(SailTableError::SettingOutOfRange(p[0], p[1]))
            }

            sorted.push((wrap_360(p[0]), p[1]));
        }

        sorted.sort_by_key(|p| OrderedFloat(p.0));

        for pair in sorted.windows(2) {
            if pair[0].0 == pair[1].0 {
                return Err(SailTableError::DuplicateAngle(pair[0].0))
            }
        }

        Ok(Self {
            points: sorted
        })
    }

    /// Get the sheet setting for the given apparent wind angle, with `offset` added to the table
    /// value. The result is always in `[0, 1]`.
    ///
    /// A non-finite wind angle is looked up as though the wind were on the bow.
    pub fn sheet_setting(&self, wind_angle_deg: f64, offset: f64) -> f64 {
        let angle = if wind_angle_deg.is_finite() {
            wrap_360(wind_angle_deg)
        }
        else {
            0f64
        };

        saturate(self.interpolate(angle) + offset, SHEET_IN, SHEET_OUT)
    }

    /// Resolve a sheet command into a setting for the given apparent wind angle.
    pub fn resolve(&self, cmd: SheetCmd, wind_angle_deg: f64) -> f64 {
        match cmd {
            SheetCmd::Wind { offset } => self.sheet_setting(wind_angle_deg, offset),
            SheetCmd::In => SHEET_IN,
            SheetCmd::Out => SHEET_OUT
        }
    }

    /// Interpolate the table at an angle already wrapped into `[0, 360)`.
    fn interpolate(&self, angle: f64) -> f64 {
        let n = self.points.len();

        // Index of the first point strictly beyond the angle
        let upper = self.points.iter().position(|p| p.0 > angle);

        let (lo, hi) = match upper {
            // Between two points in the table
            Some(i) if i > 0 => (self.points[i - 1], self.points[i]),
            // Below the first point, wrap back to the last one
            Some(_) => {
                let last = self.points[n - 1];
                return self.between((last.0 - 360.0, last.1), self.points[0], angle)
            },
            // At or beyond the last point, wrap forward to the first one
            None => {
                let first = self.points[0];
                (self.points[n - 1], (first.0 + 360.0, first.1))
            }
        };

        self.between(lo, hi, angle)
    }

    fn between(&self, lo: (f64, f64), hi: (f64, f64), angle: f64) -> f64 {
        // A single point table wraps onto itself
        if hi.0 <= lo.0 {
            return lo.1
        }

        lin_map((lo.0, hi.0), (lo.1, hi.1), angle)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn table() -> SailTable {
        SailTable::new(&[
            [0.0, 0.0],
            [90.0, 0.5],
            [180.0, 1.0],
            [270.0, 0.5],
        ]).unwrap()
    }

    #[test]
    fn test_lookup_on_points() {
        let t = table();

        assert_eq!(t.sheet_setting(0.0, 0.0), 0.0);
        assert_eq!(t.sheet_setting(90.0, 0.0), 0.5);
        assert_eq!(t.sheet_setting(180.0, 0.0), 1.0);
        assert_eq!(t.sheet_setting(270.0, 0.0), 0.5);
    }

    #[test]
    fn test_interpolation() {
        let t = table();

        assert_eq!(t.sheet_setting(45.0, 0.0), 0.25);
        assert_eq!(t.sheet_setting(135.0, 0.0), 0.75);

        // Wraps between 270 and 360
        assert_eq!(t.sheet_setting(315.0, 0.0), 0.25);
        assert_eq!(t.sheet_setting(-45.0, 0.0), 0.25);
        assert_eq!(t.sheet_setting(405.0, 0.0), 0.25);
    }

    #[test]
    fn test_wrap_below_first_point() {
        let t = SailTable::new(&[[45.0, 0.2], [315.0, 0.6]]).unwrap();

        // Halfway between 315 and 405
        assert!((t.sheet_setting(0.0, 0.0) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_offset_and_clamp() {
        let t = table();

        assert_eq!(t.sheet_setting(90.0, 0.2), 0.7);
        assert_eq!(t.sheet_setting(180.0, 0.2), 1.0);
        assert_eq!(t.sheet_setting(0.0, -0.3), 0.0);
    }

    #[test]
    fn test_always_clamped() {
        let t = table();
        let offsets = [-10.0, -1.0, -0.2, 0.0, 0.2, 1.0, 10.0];

        for a in (-720..720).step_by(7) {
            for &o in offsets.iter() {
                let s = t.sheet_setting(a as f64, o);
                assert!(s >= 0.0 && s <= 1.0);
            }
        }

        let s = t.sheet_setting(f64::NAN, 0.0);
        assert!(s >= 0.0 && s <= 1.0);
    }

    #[test]
    fn test_constant_table() {
        let points: Vec<[f64; 2]> = (0..8).map(|i| [i as f64 * 45.0, 0.5]).collect();
        let t = SailTable::new(&points).unwrap();

        assert_eq!(t.sheet_setting(10.0, 0.0), 0.5);
        assert_eq!(t.sheet_setting(350.0, 0.2), 0.7);
    }

    #[test]
    fn test_single_point() {
        let t = SailTable::new(&[[90.0, 0.3]]).unwrap();

        assert_eq!(t.sheet_setting(0.0, 0.0), 0.3);
        assert_eq!(t.sheet_setting(200.0, 0.0), 0.3);
    }

    #[test]
    fn test_resolve() {
        let t = table();

        assert_eq!(t.resolve(SheetCmd::In, 180.0), 0.0);
        assert_eq!(t.resolve(SheetCmd::Out, 0.0), 1.0);
        assert_eq!(t.resolve(SheetCmd::Wind { offset: 0.0 }, 90.0), 0.5);
    }

    #[test]
    fn test_invalid_tables() {
        assert_eq!(SailTable::new(&[]).unwrap_err(), SailTableError::Empty);
        assert_eq!(
            SailTable::new(&[[0.0, 1.5]]).unwrap_err(),
            SailTableError::SettingOutOfRange(0.0, 1.5)
        );
        assert_eq!(
            SailTable::new(&[[0.0, 0.5], [360.0, 0.5]]).unwrap_err(),
            SailTableError::DuplicateAngle(0.0)
        );
    }
}
