//! # Helm Equipment Interface

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Demands sent to the helm actuators each cycle.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct HelmDems {
    /// Rudder angle demand. Positive angles are to the left.
    ///
    /// Units: degrees
    pub rudder_angle_deg: f64,

    /// Normalised sheet setting, 0 is fully sheeted in and 1 is fully let out.
    pub sheet_setting: f64,
}

/// The sensor data the helm consumes each cycle.
///
/// A snapshot is immutable for the duration of a cycle.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlSnapshot {
    /// Heading of the boat.
    ///
    /// Units: degrees
    pub heading_deg: f64,

    /// Heading the planner wants the boat to hold.
    ///
    /// Units: degrees
    pub goal_heading_deg: f64,

    /// Apparent wind angle relative to the bow, as used by the sail table.
    ///
    /// Units: degrees
    pub apparent_wind_angle_deg: f64,

    /// Apparent wind direction, as tracked during the angle-to-wind phase of a tack.
    ///
    /// Units: degrees
    pub apparent_wind_direction_deg: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ControlSnapshot {
    /// Returns true if every value in the snapshot is finite.
    pub fn is_finite(&self) -> bool {
        self.heading_deg.is_finite()
            && self.goal_heading_deg.is_finite()
            && self.apparent_wind_angle_deg.is_finite()
            && self.apparent_wind_direction_deg.is_finite()
    }
}
