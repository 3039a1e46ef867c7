//! # Helm Executable Parameters
//!
//! This module provide parameters for the helm executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Serialize, Deserialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HelmExecParams {

    /// Target period of one cycle.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Number of consecutive cycles without fresh sensor data after which a warning is issued.
    pub max_stale_cycles: u64,

    /// Seed for the procedure scheduler's random number generator. If not given the generator is
    /// seeded from entropy.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Write per-cycle archives into the session directory.
    #[serde(default)]
    pub archive_enabled: bool
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for HelmExecParams {
    fn default() -> Self {
        Self {
            cycle_period_s: 0.1,
            max_stale_cycles: 10,
            seed: None,
            archive_enabled: false
        }
    }
}
