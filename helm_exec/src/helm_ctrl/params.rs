//! Helm control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// Internal
use super::{HelmCtrlError, ProcedureEntry, ProcedureKind, ProcedureTuning, SchedulerConfig};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for helm control
#[derive(Deserialize, Debug, Clone)]
pub struct Params {
    /// Start with remote control enabled, in which case procedure outcomes are not recorded.
    #[serde(default)]
    pub remote_control: bool,

    /// The sail table, a list of `[apparent wind angle (deg), sheet setting]` points.
    pub sail_table: Vec<[f64; 2]>,

    /// Rudder control parameters
    pub rudder: RudderParams,

    /// Procedure scheduler parameters
    pub scheduler: SchedulerConfig,

    /// Procedure tuning
    #[serde(default)]
    pub tuning: ProcedureTuning,

    /// The available procedures, in order of their initial rank.
    pub procedures: Vec<ProcedureEntry>
}

/// Rudder control parameters, shared by the heading and wind angle controllers.
#[derive(Deserialize, Debug, Clone, Copy)]
pub struct RudderParams {
    /// Proportional gain
    pub k_p: f64,

    /// Integral gain
    pub k_i: f64,

    /// Derivative gain
    pub k_d: f64,

    /// Maximum rudder angle either side of centre
    ///
    /// Units: degrees
    pub max_angle_deg: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Check the parameters which are not validated when building the sail table and scheduler.
    pub fn validate(&self) -> Result<(), HelmCtrlError> {
        let r = &self.rudder;

        if !(r.max_angle_deg.is_finite() && r.max_angle_deg > 0.0) {
            return Err(HelmCtrlError::InvalidParam(format!(
                "rudder.max_angle_deg must be positive, found {}", r.max_angle_deg
            )))
        }

        if !(r.k_p.is_finite() && r.k_i.is_finite() && r.k_d.is_finite()) {
            return Err(HelmCtrlError::InvalidParam(String::from(
                "rudder gains must be finite"
            )))
        }

        let t = &self.tuning;

        if !(t.beating_phase_s.is_finite() && t.beating_phase_s >= 0.0) {
            return Err(HelmCtrlError::InvalidParam(format!(
                "tuning.beating_phase_s must not be negative, found {}", t.beating_phase_s
            )))
        }

        if !(t.beating_angle_deg.is_finite() && t.sheet_out_offset.is_finite()) {
            return Err(HelmCtrlError::InvalidParam(String::from(
                "tuning values must be finite"
            )))
        }

        Ok(())
    }
}

impl Default for Params {
    fn default() -> Self {
        Self {
            remote_control: false,
            sail_table: (0..8).map(|i| [i as f64 * 45.0, 0.5]).collect(),
            rudder: RudderParams {
                k_p: 0.5,
                k_i: 0.0,
                k_d: 0.0,
                max_angle_deg: 30.0
            },
            scheduler: SchedulerConfig::default(),
            tuning: ProcedureTuning::default(),
            procedures: ProcedureKind::ALL
                .iter()
                .map(|&kind| ProcedureEntry { kind, timeout_s: None })
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
