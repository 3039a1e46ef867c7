//! # Maneuver procedures
//!
//! A procedure is one way of executing a tack or jibe. Every procedure kind produces a rudder and
//! a sheet command each cycle, and gives up once it has run for longer than its timeout. The
//! procedures only decide *which* command to use, resolving commands into actuator demands is
//! done by `HelmCtrl`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::fmt::{self, Display};
use serde::{Deserialize, Serialize};

// Internal
use comms_if::tc::SailingMode;
use super::SheetCmd;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Tuning shared by all procedures.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProcedureTuning {
    /// Apparent wind direction held while building speed during the beating phase, measured for
    /// a switch to port tack and mirrored for starboard.
    ///
    /// Units: degrees
    pub beating_angle_deg: f64,

    /// Length of the beating phase.
    ///
    /// Units: seconds
    pub beating_phase_s: f64,

    /// Offset added to the sail table value by procedures which sheet out.
    pub sheet_out_offset: f64
}

/// A running procedure.
///
/// Only one instance exists at a time, it is owned by the `ProcedureScheduler`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ActiveProcedure {
    /// The kind of procedure being run
    pub kind: ProcedureKind,

    /// The timeout for this attempt.
    ///
    /// Units: seconds
    pub timeout_s: f64,

    /// Time the procedure was started.
    ///
    /// Units: seconds
    pub start_time_s: f64,

    /// The sailing mode that was requested when the procedure was started.
    pub sailing_mode: SailingMode
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The available procedures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcedureKind {
    /// Hard over rudder towards the new tack, sheet from the sail table.
    TackBasic,

    /// As `TackBasic`, but with the sheet let out by the sheet out offset to depower the sails
    /// through the turn.
    TackSheetOut,

    /// Build speed by holding a wider angle to the wind for the beating phase, then hard over as
    /// in `TackBasic`.
    TackIncreaseAngleToWind,

    /// Hard over rudder to the opposite side to a tack, with the sheet let out by the sheet out
    /// offset.
    JibeBasic
}

/// How the rudder shall be driven.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RudderCmd {
    /// Steer to the goal heading with the heading controller.
    PidGoalHeading,

    /// Steer to hold the given apparent wind direction with the wind controller.
    PidAngleToWind {
        target_deg: f64
    },

    /// Rudder fully to the left.
    FullLeft,

    /// Rudder fully to the right.
    FullRight
}

/// The phase a procedure is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcedurePhase {
    /// Holding the beating angle before committing to the turn.
    Beating,

    /// Rudder hard over.
    HardOver
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for ProcedureTuning {
    fn default() -> Self {
        Self {
            beating_angle_deg: 80.0,
            beating_phase_s: 4.0,
            sheet_out_offset: 0.2
        }
    }
}

impl ProcedureKind {
    /// All procedure kinds, in their default order.
    pub const ALL: [ProcedureKind; 4] = [
        ProcedureKind::TackBasic,
        ProcedureKind::TackSheetOut,
        ProcedureKind::TackIncreaseAngleToWind,
        ProcedureKind::JibeBasic
    ];

    /// Returns the identifier used in logs and telemetry.
    pub fn name(&self) -> &'static str {
        match self {
            ProcedureKind::TackBasic => "TackBasic",
            ProcedureKind::TackSheetOut => "TackSheetOut",
            ProcedureKind::TackIncreaseAngleToWind => "TackIncreaseAngleToWind",
            ProcedureKind::JibeBasic => "JibeBasic"
        }
    }
}

impl Display for ProcedureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl ActiveProcedure {
    /// Start a new procedure at the given time.
    pub fn new(
        kind: ProcedureKind,
        timeout_s: f64,
        sailing_mode: SailingMode,
        now_s: f64
    ) -> Self {
        Self {
            kind,
            timeout_s,
            start_time_s: now_s,
            sailing_mode
        }
    }

    /// Time since the procedure was started.
    ///
    /// Units: seconds
    pub fn elapsed_s(&self, now_s: f64) -> f64 {
        now_s - self.start_time_s
    }

    /// Returns true once the procedure has run for longer than its timeout.
    pub fn has_timed_out(&self, now_s: f64) -> bool {
        self.elapsed_s(now_s) > self.timeout_s
    }

    /// Get the phase the procedure is in at the given time.
    pub fn phase(&self, now_s: f64, tuning: &ProcedureTuning) -> ProcedurePhase {
        match self.kind {
            ProcedureKind::TackIncreaseAngleToWind
                if self.elapsed_s(now_s) < tuning.beating_phase_s
                => ProcedurePhase::Beating,
            _ => ProcedurePhase::HardOver
        }
    }

    /// Get the rudder and sheet commands for this cycle.
    pub fn step(&self, now_s: f64, tuning: &ProcedureTuning) -> (RudderCmd, SheetCmd) {
        let wind = SheetCmd::Wind { offset: 0.0 };
        let wind_out = SheetCmd::Wind { offset: tuning.sheet_out_offset };

        match self.kind {
            ProcedureKind::TackBasic => (self.tack_rudder(), wind),
            ProcedureKind::TackSheetOut => (self.tack_rudder(), wind_out),
            ProcedureKind::TackIncreaseAngleToWind => match self.phase(now_s, tuning) {
                ProcedurePhase::Beating => (
                    RudderCmd::PidAngleToWind {
                        target_deg: self.beating_target_deg(tuning)
                    },
                    wind
                ),
                ProcedurePhase::HardOver => (self.tack_rudder(), wind)
            },
            ProcedureKind::JibeBasic => (self.jibe_rudder(), wind_out)
        }
    }

    /// Hard over towards the side of the new tack.
    fn tack_rudder(&self) -> RudderCmd {
        match self.sailing_mode {
            SailingMode::SwitchToPortTack => RudderCmd::FullLeft,
            _ => RudderCmd::FullRight
        }
    }

    /// A jibe turns the stern through the wind, so the rudder goes the other way.
    fn jibe_rudder(&self) -> RudderCmd {
        match self.sailing_mode {
            SailingMode::SwitchToPortTack => RudderCmd::FullRight,
            _ => RudderCmd::FullLeft
        }
    }

    fn beating_target_deg(&self, tuning: &ProcedureTuning) -> f64 {
        match self.sailing_mode {
            SailingMode::SwitchToPortTack => tuning.beating_angle_deg,
            _ => 360.0 - tuning.beating_angle_deg
        }
    }
}

impl Display for ActiveProcedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind, self.sailing_mode)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const PORT: SailingMode = SailingMode::SwitchToPortTack;
    const STBD: SailingMode = SailingMode::SwitchToStarboardTack;

    #[test]
    fn test_timeout() {
        let p = ActiveProcedure::new(ProcedureKind::TackBasic, 30.0, PORT, 100.0);

        assert_eq!(p.elapsed_s(110.0), 10.0);
        assert!(!p.has_timed_out(130.0));
        assert!(p.has_timed_out(130.1));
    }

    #[test]
    fn test_tack_basic() {
        let t = ProcedureTuning::default();

        let p = ActiveProcedure::new(ProcedureKind::TackBasic, 30.0, PORT, 0.0);
        assert_eq!(p.step(1.0, &t), (RudderCmd::FullLeft, SheetCmd::Wind { offset: 0.0 }));

        let p = ActiveProcedure::new(ProcedureKind::TackBasic, 30.0, STBD, 0.0);
        assert_eq!(p.step(1.0, &t), (RudderCmd::FullRight, SheetCmd::Wind { offset: 0.0 }));
    }

    #[test]
    fn test_tack_sheet_out() {
        let t = ProcedureTuning::default();

        let p = ActiveProcedure::new(ProcedureKind::TackSheetOut, 30.0, PORT, 0.0);
        assert_eq!(p.step(1.0, &t), (RudderCmd::FullLeft, SheetCmd::Wind { offset: 0.2 }));
        assert_eq!(p.phase(1.0, &t), ProcedurePhase::HardOver);
    }

    #[test]
    fn test_tack_increase_angle_to_wind() {
        let t = ProcedureTuning::default();

        let p = ActiveProcedure::new(ProcedureKind::TackIncreaseAngleToWind, 30.0, PORT, 10.0);
        assert_eq!(p.phase(13.9, &t), ProcedurePhase::Beating);
        assert_eq!(
            p.step(13.9, &t),
            (RudderCmd::PidAngleToWind { target_deg: 80.0 }, SheetCmd::Wind { offset: 0.0 })
        );
        assert_eq!(p.phase(14.0, &t), ProcedurePhase::HardOver);
        assert_eq!(p.step(14.0, &t), (RudderCmd::FullLeft, SheetCmd::Wind { offset: 0.0 }));

        let p = ActiveProcedure::new(ProcedureKind::TackIncreaseAngleToWind, 30.0, STBD, 0.0);
        assert_eq!(
            p.step(0.0, &t),
            (RudderCmd::PidAngleToWind { target_deg: 280.0 }, SheetCmd::Wind { offset: 0.0 })
        );
        assert_eq!(p.step(5.0, &t), (RudderCmd::FullRight, SheetCmd::Wind { offset: 0.0 }));
    }

    #[test]
    fn test_jibe_basic() {
        let t = ProcedureTuning::default();

        let p = ActiveProcedure::new(ProcedureKind::JibeBasic, 30.0, PORT, 0.0);
        assert_eq!(p.step(1.0, &t), (RudderCmd::FullRight, SheetCmd::Wind { offset: 0.2 }));

        let p = ActiveProcedure::new(ProcedureKind::JibeBasic, 30.0, STBD, 0.0);
        assert_eq!(p.step(1.0, &t), (RudderCmd::FullLeft, SheetCmd::Wind { offset: 0.2 }));
    }

    #[test]
    fn test_names() {
        assert_eq!(format!("{}", ProcedureKind::TackIncreaseAngleToWind), "TackIncreaseAngleToWind");

        let p = ActiveProcedure::new(ProcedureKind::JibeBasic, 30.0, PORT, 0.0);
        assert_eq!(format!("{}", p), "JibeBasic (switch_to_port_tack)");
    }
}
