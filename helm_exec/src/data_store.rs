//! # Data Store

use comms_if::{
    eqpt::helm::{ControlSnapshot, HelmDems},
    tc::SailingMode,
};
use log::{info, warn};
use util::module;

use crate::{cycle::CycleInfo, helm_ctrl};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Sensor values provided by the simulator or the boat each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorReading {
    /// Units: degrees
    pub heading_deg: f64,

    /// Units: degrees
    pub apparent_wind_angle_deg: f64,

    /// Units: degrees
    pub apparent_wind_direction_deg: f64,
}

/// Global data store for the executable.
#[derive(Default)]
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u64,

    /// True if this cycle falls on a 1Hz boundary
    pub is_1_hz_cycle: bool,

    /// Cycle clock time at the start of this cycle
    pub time_s: f64,

    /// Time since the previous cycle
    pub dt_s: f64,

    /// Simulation elapsed time, if a simulator is connected
    pub sim_time_s: Option<f64>,

    // Planner commands
    /// Sailing mode requested by the planner, latest value wins
    pub sailing_mode: SailingMode,

    /// Goal heading requested by the planner
    pub goal_heading_deg: f64,

    /// Remote control change requested on this cycle
    pub remote_control_request: Option<bool>,

    /// Set when the planner or simulator asks the executable to stop
    pub stop_requested: bool,

    // Sensor input
    /// The last valid sensor reading, `None` until one has been received
    pub last_reading: Option<SensorReading>,

    /// Number of consecutive cycles without a fresh valid reading
    pub num_consec_stale_cycles: u64,

    /// True once the current stale run has been reported
    stale_warning_issued: bool,

    // HelmCtrl
    pub helm_ctrl: helm_ctrl::HelmCtrl,
    pub helm_ctrl_input: helm_ctrl::InputData,
    pub helm_ctrl_output: HelmDems,
    pub helm_ctrl_status_rpt: helm_ctrl::StatusReport,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    /// Perform actions required at the start of a cycle.
    ///
    /// Clears those items that need clearing at the start of a cycle, and sets the cycle timing.
    /// The previous output and status report are kept so they can be held if processing fails
    /// this cycle.
    pub fn cycle_start(&mut self, info: &CycleInfo) {
        self.num_cycles = info.index;
        self.is_1_hz_cycle = info.is_1_hz_cycle;
        self.time_s = info.time_s;
        self.dt_s = info.dt_s;

        self.remote_control_request = None;
        self.helm_ctrl_input = helm_ctrl::InputData::default();
    }

    /// Update the sensor data for this cycle.
    ///
    /// `reading` is `None` if nothing fresh arrived this cycle. Missing or non-finite readings
    /// fall back to the last valid reading (or zeros before any reading), and the number of
    /// consecutive stale cycles is tracked. A warning is issued once per stale run which lasts
    /// longer than `max_stale_cycles`.
    pub fn update_sensors(&mut self, reading: Option<SensorReading>, max_stale_cycles: u64) {
        let valid = match reading {
            Some(r) if is_finite(&r) => Some(r),
            Some(r) => {
                warn!("Discarding non-finite sensor reading: {:?}", r);
                None
            },
            None => None
        };

        match valid {
            Some(r) => {
                if self.stale_warning_issued {
                    info!(
                        "Sensor data restored after {} stale cycles",
                        self.num_consec_stale_cycles
                    );
                }
                self.last_reading = Some(r);
                self.num_consec_stale_cycles = 0;
                self.stale_warning_issued = false;
            },
            None => {
                self.num_consec_stale_cycles += 1;

                if self.num_consec_stale_cycles > max_stale_cycles && !self.stale_warning_issued {
                    warn!(
                        "No fresh sensor data for {} cycles, using {}",
                        self.num_consec_stale_cycles,
                        match self.last_reading {
                            Some(_) => "the last valid reading",
                            None => "a zeroed reading"
                        }
                    );
                    self.stale_warning_issued = true;
                }
            }
        }
    }

    /// Get the snapshot helm control will use this cycle.
    pub fn snapshot(&self) -> ControlSnapshot {
        let r = self.last_reading.unwrap_or_default();

        ControlSnapshot {
            heading_deg: r.heading_deg,
            goal_heading_deg: self.goal_heading_deg,
            apparent_wind_angle_deg: r.apparent_wind_angle_deg,
            apparent_wind_direction_deg: r.apparent_wind_direction_deg,
        }
    }

    /// Build the input for helm control from the current state of the store.
    pub fn build_helm_ctrl_input(&mut self) {
        self.helm_ctrl_input = helm_ctrl::InputData {
            time_s: self.time_s,
            dt_s: self.dt_s,
            sailing_mode: self.sailing_mode,
            snapshot: self.snapshot(),
            remote_control: self.remote_control_request,
        };
    }

    /// Build the helm control input and process one cycle of helm control.
    ///
    /// If processing fails the previous demands and status report are held, with the report's
    /// events cleared since none happened this cycle, and the error is returned.
    pub fn proc_helm_ctrl(&mut self) -> Result<(), helm_ctrl::HelmCtrlError> {
        self.build_helm_ctrl_input();

        let result = module::proc_or_hold(
            &mut self.helm_ctrl,
            &self.helm_ctrl_input,
            &mut self.helm_ctrl_output,
            &mut self.helm_ctrl_status_rpt
        );

        if result.is_err() {
            self.helm_ctrl_status_rpt.events.clear();
        }

        result
    }
}

fn is_finite(r: &SensorReading) -> bool {
    r.heading_deg.is_finite()
        && r.apparent_wind_angle_deg.is_finite()
        && r.apparent_wind_direction_deg.is_finite()
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
