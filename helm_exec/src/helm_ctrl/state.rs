//! Implementations for the HelmCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;

// Internal
use super::{
    HelmCtrlError, Params, PidController, ProcedureKind, ProcedurePhase, ProcedureScheduler,
    ProcedureTuning, RudderCmd, SailTable, SessionEvent, SheetCmd
};
use comms_if::{
    eqpt::helm::{ControlSnapshot, HelmDems},
    tc::SailingMode
};
use util::{
    archive::{ArchiveError, Archived, Archiver},
    maths::angle_subtract,
    module::State,
    params,
    session::Session
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Session-relative path of the saved procedure history.
pub const HISTORY_SAVE_PATH: &str = "helm_ctrl/procedure_history.json";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Helm control module state
pub struct HelmCtrl {
    pub(crate) params: Params,

    sail_table: SailTable,

    /// Steers to the goal heading in normal sailing
    heading_ctrl: PidController,

    /// Tracks a target apparent wind direction during a maneuver
    wind_ctrl: PidController,

    scheduler: ProcedureScheduler,

    /// The session, used to save the procedure history when it changes
    session: Option<Session>,

    arch: Archiver,
    arch_record: Option<ArchRecord>
}

/// Input data to Helm Control.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputData {
    /// Current time from the cycle clock.
    ///
    /// Units: seconds
    pub time_s: f64,

    /// Time since the previous cycle.
    ///
    /// Units: seconds
    pub dt_s: f64,

    /// Sailing mode requested by the planner.
    pub sailing_mode: SailingMode,

    /// Sensor snapshot for this cycle.
    pub snapshot: ControlSnapshot,

    /// Change of remote control requested on this cycle, if any.
    pub remote_control: Option<bool>
}

/// Status report for HelmCtrl processing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusReport {
    /// The sailing mode that was executed
    pub mode: SailingMode,

    /// The running procedure
    pub procedure: Option<ProcedureKind>,

    /// The phase of the running procedure
    pub phase: Option<ProcedurePhase>,

    pub rudder_cmd: Option<RudderCmd>,

    pub sheet_cmd: Option<SheetCmd>,

    /// Scheduler events which occured on this cycle
    pub events: Vec<SessionEvent>,

    /// True if every procedure has failed in the current maneuver session
    pub exhausted: bool,

    pub remote_control: bool
}

/// One cycle of helm control, as written to the archive.
#[derive(Debug, Clone, Serialize)]
struct ArchRecord {
    time_s: f64,
    mode: String,
    heading_deg: f64,
    goal_heading_deg: f64,
    apparent_wind_angle_deg: f64,
    apparent_wind_direction_deg: f64,
    rudder_angle_deg: f64,
    sheet_setting: f64,
    procedure: String,
    phase: String,
    exhausted: bool
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for HelmCtrl {
    /// An uninitialised controller using the default parameters.
    fn default() -> Self {
        let params = Params::default();

        Self {
            heading_ctrl: rudder_controller(&params),
            wind_ctrl: rudder_controller(&params),
            sail_table: SailTable::default(),
            scheduler: ProcedureScheduler::default(),
            params,
            session: None,
            arch: Archiver::default(),
            arch_record: None
        }
    }
}

impl State for HelmCtrl {
    /// Path to the parameter file and an optional seed for the scheduler's random number
    /// generator.
    type InitData = (&'static str, Option<u64>);
    type InitError = HelmCtrlError;

    type InputData = InputData;
    type OutputData = HelmDems;
    type StatusReport = StatusReport;
    type ProcError = HelmCtrlError;

    /// Initialise the HelmCtrl module.
    fn init(&mut self, init_data: Self::InitData, session: &Session)
        -> Result<(), Self::InitError>
    {
        let (params_path, seed) = init_data;

        // Load the parameters
        let params: Params = params::load(params_path)
            .map_err(HelmCtrlError::ParamLoadError)?;

        *self = Self::from_params(params, seed)?;

        // Initialise the archiver
        self.arch = Archiver::from_path(session, "helm_ctrl/helm_ctrl.csv")
            .map_err(HelmCtrlError::ArchiveError)?;

        self.session = Some(session.clone());

        Ok(())
    }

    /// Perform cyclic processing of Helm Control.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        let snapshot = input_data.snapshot;

        if !snapshot.is_finite() {
            return Err(HelmCtrlError::NonFiniteSnapshot(snapshot))
        }

        if let Some(rc) = input_data.remote_control {
            self.scheduler.set_remote_control(rc);
        }

        let now_s = input_data.time_s;
        let mode = input_data.sailing_mode;
        let mut events = vec![];

        let (rudder_cmd, sheet_cmd) = match mode {
            SailingMode::Normal => {
                // The planner has returned to normal sailing, so the maneuver is complete
                if self.scheduler.is_in_progress() {
                    events.extend(self.scheduler.mark_success(now_s));
                }

                (RudderCmd::PidGoalHeading, SheetCmd::Wind { offset: 0.0 })
            },
            _ => self.run_procedure(mode, now_s, &mut events)?
        };

        let dems = HelmDems {
            rudder_angle_deg: self.resolve_rudder(rudder_cmd, &snapshot, input_data.dt_s),
            sheet_setting: self.sail_table.resolve(
                sheet_cmd, snapshot.apparent_wind_angle_deg
            )
        };

        let active = self.scheduler.active().copied();

        let report = StatusReport {
            mode,
            procedure: active.map(|p| p.kind),
            phase: active.map(|p| p.phase(now_s, &self.params.tuning)),
            rudder_cmd: Some(rudder_cmd),
            sheet_cmd: Some(sheet_cmd),
            exhausted: active.is_some() && self.scheduler.is_exhausted(),
            remote_control: self.scheduler.remote_control(),
            events
        };

        trace!(
            "HelmCtrl: {:?} {:?} -> rudder {:.2} deg, sheet {:.2}",
            report.procedure, report.phase, dems.rudder_angle_deg, dems.sheet_setting
        );

        if report.events.iter().any(is_outcome) {
            self.save_history();
        }

        self.arch_record = Some(ArchRecord {
            time_s: now_s,
            mode: mode.to_string(),
            heading_deg: snapshot.heading_deg,
            goal_heading_deg: snapshot.goal_heading_deg,
            apparent_wind_angle_deg: snapshot.apparent_wind_angle_deg,
            apparent_wind_direction_deg: snapshot.apparent_wind_direction_deg,
            rudder_angle_deg: dems.rudder_angle_deg,
            sheet_setting: dems.sheet_setting,
            procedure: report.procedure.map(|k| k.to_string()).unwrap_or_default(),
            phase: report.phase.map(|p| format!("{:?}", p)).unwrap_or_default(),
            exhausted: report.exhausted
        });

        Ok((dems, report))
    }
}

impl Archived for HelmCtrl {
    fn write(&mut self) -> Result<(), ArchiveError> {
        if !self.arch.is_active() {
            return Ok(())
        }

        match self.arch_record.take() {
            Some(r) => self.arch.serialise(r),
            None => Ok(())
        }
    }
}

impl HelmCtrl {
    /// Build a new controller from the given parameters.
    ///
    /// If `seed` is given the scheduler's exploration is reproducible, otherwise the random
    /// number generator is seeded from entropy.
    pub fn from_params(params: Params, seed: Option<u64>) -> Result<Self, HelmCtrlError> {
        params.validate()?;

        let sail_table = SailTable::new(&params.sail_table)
            .map_err(HelmCtrlError::SailTableError)?;

        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy()
        };

        let mut scheduler = ProcedureScheduler::new(&params.procedures, params.scheduler, rng)
            .map_err(HelmCtrlError::SchedulerError)?;
        scheduler.set_remote_control(params.remote_control);

        Ok(Self {
            heading_ctrl: rudder_controller(&params),
            wind_ctrl: rudder_controller(&params),
            sail_table,
            scheduler,
            params,
            session: None,
            arch: Archiver::default(),
            arch_record: None
        })
    }

    /// The procedure scheduler.
    pub fn scheduler(&self) -> &ProcedureScheduler {
        &self.scheduler
    }

    /// The procedure tuning in use.
    pub fn tuning(&self) -> &ProcedureTuning {
        &self.params.tuning
    }

    /// Make sure a procedure for the requested mode is running, starting or replacing one as
    /// needed, and get its commands.
    fn run_procedure(
        &mut self,
        mode: SailingMode,
        now_s: f64,
        events: &mut Vec<SessionEvent>
    ) -> Result<(RudderCmd, SheetCmd), HelmCtrlError> {
        let (start_session, timed_out) = match self.scheduler.active() {
            None => (true, false),
            Some(p) if p.sailing_mode != mode => (true, false),
            Some(p) => (false, p.has_timed_out(now_s))
        };

        if start_session {
            // A mode flip abandons the running procedure without an outcome
            events.extend(self.scheduler.discard());

            self.scheduler.start_session();
            events.push(self.scheduler.start_procedure(mode, now_s));
        }
        else if timed_out {
            events.extend(self.scheduler.mark_failure(now_s));

            self.scheduler.advance();
            events.push(self.scheduler.start_procedure(mode, now_s));
        }

        self.scheduler.active()
            .map(|p| p.step(now_s, &self.params.tuning))
            .ok_or(HelmCtrlError::NoActiveProcedure(mode))
    }

    /// Convert a rudder command into a rudder angle. Positive angles are to the left.
    fn resolve_rudder(&mut self, cmd: RudderCmd, snapshot: &ControlSnapshot, dt_s: f64) -> f64 {
        let max_angle_deg = self.params.rudder.max_angle_deg;

        match cmd {
            RudderCmd::PidGoalHeading => self.heading_ctrl.update(
                angle_subtract(snapshot.goal_heading_deg, snapshot.heading_deg),
                dt_s
            ),
            RudderCmd::PidAngleToWind { target_deg } => -self.wind_ctrl.update(
                angle_subtract(target_deg, snapshot.apparent_wind_direction_deg),
                dt_s
            ),
            RudderCmd::FullLeft => max_angle_deg,
            RudderCmd::FullRight => -max_angle_deg
        }
    }

    fn save_history(&self) {
        if let Some(ref session) = self.session {
            session.save(HISTORY_SAVE_PATH, self.scheduler.history_summary());
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn rudder_controller(params: &Params) -> PidController {
    let r = &params.rudder;
    PidController::new(r.k_p, r.k_i, r.k_d, r.max_angle_deg)
}

/// Returns true if the event changes a procedure's history.
fn is_outcome(event: &SessionEvent) -> bool {
    matches!(
        event,
        SessionEvent::Succeeded { recorded: true, .. }
            | SessionEvent::Failed { recorded: true, .. }
    )
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
