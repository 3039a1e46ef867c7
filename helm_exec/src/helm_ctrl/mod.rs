//! # Helm control module
//!
//! Helm control decides the rudder angle and sheet setting each cycle. In normal sailing the
//! rudder holds the goal heading using a PID controller and the sheet follows the sail table.
//! When the planner requests a change of tack a maneuver session is started: the
//! `ProcedureScheduler` ranks the available procedures by how well they have performed in the
//! past and starts the best one. If a procedure runs past its timeout it is recorded as a failure
//! and the next procedure in the ranking is started on the same cycle. When the planner returns
//! to normal sailing the running procedure is recorded as a success.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod controllers;
mod params;
mod procedures;
mod sail_table;
mod scheduler;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use controllers::*;
pub use params::*;
pub use procedures::*;
pub use sail_table::*;
pub use scheduler::*;
pub use state::*;

use util::{archive::ArchiveError, params::LoadError};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during HelmCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum HelmCtrlError {
    #[error("Could not load the HelmCtrl parameters: {0}")]
    ParamLoadError(LoadError),

    #[error("Invalid HelmCtrl parameter: {0}")]
    InvalidParam(String),

    #[error("Invalid sail table: {0}")]
    SailTableError(SailTableError),

    #[error("Invalid procedure configuration: {0}")]
    SchedulerError(SchedulerError),

    #[error("Could not archive HelmCtrl data: {0}")]
    ArchiveError(ArchiveError),

    #[error("The input snapshot contains non-finite values: {0:?}")]
    NonFiniteSnapshot(comms_if::eqpt::helm::ControlSnapshot),

    #[error("No procedure is running for {0} after starting one")]
    NoActiveProcedure(comms_if::tc::SailingMode)
}
