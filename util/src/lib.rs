//! # Helm utilities
//!
//! Support code shared by the helming executable, its tests and its benchmarks: the session
//! directory with its logs, archives and saved data, parameter loading, the module interface,
//! cycle clocks, planner scripts and angle maths.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// CSV archives of per-cycle data
pub mod archive;

/// Information on the host the executable runs on
pub mod host;

/// Terminal, session and cycle logs
pub mod logger;

/// Angle and interpolation maths
pub mod maths;

/// Interface of the cyclic modules
pub mod module;

/// Parameter file loading
pub mod params;

/// Planner scripts, telecommands timed from the start of the run
pub mod script_interpreter;

/// Session directory management and background saving
pub mod session;

/// Clocks driving the main loop
pub mod time;
