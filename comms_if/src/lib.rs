//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the helming software.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod tc;

/// Command and sensor definitions for equipment (the helm actuators and the simulator link)
pub mod eqpt;

/// Network module
pub mod net;
