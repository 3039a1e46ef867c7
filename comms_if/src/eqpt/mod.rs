//! # Equipment Interface
//!
//! This module defines the interface structures exchanged with the helm actuators and the
//! simulator.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod helm;
pub mod sim;
