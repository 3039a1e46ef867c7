//! # Helm library.
//!
//! This library allows other crates in the workspace (and the integration tests and benchmarks)
//! to access items defined inside the helm crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Cycle management - paces the main loop and carries the stop signal
pub mod cycle;

/// Global data store for the executable
pub mod data_store;

/// Helm control module - steers the boat and executes tacks and jibes
pub mod helm_ctrl;

/// Executable parameters
pub mod params;

/// Simulation client - exchanges sensor data and demands with the sailing simulator
pub mod sim_client;

/// Telecommand client - recieves telecommands from the planner
pub mod tc_client;

/// Telecommand processor - applies telecommands to the data store
pub mod tc_processor;

/// Telemetry server - sends helm telemetry to the planner
pub mod tm_server;

// ------------------------------------------------------------------------------------------------
// TEST HELPERS
// ------------------------------------------------------------------------------------------------

/// Loopback network parameters for socket tests.
#[cfg(test)]
pub(crate) fn test_net_params() -> comms_if::net::NetParams {
    comms_if::net::NetParams {
        sim_recv_endpoint: String::from("127.0.0.1:0"),
        sim_dems_endpoint: String::from("127.0.0.1:9"),
        sim_num_doubles: 6,
        sim_heading_channel: 0,
        sim_apparent_wind_angle_channel: 1,
        sim_apparent_wind_direction_channel: 2,
        tc_endpoint: String::from("tcp://127.0.0.1:47311"),
        tm_endpoint: String::from("tcp://127.0.0.1:47312"),
        recv_timeout_ms: 10
    }
}
