//! # TM Server
//!
//! Publishes one JSON telemetry packet to the planner every cycle on a zmq PUB socket. The packet carries the helm's
//! demands, the running procedure and its phase, the scheduler events of the cycle, and the
//! exhausted flag which tells the planner every procedure has failed in the current maneuver.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Serialize, Deserialize};

use comms_if::{
    eqpt::helm::{ControlSnapshot, HelmDems},
    net::{zmq, MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions},
    tc::SailingMode
};

use crate::{
    data_store::DataStore,
    helm_ctrl::{ProcedureKind, ProcedurePhase, SessionEvent}
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Telemetry server
pub struct TmServer {
    socket: MonitoredSocket
}

/// Telemetry packet that is output by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelmTm {
    pub time_s: f64,

    pub sim_time_s: Option<f64>,

    pub mode: SailingMode,

    pub snapshot: ControlSnapshot,

    pub dems: HelmDems,

    pub procedure: Option<ProcedureKind>,

    pub phase: Option<ProcedurePhase>,

    pub events: Vec<SessionEvent>,

    pub exhausted: bool,

    pub remote_control: bool,

    pub num_consec_stale_cycles: u64
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TmServerError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not send telemetry: {0}")]
    SendError(zmq::Error),

    #[error("Could not serialize the telemetry: {0}")]
    SerializationError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TmServer {
    /// Create a new instance of the TM Server, bound to the telemetry endpoint.
    ///
    /// This function will not block until the planner subscribes.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, TmServerError> {
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            bind: true,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            send_timeout: 10,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(
            ctx,
            zmq::PUB,
            socket_options,
            &params.tm_endpoint
        ).map_err(TmServerError::SocketError)?;

        Ok(Self {
            socket
        })
    }

    /// Returns true if a planner is subscribed.
    pub fn is_connected(&self) -> bool {
        self.socket.connected()
    }

    pub fn send(&mut self, ds: &DataStore) -> Result<(), TmServerError> {
        // Build packet
        let packet = HelmTm::from_datastore(ds);

        // Serialize packet
        let packet_string = serde_json::to_string(&packet)
            .map_err(TmServerError::SerializationError)?;

        // Publish the packet, dropped by zmq if nobody is subscribed
        self.socket.send(&packet_string, 0)
            .map_err(TmServerError::SendError)
    }
}

impl HelmTm {
    pub fn from_datastore(ds: &DataStore) -> Self {
        let rpt = &ds.helm_ctrl_status_rpt;

        Self {
            time_s: ds.time_s,
            sim_time_s: ds.sim_time_s,
            mode: ds.sailing_mode,
            snapshot: ds.helm_ctrl_input.snapshot,
            dems: ds.helm_ctrl_output,
            procedure: rpt.procedure,
            phase: rpt.phase,
            events: rpt.events.clone(),
            exhausted: rpt.exhausted,
            remote_control: rpt.remote_control,
            num_consec_stale_cycles: ds.num_consec_stale_cycles
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
