//! # Network Module
//!
//! The planner link runs over zmq: telecommands arrive on a REP socket and telemetry is published
//! on a PUB socket, both wrapped in a [`MonitoredSocket`] so the helm knows whether the planner is
//! there. The simulator speaks raw UDP datagrams of doubles, so that link uses a thin
//! [`UdpEndpoint`] abstraction. Every UDP socket is given a receive timeout so that no background
//! thread can block forever, which lets those threads check their run flags.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;
use serde::Deserialize;

mod monitored;
pub use monitored::{MonitoredSocket, MonitoredSocketError, SocketOptions};

// Export zmq
pub use zmq;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Maximum size of a datagram we expect to receive.
pub const MAX_DATAGRAM_LEN: usize = 4096;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Network parameters, loaded from `net.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct NetParams {
    /// Local address on which simulator packets are received.
    pub sim_recv_endpoint: String,

    /// Address of the simulator, to which demands are sent.
    pub sim_dems_endpoint: String,

    /// Total number of doubles in an inbound simulator packet, including the header doubles.
    pub sim_num_doubles: usize,

    /// Index of the heading channel (degrees) in the simulator state channels.
    pub sim_heading_channel: usize,

    /// Index of the apparent wind angle channel (degrees).
    pub sim_apparent_wind_angle_channel: usize,

    /// Index of the apparent wind direction channel (degrees).
    pub sim_apparent_wind_direction_channel: usize,

    /// zmq endpoint of the planner's telecommand server, which the helm connects to.
    pub tc_endpoint: String,

    /// zmq endpoint the helm binds to publish telemetry on.
    pub tm_endpoint: String,

    /// Receive timeout used by the simulator background thread.
    ///
    /// Units: milliseconds
    pub recv_timeout_ms: u64,
}

/// A bound UDP socket with an optional default peer.
pub struct UdpEndpoint {
    socket: UdpSocket,

    peer: Option<SocketAddr>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum NetError {
    #[error("Could not resolve the address \"{0}\"")]
    InvalidAddress(String),

    #[error("Could not bind the socket to {0}: {1}")]
    BindError(String, std::io::Error),

    #[error("Could not set socket option {0}: {1}")]
    SocketOptionError(String, std::io::Error),

    #[error("No peer has been set for this endpoint")]
    NoPeer,

    #[error("Could not send the datagram: {0}")]
    SendError(std::io::Error),

    #[error("Could not receive a datagram: {0}")]
    RecvError(std::io::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl UdpEndpoint {
    /// Bind a new endpoint to the given local address.
    ///
    /// A `recv_timeout` of zero makes the socket non-blocking.
    pub fn bind(local: &str, recv_timeout: Duration) -> Result<Self, NetError> {
        let addr = resolve(local)?;

        let socket = UdpSocket::bind(addr)
            .map_err(|e| NetError::BindError(local.into(), e))?;

        if recv_timeout == Duration::from_secs(0) {
            socket.set_nonblocking(true)
                .map_err(|e| NetError::SocketOptionError("nonblocking".into(), e))?;
        }
        else {
            socket.set_read_timeout(Some(recv_timeout))
                .map_err(|e| NetError::SocketOptionError("read_timeout".into(), e))?;
        }

        Ok(Self {
            socket,
            peer: None
        })
    }

    /// Bind to the given local address and set the default peer.
    pub fn with_peer(local: &str, peer: &str, recv_timeout: Duration) -> Result<Self, NetError> {
        let mut ep = Self::bind(local, recv_timeout)?;
        ep.peer = Some(resolve(peer)?);
        Ok(ep)
    }

    /// Send a datagram to the default peer.
    pub fn send(&self, buf: &[u8]) -> Result<usize, NetError> {
        let peer = self.peer.ok_or(NetError::NoPeer)?;

        self.socket.send_to(buf, peer).map_err(NetError::SendError)
    }

    /// Receive a datagram into the buffer.
    ///
    /// Returns `Ok(None)` if nothing arrived before the timeout.
    pub fn recv(&self, buf: &mut [u8]) -> Result<Option<usize>, NetError> {
        match self.socket.recv_from(buf) {
            Ok((n, _)) => Ok(Some(n)),
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                Ok(None)
            },
            Err(e) => Err(NetError::RecvError(e))
        }
    }

    /// The local address the endpoint is bound to.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr().ok()
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn resolve(addr: &str) -> Result<SocketAddr, NetError> {
    addr.to_socket_addrs()
        .ok()
        .and_then(|mut a| a.next())
        .ok_or_else(|| NetError::InvalidAddress(addr.into()))
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
