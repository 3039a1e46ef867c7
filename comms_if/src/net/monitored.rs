//! # Monitored sockets
//!
//! zmq sockets which track whether they have a live peer. Each socket has a monitor socket on an
//! `inproc` endpoint which is read by a background thread, updating a connected flag the owner can
//! check before trying to talk to the peer.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::{Arc, atomic::{AtomicBool, AtomicUsize, Ordering}},
    thread,
    time::{Duration, Instant}
};
use log::{trace, warn};
use zmq::{Context, Socket, SocketEvent, SocketType};

// ------------------------------------------------------------------------------------------------
// MACROS
// ------------------------------------------------------------------------------------------------

macro_rules! set_sockopts {
    ($socket:expr, $(($opt:ident, $val:expr)),+) => {
        $(
            $socket.$opt($val)
                .map_err(|e| MonitoredSocketError::SocketOptionError(stringify!($opt).into(), e))?;
        )+
    };
}

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// How long the monitor thread waits for an event before checking for shutdown.
///
/// Units: milliseconds
const MONITOR_POLL_MS: i32 = 50;

/// Counter giving each monitor its own endpoint.
static NUM_MONITORS: AtomicUsize = AtomicUsize::new(0);

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A zmq socket together with a thread watching its connection state.
///
/// Dereferences to the underlying [`zmq::Socket`], so it is used like one.
pub struct MonitoredSocket {
    socket: Socket,

    monitor_jh: Option<thread::JoinHandle<()>>,

    shutdown: Arc<AtomicBool>,

    connected: Arc<AtomicBool>
}

/// Options applied to a monitored socket.
///
/// Apart from `bind` and `block_on_first_connect` these map onto the `ZMQ_*` options of
/// `zmq_setsockopt`, times are in milliseconds.
#[derive(Debug, Clone, Copy)]
pub struct SocketOptions {
    /// Bind to the endpoint instead of connecting to it. Servers bind, clients connect.
    pub bind: bool,

    /// Block in `MonitoredSocket::new` until the first connection is made, failing if
    /// `connect_timeout` passes first (a zero timeout waits forever).
    pub block_on_first_connect: bool,

    /// `ZMQ_REQ_CORRELATE`, only applied to REQ sockets
    pub req_correlate: bool,

    /// `ZMQ_REQ_RELAXED`, only applied to REQ sockets
    pub req_relaxed: bool,

    /// `ZMQ_LINGER`
    pub linger: i32,

    /// `ZMQ_RECONNECT_IVL`
    pub reconnect_ivl: i32,

    /// `ZMQ_RECONNECT_IVL_MAX`
    pub reconnect_ivl_max: i32,

    /// `ZMQ_CONNECT_TIMEOUT`
    pub connect_timeout: i32,

    /// `ZMQ_RCVTIMEO`
    pub recv_timeout: i32,

    /// `ZMQ_SNDTIMEO`
    pub send_timeout: i32,

    /// `ZMQ_HEARTBEAT_IVL`
    pub heartbeat_ivl: i32,

    /// `ZMQ_HEARTBEAT_TIMEOUT`
    pub heartbeat_timeout: i32,

    /// `ZMQ_HEARTBEAT_TTL`
    pub heartbeat_ttl: i32
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum MonitoredSocketError {
    #[error("Error creating the socket: {0}")]
    CreateSocketError(zmq::Error),

    #[error("Error enabling monitoring for the socket: {0}")]
    MonitoringEnableError(zmq::Error),

    #[error("Could not connect the socket: {0:?}")]
    CouldNotConnect(Option<zmq::Error>),

    #[error("Could not read event from monitor socket: {0}")]
    EventReadError(zmq::Error),

    #[error("Could not set the {0} socket option: {1}")]
    SocketOptionError(String, zmq::Error)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MonitoredSocket {
    /// Create a socket of the given type, then bind or connect it to `endpoint` (such as
    /// `"tcp://localhost:10010"`) depending on `socket_options.bind`.
    pub fn new(
        ctx: &Context,
        socket_type: SocketType,
        socket_options: SocketOptions,
        endpoint: &str
    ) -> Result<Self, MonitoredSocketError> {
        let socket = ctx.socket(socket_type)
            .map_err(MonitoredSocketError::CreateSocketError)?;

        // The monitor must be attached before connecting so no event is missed
        let monitor_endpoint = format!(
            "inproc://helm_monitor_{}",
            NUM_MONITORS.fetch_add(1, Ordering::Relaxed)
        );
        socket.monitor(&monitor_endpoint, SocketEvent::ALL as i32)
            .map_err(MonitoredSocketError::MonitoringEnableError)?;

        let monitor = ctx.socket(zmq::PAIR)
            .map_err(MonitoredSocketError::CreateSocketError)?;
        set_sockopts!(monitor, (set_rcvtimeo, MONITOR_POLL_MS), (set_linger, 0));
        monitor.connect(&monitor_endpoint)
            .map_err(|e| MonitoredSocketError::CouldNotConnect(Some(e)))?;

        socket_options.set(&socket)?;

        if socket_options.bind {
            socket.bind(endpoint)
        }
        else {
            socket.connect(endpoint)
        }.map_err(|e| MonitoredSocketError::CouldNotConnect(Some(e)))?;

        let connected = Arc::new(AtomicBool::new(false));

        if socket_options.block_on_first_connect {
            wait_for_connection(&monitor, socket_options.connect_timeout)?;
            connected.store(true, Ordering::Relaxed);
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let connected_clone = connected.clone();

        let monitor_jh = thread::spawn(move || {
            monitor_socket(monitor, monitor_endpoint, shutdown_clone, connected_clone)
        });

        Ok(Self {
            socket,
            monitor_jh: Some(monitor_jh),
            shutdown,
            connected
        })
    }

    /// Returns true if the socket has a peer.
    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

impl Drop for MonitoredSocket {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);

        if let Some(jh) = self.monitor_jh.take() {
            if jh.join().is_err() {
                warn!("Socket monitor thread panicked");
            }
        }
    }
}

impl std::ops::Deref for MonitoredSocket {
    type Target = Socket;

    fn deref(&self) -> &Self::Target {
        &self.socket
    }
}

impl std::ops::DerefMut for MonitoredSocket {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.socket
    }
}

impl SocketOptions {
    /// Apply the options to the socket.
    pub fn set(&self, socket: &Socket) -> Result<(), MonitoredSocketError> {
        set_sockopts!(
            socket,
            (set_connect_timeout, self.connect_timeout),
            (set_heartbeat_ivl, self.heartbeat_ivl),
            (set_heartbeat_timeout, self.heartbeat_timeout),
            (set_heartbeat_ttl, self.heartbeat_ttl),
            (set_linger, self.linger),
            (set_reconnect_ivl, self.reconnect_ivl),
            (set_reconnect_ivl_max, self.reconnect_ivl_max),
            (set_rcvtimeo, self.recv_timeout),
            (set_sndtimeo, self.send_timeout)
        );

        if let Ok(SocketType::REQ) = socket.get_socket_type() {
            set_sockopts!(
                socket,
                (set_req_correlate, self.req_correlate),
                (set_req_relaxed, self.req_relaxed)
            );
        }

        Ok(())
    }
}

impl Default for SocketOptions {
    /// zmq's own defaults, connecting and blocking until connected.
    fn default() -> Self {
        Self {
            bind: false,
            block_on_first_connect: true,
            connect_timeout: 0,
            heartbeat_ivl: 0,
            heartbeat_timeout: 0,
            heartbeat_ttl: 0,
            linger: 30_000,
            reconnect_ivl: 100,
            reconnect_ivl_max: 0,
            recv_timeout: -1,
            req_correlate: false,
            req_relaxed: false,
            send_timeout: 0
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Read one event from a monitor socket.
///
/// Returns `Ok(None)` if no event arrived within the monitor's receive timeout. Events are two
/// frames, a six byte event frame (the event ID then a value) followed by the peer address. A
/// malformed event is skipped.
fn read_event(monitor: &Socket) -> Result<Option<SocketEvent>, zmq::Error> {
    let msg = match monitor.recv_msg(0) {
        Ok(m) => m,
        Err(zmq::Error::EAGAIN) => return Ok(None),
        Err(e) => return Err(e)
    };

    if !monitor.get_rcvmore()? {
        return Ok(None)
    }
    monitor.recv_msg(0)?;

    if msg.len() < 2 {
        return Ok(None)
    }

    Ok(Some(SocketEvent::from_raw(u16::from_ne_bytes([msg[0], msg[1]]))))
}

/// Wait on the monitor until the socket connects.
fn wait_for_connection(monitor: &Socket, timeout_ms: i32) -> Result<(), MonitoredSocketError> {
    let deadline = if timeout_ms > 0 {
        Some(Instant::now() + Duration::from_millis(timeout_ms as u64))
    }
    else {
        None
    };

    loop {
        match read_event(monitor).map_err(MonitoredSocketError::EventReadError)? {
            Some(SocketEvent::CONNECTED) => return Ok(()),
            Some(SocketEvent::CONNECT_DELAYED) | Some(SocketEvent::CONNECT_RETRIED) => (),
            Some(_) => return Err(MonitoredSocketError::CouldNotConnect(None)),
            None => ()
        }

        if let Some(d) = deadline {
            if Instant::now() > d {
                return Err(MonitoredSocketError::CouldNotConnect(None))
            }
        }
    }
}

fn monitor_socket(
    monitor: Socket,
    monitor_endpoint: String,
    shutdown: Arc<AtomicBool>,
    connected: Arc<AtomicBool>
) {
    while !shutdown.load(Ordering::Relaxed) {
        let event = match read_event(&monitor) {
            Ok(Some(e)) => e,
            Ok(None) => continue,
            Err(e) => {
                warn!("Could not read from socket monitor {}: {}", monitor_endpoint, e);
                connected.store(false, Ordering::Relaxed);
                break
            }
        };

        trace!("{}: {:?}", monitor_endpoint, event);

        match event {
            SocketEvent::CONNECTED | SocketEvent::ACCEPTED => {
                connected.store(true, Ordering::Relaxed)
            },
            SocketEvent::DISCONNECTED => connected.store(false, Ordering::Relaxed),
            _ => ()
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn wait_connected(socket: &MonitoredSocket) -> bool {
        let start = Instant::now();
        while !socket.connected() && start.elapsed() < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(5));
        }
        socket.connected()
    }

    #[test]
    fn test_connection_tracked_on_both_ends() {
        let ctx = Context::new();
        let endpoint = "tcp://127.0.0.1:47310";

        let server = MonitoredSocket::new(
            &ctx,
            zmq::PAIR,
            SocketOptions { bind: true, block_on_first_connect: false, linger: 0, ..Default::default() },
            endpoint
        ).unwrap();
        assert!(!server.connected());

        let client = MonitoredSocket::new(
            &ctx,
            zmq::PAIR,
            SocketOptions { connect_timeout: 2000, linger: 0, ..Default::default() },
            endpoint
        ).unwrap();

        assert!(client.connected());
        assert!(wait_connected(&server));

        // Sockets are usable through deref
        client.send("hello", 0).unwrap();
        assert_eq!(server.recv_string(0).unwrap().unwrap(), "hello");

        // Dropping joins the monitor thread
        drop(client);
        drop(server);
    }

    #[test]
    fn test_blocking_connect_times_out() {
        let ctx = Context::new();

        let result = MonitoredSocket::new(
            &ctx,
            zmq::PAIR,
            SocketOptions { connect_timeout: 200, linger: 0, ..Default::default() },
            "tcp://127.0.0.1:47319"
        );

        assert!(matches!(result, Err(MonitoredSocketError::CouldNotConnect(_))));
    }
}
