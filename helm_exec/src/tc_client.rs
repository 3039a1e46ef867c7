//! # Telecommand Client
//!
//! Receives JSON telecommands from the planner over a zmq REP socket. Every telecommand is
//! answered with a [`TcResponse`] before the next one can be received, the main loop drains all
//! pending telecommands at the start of each cycle.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    net::{zmq, MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions},
    tc::{Tc, TcParseError, TcResponse}
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Telecommand client
pub struct TcClient {
    socket: MonitoredSocket
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TcClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("The client is not connected to the planner")]
    NotConnected,

    #[error("Could not send a response to the planner: {0}")]
    SendError(zmq::Error),

    #[error("Could not recieve a message from the planner: {0}")]
    RecvError(zmq::Error),

    #[error("Could not serialize the response: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not parse the recieved telecommand: {0}")]
    TcParseError(TcParseError),

    #[error("The planner sent a message which was not valid UTF-8")]
    NonUtf8Message
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TcClient {

    /// Create a new instance of the TC Client.
    ///
    /// This function will not block until the planner is up.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, TcClientError> {
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            connect_timeout: 1000,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: 10,
            send_timeout: 10,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(
            ctx,
            zmq::REP,
            socket_options,
            &params.tc_endpoint
        ).map_err(TcClientError::SocketError)?;

        Ok(Self {
            socket
        })
    }

    /// Check if the client is connected to the planner.
    pub fn is_connected(&self) -> bool {
        self.socket.connected()
    }

    /// Recieve a single TC without waiting.
    ///
    /// The protocol here is to call recieve_tc in a loop until `Ok(None)` is returned, indicating
    /// that there are no more pending TCs to be recieved.
    ///
    /// After a valid TC the caller must answer with `send_response` before receiving again. A TC
    /// which cannot be parsed is answered with `TcResponse::Invalid` here, and receiving can
    /// continue after the error.
    pub fn recieve_tc(&self) -> Result<Option<Tc>, TcClientError> {
        if !self.socket.connected() {
            return Err(TcClientError::NotConnected)
        }

        let tc_str = match self.socket.recv_string(zmq::DONTWAIT) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => {
                self.send_response(TcResponse::Invalid)?;
                return Err(TcClientError::NonUtf8Message)
            },
            Err(zmq::Error::EAGAIN) => return Ok(None),
            Err(e) => return Err(TcClientError::RecvError(e))
        };

        match Tc::from_json(&tc_str) {
            Ok(tc) => Ok(Some(tc)),
            Err(e) => {
                self.send_response(TcResponse::Invalid)?;
                Err(TcClientError::TcParseError(e))
            }
        }
    }

    /// Send the response to the last received TC.
    pub fn send_response(&self, response: TcResponse) -> Result<(), TcClientError> {
        let response_str = serde_json::to_string(&response)
            .map_err(TcClientError::SerializationError)?;

        self.socket.send(&response_str, 0)
            .map_err(TcClientError::SendError)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::tc::SailingMode;
    use std::{thread, time::{Duration, Instant}};

    /// Poll the client until something other than `Ok(None)` arrives or two seconds pass.
    fn next(client: &TcClient) -> Option<Result<Tc, TcClientError>> {
        let start = Instant::now();

        while start.elapsed() < Duration::from_secs(2) {
            match client.recieve_tc() {
                Ok(Some(tc)) => return Some(Ok(tc)),
                Ok(None) | Err(TcClientError::NotConnected) => {
                    thread::sleep(Duration::from_millis(5))
                },
                Err(e) => return Some(Err(e))
            }
        }

        None
    }

    /// Send a TC from the planner side and read back the helm's response.
    fn request(planner: &zmq::Socket, tc: &str, client: &TcClient)
        -> (Option<Result<Tc, TcClientError>>, TcResponse)
    {
        planner.send(tc, 0).unwrap();

        let result = next(client);
        if let Some(Ok(_)) = result {
            client.send_response(TcResponse::Ok).unwrap();
        }

        let response = planner.recv_string(0).unwrap().unwrap();
        (result, serde_json::from_str(&response).unwrap())
    }

    #[test]
    fn test_receive_tcs() {
        let ctx = zmq::Context::new();
        let mut params = crate::test_net_params();
        params.tc_endpoint = String::from("tcp://127.0.0.1:47311");

        let planner = ctx.socket(zmq::REQ).unwrap();
        planner.set_linger(0).unwrap();
        planner.set_rcvtimeo(2000).unwrap();
        planner.bind(&params.tc_endpoint).unwrap();

        let client = TcClient::new(&ctx, &params).unwrap();

        let (result, response) = request(
            &planner, r#"{"type": "MODE", "payload": "switch_to_stbd_tack"}"#, &client
        );
        assert_eq!(
            result.unwrap().unwrap(),
            Tc::SetSailingMode(SailingMode::SwitchToStarboardTack)
        );
        assert_eq!(response, TcResponse::Ok);
        assert!(client.is_connected());

        let (result, response) = request(
            &planner, r#"{"type": "MODE", "payload": "go_faster"}"#, &client
        );
        assert!(matches!(
            result,
            Some(Err(TcClientError::TcParseError(TcParseError::InvalidMode(_))))
        ));
        assert_eq!(response, TcResponse::Invalid);

        let (result, response) = request(
            &planner, r#"{"type": "HEADING", "payload": 270.0}"#, &client
        );
        assert_eq!(result.unwrap().unwrap(), Tc::SetGoalHeading(270.0));
        assert_eq!(response, TcResponse::Ok);

        assert!(client.recieve_tc().unwrap().is_none());
    }

    #[test]
    fn test_not_connected_without_planner() {
        let ctx = zmq::Context::new();
        let mut params = crate::test_net_params();
        params.tc_endpoint = String::from("tcp://127.0.0.1:47313");

        let client = TcClient::new(&ctx, &params).unwrap();

        assert!(!client.is_connected());
        assert!(matches!(client.recieve_tc(), Err(TcClientError::NotConnected)));
    }
}
