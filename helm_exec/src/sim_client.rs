//! # Simulation Client
//!
//! The SimClient exchanges data with the sailing simulator. Sensor packets are published by the
//! simulator as fast as it runs, a background thread receives and decodes them and hands them to
//! the main loop over a channel. The main loop takes the latest packet at the start of each cycle
//! and sends its demands back at the end of the cycle.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    net::SocketAddr,
    sync::{Arc, atomic::{AtomicBool, Ordering}, mpsc::{self, Receiver, Sender, TryRecvError}},
    thread::{self, JoinHandle},
    time::Duration
};
use log::{error, warn};

use comms_if::{
    eqpt::{
        helm::HelmDems,
        sim::{SimCodecError, SimDems, SimSensData, SimStatus}
    },
    net::{NetError, NetParams, UdpEndpoint, MAX_DATAGRAM_LEN}
};

use crate::data_store::SensorReading;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct SimClient {
    bg_jh: Option<JoinHandle<()>>,
    bg_run: Arc<AtomicBool>,
    sens_rx: Receiver<SimSensData>,
    dems_endpoint: UdpEndpoint,
    recv_addr: Option<SocketAddr>,
    channels: SimChannels
}

/// Indices of the state channels the helm reads.
#[derive(Debug, Clone, Copy)]
struct SimChannels {
    heading: usize,
    apparent_wind_angle: usize,
    apparent_wind_direction: usize
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SimClientError {

    #[error("Socket error: {0}")]
    SocketError(NetError),

    #[error("Could not send demands to the simulator: {0}")]
    SendError(NetError),

    #[error("The simulator packet does not contain the required data: {0}")]
    CodecError(SimCodecError),

    #[error("The SimClient background thread has stopped")]
    NotConnected

}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimClient {
    /// Create a new instance of the SimClient, starting the background receive thread.
    pub fn new(params: &NetParams) -> Result<Self, SimClientError> {
        let recv_timeout = Duration::from_millis(params.recv_timeout_ms.max(1));

        let sens_endpoint = UdpEndpoint::bind(&params.sim_recv_endpoint, recv_timeout)
            .map_err(SimClientError::SocketError)?;
        let recv_addr = sens_endpoint.local_addr();

        // The demands endpoint is only used for sending, so let the OS pick the port
        let dems_endpoint = UdpEndpoint::with_peer(
            "0.0.0.0:0",
            &params.sim_dems_endpoint,
            Duration::from_secs(0)
        ).map_err(SimClientError::SocketError)?;

        let (sens_tx, sens_rx) = mpsc::channel();

        let bg_run = Arc::new(AtomicBool::new(true));
        let bg_run_clone = bg_run.clone();
        let num_doubles = params.sim_num_doubles;

        let bg_jh = Some(thread::spawn(move || {
            bg_thread(sens_endpoint, num_doubles, bg_run_clone, sens_tx)
        }));

        Ok(Self {
            bg_jh,
            bg_run,
            sens_rx,
            dems_endpoint,
            recv_addr,
            channels: SimChannels {
                heading: params.sim_heading_channel,
                apparent_wind_angle: params.sim_apparent_wind_angle_channel,
                apparent_wind_direction: params.sim_apparent_wind_direction_channel
            }
        })
    }

    /// Take the most recent packet received since the last call, discarding any older ones.
    ///
    /// Returns `Ok(None)` if nothing new has arrived.
    pub fn latest(&self) -> Result<Option<SimSensData>, SimClientError> {
        let mut latest = None;

        loop {
            match self.sens_rx.try_recv() {
                Ok(d) => latest = Some(d),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if latest.is_none() {
                        return Err(SimClientError::NotConnected)
                    }
                    break
                }
            }
        }

        Ok(latest)
    }

    /// Extract the sensor values the helm needs from a packet.
    pub fn reading(&self, data: &SimSensData) -> Result<SensorReading, SimClientError> {
        Ok(SensorReading {
            heading_deg: data.channel(self.channels.heading)
                .map_err(SimClientError::CodecError)?,
            apparent_wind_angle_deg: data.channel(self.channels.apparent_wind_angle)
                .map_err(SimClientError::CodecError)?,
            apparent_wind_direction_deg: data.channel(self.channels.apparent_wind_direction)
                .map_err(SimClientError::CodecError)?
        })
    }

    /// Send demands to the simulator.
    pub fn send_demands(&self, status: SimStatus, dems: &HelmDems) -> Result<(), SimClientError> {
        let packet = SimDems::from_helm_dems(status, dems).encode();

        self.dems_endpoint.send(&packet)
            .map(|_| ())
            .map_err(SimClientError::SendError)
    }

    /// The address sensor packets are received on.
    pub fn recv_addr(&self) -> Option<SocketAddr> {
        self.recv_addr
    }
}

impl Drop for SimClient {
    fn drop(&mut self) {
        self.bg_run.store(false, Ordering::Relaxed);

        if let Some(jh) = self.bg_jh.take() {
            if jh.join().is_err() {
                error!("SimClient background thread panicked");
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Background thread, decodes packets from the simulator and passes them to the front end.
fn bg_thread(
    endpoint: UdpEndpoint,
    num_doubles: usize,
    run: Arc<AtomicBool>,
    sens_tx: Sender<SimSensData>
) {
    let mut buf = [0u8; MAX_DATAGRAM_LEN];

    // While instructed to run
    while run.load(Ordering::Relaxed) {
        let len = match endpoint.recv(&mut buf) {
            Ok(Some(n)) => n,
            Ok(None) => continue,
            Err(e) => {
                error!("Error receiving packet from the simulator: {}", e);
                break
            }
        };

        let data = match SimSensData::decode(&buf[..len], num_doubles) {
            Ok(d) => d,
            Err(e) => {
                warn!("Discarding malformed simulator packet: {}", e);
                continue
            }
        };

        // The front end has gone away
        if sens_tx.send(data).is_err() {
            break
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
    use std::io::Cursor;
    use std::time::Instant;

    fn packet(status: u32, doubles: &[f64]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(status).unwrap();
        for d in doubles {
            buf.write_f64::<LittleEndian>(*d).unwrap();
        }
        buf
    }

    fn params(dems_endpoint: &str) -> NetParams {
        let mut p = crate::test_net_params();
        p.sim_dems_endpoint = String::from(dems_endpoint);
        p
    }

    /// Poll the client until a packet arrives or a second passes.
    fn wait_latest(client: &SimClient) -> Option<SimSensData> {
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(1) {
            if let Some(d) = client.latest().unwrap() {
                return Some(d)
            }
            thread::sleep(Duration::from_millis(5));
        }
        None
    }

    #[test]
    fn test_sim_exchange() {
        // The fake simulator
        let sim = UdpEndpoint::bind("127.0.0.1:0", Duration::from_millis(500)).unwrap();
        let sim_addr = sim.local_addr().unwrap().to_string();

        let client = SimClient::new(&params(&sim_addr)).unwrap();
        let client_addr = client.recv_addr().unwrap().to_string();

        let sim_tx = UdpEndpoint::with_peer("127.0.0.1:0", &client_addr, Duration::from_secs(0))
            .unwrap();

        // A malformed packet is dropped, the good one comes through
        sim_tx.send(&[0, 1, 2]).unwrap();
        sim_tx.send(&packet(0, &[1.0, 0.1, 1.0, 90.0, 45.0, 135.0])).unwrap();

        let data = wait_latest(&client).unwrap();
        assert_eq!(data.time_s, 1.0);

        let reading = client.reading(&data).unwrap();
        assert_eq!(reading, SensorReading {
            heading_deg: 90.0,
            apparent_wind_angle_deg: 45.0,
            apparent_wind_direction_deg: 135.0
        });

        // Demands go back with the rudder in radians
        client.send_demands(
            SimStatus::Continue,
            &HelmDems { rudder_angle_deg: -30.0, sheet_setting: 0.5 }
        ).unwrap();

        let mut buf = [0u8; MAX_DATAGRAM_LEN];
        let n = sim.recv(&mut buf).unwrap().unwrap();
        let mut rdr = Cursor::new(&buf[..n]);
        assert_eq!(rdr.read_u32::<LittleEndian>().unwrap(), 0);
        assert_eq!(rdr.read_f64::<LittleEndian>().unwrap(), 0.5);
        assert!((rdr.read_f64::<LittleEndian>().unwrap() + 30f64.to_radians()).abs() < 1e-12);
    }

    #[test]
    fn test_reading_missing_channel() {
        let sim = UdpEndpoint::bind("127.0.0.1:0", Duration::from_secs(0)).unwrap();
        let mut p = params(&sim.local_addr().unwrap().to_string());
        p.sim_apparent_wind_direction_channel = 5;

        let client = SimClient::new(&p).unwrap();
        let data = SimSensData::decode(&packet(0, &[0.0, 0.1, 1.0, 1.0, 2.0, 3.0]), 6).unwrap();

        assert!(matches!(
            client.reading(&data),
            Err(SimClientError::CodecError(SimCodecError::NoSuchChannel(5)))
        ));
        assert!(client.latest().unwrap().is_none());
    }
}
