//! # Simulator Equipment Interface
//!
//! The simulator speaks a fixed-size packed little-endian format over UDP. Inbound packets
//! (simulator -> helm) are a `u32` status word followed by a known number of `f64` values:
//!
//! ```text
//! | status: u32 | time_s | dt_s | time_scale | channel 0 | ... | channel N-1 |
//! ```
//!
//! Outbound packets (helm -> simulator) are a status word followed by exactly three `f64`s:
//!
//! ```text
//! | status: u32 | sheet_setting | rudder_angle_rad | ballast_pos_m |
//! ```
//!
//! The count of doubles is not sent on the wire, both sides must agree on it up front.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::convert::TryFrom;
use std::io::Cursor;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use super::helm::HelmDems;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of bytes in the status word.
pub const STATUS_WORD_LEN: usize = 4;

/// Number of doubles that lead every inbound packet (time, dt, time scale).
pub const NUM_HEADER_DOUBLES: usize = 3;

/// Number of doubles in an outbound packet.
pub const NUM_DEMS_DOUBLES: usize = 3;

/// Length of an outbound packet in bytes.
pub const DEMS_PACKET_LEN: usize = STATUS_WORD_LEN + NUM_DEMS_DOUBLES * 8;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A decoded inbound simulator packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimSensData {
    pub status: SimStatus,

    /// Simulation time.
    ///
    /// Units: seconds
    pub time_s: f64,

    /// Simulation step.
    ///
    /// Units: seconds
    pub dt_s: f64,

    /// Ratio of simulation time to wall time.
    pub time_scale: f64,

    /// The state channels following the header doubles.
    pub channels: Vec<f64>,
}

/// An outbound packet to the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimDems {
    pub status: SimStatus,

    pub sheet_setting: f64,

    /// Units: radians
    pub rudder_angle_rad: f64,

    /// Units: meters
    pub ballast_pos_m: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Status word carried at the start of every packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimStatus {
    /// Keep running
    Continue,

    /// The basin (or the agent) requests the episode is terminated
    BasinTerminate,

    /// The simulation requests the episode is terminated
    SimTerminate,
}

/// Errors that can occur while decoding a simulator packet.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SimCodecError {
    #[error("Packet is too short, expected {expected} bytes but got {actual}")]
    ShortPacket { expected: usize, actual: usize },

    #[error("Unknown status word {0}")]
    UnknownStatus(u32),

    #[error("Channel {0} is not finite")]
    NonFinite(usize),

    #[error("Channel {0} is out of range of the packet")]
    NoSuchChannel(usize),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimSensData {
    /// Decode an inbound packet containing `num_doubles` doubles (including the three header
    /// doubles).
    ///
    /// Trailing bytes beyond the expected length are ignored.
    pub fn decode(buf: &[u8], num_doubles: usize) -> Result<Self, SimCodecError> {
        let expected = STATUS_WORD_LEN + num_doubles.max(NUM_HEADER_DOUBLES) * 8;
        if buf.len() < expected {
            return Err(SimCodecError::ShortPacket { expected, actual: buf.len() })
        }

        let mut rdr = Cursor::new(buf);

        // Length already checked so these reads cannot run out of data, map them anyway rather
        // than unwrapping.
        let short = |_| SimCodecError::ShortPacket { expected, actual: buf.len() };

        let status = SimStatus::try_from(rdr.read_u32::<LittleEndian>().map_err(short)?)?;

        let mut doubles = Vec::with_capacity(num_doubles);
        for i in 0..num_doubles.max(NUM_HEADER_DOUBLES) {
            let v = rdr.read_f64::<LittleEndian>().map_err(short)?;
            if !v.is_finite() {
                return Err(SimCodecError::NonFinite(i))
            }
            doubles.push(v);
        }

        let channels = doubles.split_off(NUM_HEADER_DOUBLES);

        Ok(Self {
            status,
            time_s: doubles[0],
            dt_s: doubles[1],
            time_scale: doubles[2],
            channels,
        })
    }

    /// Get a state channel by index (not counting the header doubles).
    pub fn channel(&self, index: usize) -> Result<f64, SimCodecError> {
        self.channels
            .get(index)
            .copied()
            .ok_or(SimCodecError::NoSuchChannel(index))
    }
}

impl SimDems {
    /// Build the outbound packet for the given helm demands.
    pub fn from_helm_dems(status: SimStatus, dems: &HelmDems) -> Self {
        Self {
            status,
            sheet_setting: dems.sheet_setting,
            rudder_angle_rad: dems.rudder_angle_deg.to_radians(),
            ballast_pos_m: 0.0,
        }
    }

    /// Encode into the wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(DEMS_PACKET_LEN);

        // Writes into a Vec cannot fail
        buf.write_u32::<LittleEndian>(self.status.into()).ok();
        buf.write_f64::<LittleEndian>(self.sheet_setting).ok();
        buf.write_f64::<LittleEndian>(self.rudder_angle_rad).ok();
        buf.write_f64::<LittleEndian>(self.ballast_pos_m).ok();

        buf
    }
}

impl SimStatus {
    /// Returns true if either side has asked for the episode to end.
    pub fn is_terminate(&self) -> bool {
        !matches!(self, SimStatus::Continue)
    }
}

impl TryFrom<u32> for SimStatus {
    type Error = SimCodecError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SimStatus::Continue),
            1 => Ok(SimStatus::BasinTerminate),
            2 => Ok(SimStatus::SimTerminate),
            s => Err(SimCodecError::UnknownStatus(s))
        }
    }
}

impl From<SimStatus> for u32 {
    fn from(status: SimStatus) -> Self {
        match status {
            SimStatus::Continue => 0,
            SimStatus::BasinTerminate => 1,
            SimStatus::SimTerminate => 2,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn packet(status: u32, doubles: &[f64]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(status).unwrap();
        for d in doubles {
            buf.write_f64::<LittleEndian>(*d).unwrap();
        }
        buf
    }

    #[test]
    fn test_decode() {
        let buf = packet(0, &[12.5, 0.05, 1.0, 270.0, 45.0, 315.0]);
        let data = SimSensData::decode(&buf, 6).unwrap();

        assert_eq!(data.status, SimStatus::Continue);
        assert_eq!(data.time_s, 12.5);
        assert_eq!(data.dt_s, 0.05);
        assert_eq!(data.channels, vec![270.0, 45.0, 315.0]);
        assert_eq!(data.channel(1), Ok(45.0));
        assert_eq!(data.channel(3), Err(SimCodecError::NoSuchChannel(3)));
    }

    #[test]
    fn test_decode_faults() {
        // Missing the last double
        let buf = packet(0, &[12.5, 0.05, 1.0, 270.0]);
        assert_eq!(
            SimSensData::decode(&buf[..buf.len() - 1], 4),
            Err(SimCodecError::ShortPacket { expected: 36, actual: 35 })
        );

        let buf = packet(7, &[0.0, 0.0, 0.0]);
        assert_eq!(SimSensData::decode(&buf, 3), Err(SimCodecError::UnknownStatus(7)));

        let buf = packet(0, &[0.0, 0.0, 0.0, f64::NAN]);
        assert_eq!(SimSensData::decode(&buf, 4), Err(SimCodecError::NonFinite(3)));
    }

    #[test]
    fn test_encode_dems() {
        let dems = SimDems::from_helm_dems(
            SimStatus::Continue,
            &HelmDems { rudder_angle_deg: 30.0, sheet_setting: 0.7 }
        );
        let buf = dems.encode();

        assert_eq!(buf.len(), DEMS_PACKET_LEN);

        let mut rdr = Cursor::new(&buf);
        assert_eq!(rdr.read_u32::<LittleEndian>().unwrap(), 0);
        assert_eq!(rdr.read_f64::<LittleEndian>().unwrap(), 0.7);
        assert!((rdr.read_f64::<LittleEndian>().unwrap() - 30f64.to_radians()).abs() < 1e-12);
        assert_eq!(rdr.read_f64::<LittleEndian>().unwrap(), 0.0);
    }
}
