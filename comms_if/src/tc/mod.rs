//! # Telecommand module
//!
//! This module provides the commands sent to the helming executable by the higher-level planner
//! (waypoint and task sequencing). The planner decides *what* the boat should do - hold a heading
//! or change tack - and the helm decides *how*.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::fmt::{self, Display};
use std::str::FromStr;
use serde::{Serialize, Deserialize};
use serde_json::{self, Value};
use thiserror::Error;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A telecommand, i.e. an instruction sent to the helm by the planner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Tc {
    /// Set the sailing mode the helm shall execute.
    SetSailingMode(SailingMode),

    /// Set the heading to hold during normal sailing.
    ///
    /// Units: degrees
    SetGoalHeading(f64),

    /// Enable or disable remote control. Under remote control procedure outcomes are not recorded
    /// in the performance history.
    SetRemoteControl(bool),

    /// Stop the helming executable.
    Stop,
}

/// The sailing mode requested by the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SailingMode {
    /// Sail towards the goal heading.
    Normal,

    /// Change onto port tack (wind from the left-hand side).
    SwitchToPortTack,

    /// Change onto starboard tack (wind from the right-hand side).
    SwitchToStarboardTack,
}

/// Response sent back to the planner for each received TC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TcResponse {
    /// The TC was accepted.
    Ok,

    /// The TC could not be parsed.
    Invalid,
}

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum TcParseError {
    #[error("TC contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("TC has an invalid type ({0})")]
    InvalidType(String),

    #[error("TC of type {0} is expected to have a payload but it doesn't")]
    MissingPayload(String),

    #[error("TC of type {0} has an invalid payload: {1}")]
    InvalidPayload(String, String),

    #[error("Unrecognised sailing mode \"{0}\"")]
    InvalidMode(String),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Tc {

    /// Parse a new TC from a JSON packet.
    ///
    /// Packets take the form `{"type": "MODE", "payload": "switch_to_port_tack"}`. The payload is
    /// omitted for types which don't need one.
    pub fn from_json(json_str: &str) -> Result<Self, TcParseError> {
        // Parse the JSON string into a value
        let val: Value = match serde_json::from_str(json_str) {
            Ok(v) => v,
            Err(e) => return Err(TcParseError::InvalidJson(e))
        };

        // Get the type of the TC
        let tc_type = match val["type"].as_str() {
            Some(s) => s,
            None => return Err(TcParseError::InvalidType(String::from(
                "Expected \"type\" to be a string"
            )))
        };

        let payload = &val["payload"];

        match tc_type {
            "STOP" => Ok(Tc::Stop),
            "MODE" => {
                let mode_str = match payload.as_str() {
                    Some(s) => s,
                    None => return Err(TcParseError::MissingPayload(tc_type.into()))
                };

                Ok(Tc::SetSailingMode(mode_str.parse()?))
            },
            "HEADING" => match payload.as_f64() {
                Some(h) if h.is_finite() => Ok(Tc::SetGoalHeading(h)),
                Some(h) => Err(TcParseError::InvalidPayload(
                    tc_type.into(), format!("{} is not a finite heading", h)
                )),
                None => Err(TcParseError::MissingPayload(tc_type.into()))
            },
            "REMOTE" => match payload.as_bool() {
                Some(b) => Ok(Tc::SetRemoteControl(b)),
                None => Err(TcParseError::MissingPayload(tc_type.into()))
            },
            t => Err(TcParseError::InvalidType(
                format!("{} is not a recognised TC type", t)
            ))
        }
    }
}

impl SailingMode {
    /// Returns true if the mode requests a change of tack.
    pub fn is_switching(&self) -> bool {
        !matches!(self, SailingMode::Normal)
    }
}

impl Default for SailingMode {
    fn default() -> Self {
        SailingMode::Normal
    }
}

impl FromStr for SailingMode {
    type Err = TcParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(SailingMode::Normal),
            "switch_to_port_tack" => Ok(SailingMode::SwitchToPortTack),
            "switch_to_stbd_tack" => Ok(SailingMode::SwitchToStarboardTack),
            _ => Err(TcParseError::InvalidMode(s.into()))
        }
    }
}

impl Display for SailingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SailingMode::Normal => write!(f, "normal"),
            SailingMode::SwitchToPortTack => write!(f, "switch_to_port_tack"),
            SailingMode::SwitchToStarboardTack => write!(f, "switch_to_stbd_tack"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_response_json() {
        assert_eq!(serde_json::to_string(&TcResponse::Ok).unwrap(), "\"Ok\"");
        assert_eq!(
            serde_json::from_str::<TcResponse>("\"Invalid\"").unwrap(),
            TcResponse::Invalid
        );
    }

    #[test]
    fn test_parse_mode_tc() {
        let tc = Tc::from_json(r#"{"type": "MODE", "payload": "switch_to_stbd_tack"}"#).unwrap();
        assert_eq!(tc, Tc::SetSailingMode(SailingMode::SwitchToStarboardTack));

        let tc = Tc::from_json(r#"{"type": "MODE", "payload": "normal"}"#).unwrap();
        assert_eq!(tc, Tc::SetSailingMode(SailingMode::Normal));
    }

    #[test]
    fn test_parse_invalid_mode() {
        match Tc::from_json(r#"{"type": "MODE", "payload": "heave_to"}"#) {
            Err(TcParseError::InvalidMode(m)) => assert_eq!(m, "heave_to"),
            _ => panic!("Expected an invalid mode error")
        }
    }

    #[test]
    fn test_parse_other_tcs() {
        assert_eq!(
            Tc::from_json(r#"{"type": "HEADING", "payload": 45.0}"#).unwrap(),
            Tc::SetGoalHeading(45.0)
        );
        assert_eq!(
            Tc::from_json(r#"{"type": "REMOTE", "payload": true}"#).unwrap(),
            Tc::SetRemoteControl(true)
        );
        assert_eq!(Tc::from_json(r#"{"type": "STOP"}"#).unwrap(), Tc::Stop);

        assert!(matches!(
            Tc::from_json(r#"{"type": "HEADING"}"#),
            Err(TcParseError::MissingPayload(_))
        ));
        assert!(matches!(
            Tc::from_json(r#"{"type": "JIBE"}"#),
            Err(TcParseError::InvalidType(_))
        ));
        assert!(matches!(Tc::from_json("not json"), Err(TcParseError::InvalidJson(_))));
    }

    #[test]
    fn test_mode_display_round_trip() {
        for mode in &[
            SailingMode::Normal,
            SailingMode::SwitchToPortTack,
            SailingMode::SwitchToStarboardTack
        ] {
            assert_eq!(mode.to_string().parse::<SailingMode>().unwrap(), *mode);
        }
    }
}
