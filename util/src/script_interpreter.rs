//! # Planner script interpreter module
//!
//! This module provides an interpreter for planner scripts, allowing
//! telecommands to be replayed at fixed times instead of arriving over the
//! network. A script is a sequence of `<time_s>: <json tc>;` entries, for
//! example:
//!
//! ```text
//! 0.0: {"type": "HEADING", "payload": 90.0};
//! 5.0: {"type": "MODE", "payload": "switch_to_port_tack"};
//! ```

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::fs;
use regex::RegexBuilder;
use thiserror::Error;

// Internal
use comms_if::tc::{Tc, TcParseError};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A command which is scripted to occur at a specific time.
#[derive(Debug, Clone, Copy)]
pub struct Command {
    /// The time the command is supposed to execute at
    exec_time_s: f64,

    /// The Telecommand to run
    tc: Tc
}

/// A script interpreter.
///
/// After initialising with the path to the script to run use
/// `.get_pending_tcs` to acquire a list of telecommands that need executing.
pub struct ScriptInterpreter {
    script_path: Option<PathBuf>,
    cmds: VecDeque<Command>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Could not find the script at {0}")]
    ScriptNotFound(String),

    #[error("Could not load the script: {0}")]
    ScriptLoadError(std::io::Error),

    #[error("Could not build the script pattern: {0}")]
    PatternError(regex::Error),

    #[error("The script is empty (or is so bad it can't be read)")]
    ScriptEmpty,

    #[error(
        "Script contains an invalid timestamp: {0}. \
        Should be a float (like 1.0)")]
    InvalidTimestamp(String),

    #[error("Script contains an invalid TC at {0} s: {1}")]
    InvalidTc(f64, TcParseError)
}

#[derive(Debug, PartialEq)]
pub enum PendingTcs {
    None,
    Some(Vec<Tc>),
    EndOfScript
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ScriptInterpreter {

    /// Create a new interpreter from the given script path.
    pub fn new<P: AsRef<Path>>(script_path: P) -> Result<Self, ScriptError> {

        // Get the path in a buffer
        let path = PathBuf::from(script_path.as_ref());

        // Check that the script file exists.
        if !path.exists() {
            return Err(
                ScriptError::ScriptNotFound(path.display().to_string()));
        }

        // Load the script into a string
        let script = fs::read_to_string(&path)
            .map_err(ScriptError::ScriptLoadError)?;

        let mut interp = Self::from_script(&script)?;
        interp.script_path = Some(path);

        Ok(interp)
    }

    /// Create a new interpreter from the contents of a script.
    pub fn from_script(script: &str) -> Result<Self, ScriptError> {
        // Empty queue of commands
        let mut tc_queue: VecDeque<Command> = VecDeque::new();

        // Go through the script executing __the magic regex__.
        let re = RegexBuilder::
            new(r"^\s*(\d+(\.\d+)?)\s*:\s*([^;]*);")
            .multi_line(true)
            .build()
            .map_err(ScriptError::PatternError)?;

        for cap in re.captures_iter(script) {
            let (time_str, tc_str) = match (cap.get(1), cap.get(3)) {
                (Some(t), Some(c)) => (t.as_str(), c.as_str()),
                _ => continue
            };

            // Parse the exec time
            let exec_time_s: f64 = time_str.parse()
                .map_err(|e| ScriptError::InvalidTimestamp(format!("{}", e)))?;

            // Parse the TC from the payload. The scripts contain JSON only.
            let tc = Tc::from_json(tc_str)
                .map_err(|e| ScriptError::InvalidTc(exec_time_s, e))?;

            // Build command from the match
            tc_queue.push_back(Command {
                exec_time_s,
                tc
            });
        }

        if tc_queue.is_empty() {
            return Err(ScriptError::ScriptEmpty)
        }

        Ok(ScriptInterpreter {
            script_path: None,
            cmds: tc_queue
        })
    }

    /// Return the TCs whose execution time is at or before `current_time_s`.
    pub fn get_pending_tcs(&mut self, current_time_s: f64) -> PendingTcs {

        // If the queue is empty the script is over and we return the end of
        // script variant
        if self.cmds.is_empty() {
            return PendingTcs::EndOfScript
        }

        let mut tc_vec: Vec<Tc> = vec![];

        // Pop items from the queue while the head's exec time has been
        // reached.
        while let Some(cmd) = self.cmds.front() {
            if cmd.exec_time_s > current_time_s {
                break
            }
            tc_vec.push(cmd.tc);
            self.cmds.pop_front();
        }

        // If the vector is longer than 0 return Some, otherwise None
        if !tc_vec.is_empty() {
            PendingTcs::Some(tc_vec)
        }
        else {
            PendingTcs::None
        }
    }

    /// Get the path of the script, if it was loaded from a file
    pub fn script_path(&self) -> Option<&Path> {
        self.script_path.as_deref()
    }

    /// Get the number of TCs in the script
    pub fn get_num_tcs(&self) -> usize {
        self.cmds.len()
    }

    /// Get the length of the script in seconds
    pub fn get_duration(&self) -> f64 {
        match self.cmds.back() {
            Some(c) => c.exec_time_s,
            None => 0f64
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::tc::SailingMode;

    const SCRIPT: &str = r#"
        0.0: {"type": "HEADING", "payload": 90.0};
        0.5: {"type": "REMOTE", "payload": false};
        2.0: {"type": "MODE", "payload": "switch_to_port_tack"};
        10.0: {"type": "STOP"};
    "#;

    #[test]
    fn test_script_parse() {
        let interp = ScriptInterpreter::from_script(SCRIPT).unwrap();
        assert_eq!(interp.get_num_tcs(), 4);
        assert_eq!(interp.get_duration(), 10.0);
        assert!(interp.script_path().is_none());
    }

    #[test]
    fn test_pending_tcs() {
        let mut interp = ScriptInterpreter::from_script(SCRIPT).unwrap();

        assert_eq!(
            interp.get_pending_tcs(0.0),
            PendingTcs::Some(vec![Tc::SetGoalHeading(90.0)])
        );
        assert_eq!(interp.get_pending_tcs(0.1), PendingTcs::None);
        assert_eq!(
            interp.get_pending_tcs(3.0),
            PendingTcs::Some(vec![
                Tc::SetRemoteControl(false),
                Tc::SetSailingMode(SailingMode::SwitchToPortTack)
            ])
        );
        assert_eq!(
            interp.get_pending_tcs(10.0),
            PendingTcs::Some(vec![Tc::Stop])
        );
        assert_eq!(interp.get_pending_tcs(11.0), PendingTcs::EndOfScript);
    }

    #[test]
    fn test_empty_script() {
        match ScriptInterpreter::from_script("# nothing here\n") {
            Err(ScriptError::ScriptEmpty) => (),
            _ => panic!("Expected ScriptEmpty")
        }
    }

    #[test]
    fn test_invalid_tc() {
        match ScriptInterpreter::from_script(r#"1.0: {"type": "JUMP"};"#) {
            Err(ScriptError::InvalidTc(t, _)) => assert_eq!(t, 1.0),
            _ => panic!("Expected InvalidTc")
        }
    }
}
