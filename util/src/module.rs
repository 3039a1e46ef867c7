//! # Module interfaces
//!
//! Cyclic modules of the helming executable implement [`State`]. They are initialised once from a
//! parameter file and then processed every cycle. The executable keeps each module's latest
//! output and status report in its data store, and [`proc_or_hold`] runs a cycle without losing
//! them if processing fails.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use crate::session::Session;

// ---------------------------------------------------------------------------
// MODULE STATE
// ---------------------------------------------------------------------------

/// A cyclic module.
pub trait State {
    /// Data required during initialisation, usually a parameter file name plus overrides
    type InitData;
    type InitError;

    type InputData;

    /// Data produced every cycle, such as actuator demands
    type OutputData;

    /// Diagnostic report of a cycle, sent in telemetry
    type StatusReport;

    type ProcError;

    /// Initialise the module, setting up any archives and saved data in the session.
    fn init(&mut self, init_data: Self::InitData, session: &Session)
        -> Result<(), Self::InitError>;

    /// Process one cycle.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>;
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Process one cycle of `module`, storing its output and status report on success.
///
/// On error `output` and `report` are left as they were, so the previous cycle's demands and
/// status stay in force, and the error is returned.
pub fn proc_or_hold<S: State>(
    module: &mut S,
    input_data: &S::InputData,
    output: &mut S::OutputData,
    report: &mut S::StatusReport
) -> Result<(), S::ProcError> {
    let (o, r) = module.proc(input_data)?;

    *output = o;
    *report = r;

    Ok(())
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    /// Doubles its input, refusing negative inputs.
    #[derive(Default)]
    struct Doubler {
        num_cycles: usize
    }

    impl State for Doubler {
        type InitData = ();
        type InitError = ();
        type InputData = f64;
        type OutputData = f64;
        type StatusReport = usize;
        type ProcError = String;

        fn init(&mut self, _: (), _: &Session) -> Result<(), ()> {
            Ok(())
        }

        fn proc(&mut self, input: &f64) -> Result<(f64, usize), String> {
            if *input < 0.0 {
                return Err(format!("negative input {}", input))
            }

            self.num_cycles += 1;
            Ok((input * 2.0, self.num_cycles))
        }
    }

    #[test]
    fn test_failed_cycle_holds_previous() {
        let mut module = Doubler::default();
        let mut output = 0.0;
        let mut report = 0;

        proc_or_hold(&mut module, &1.5, &mut output, &mut report).unwrap();
        assert_eq!((output, report), (3.0, 1));

        let result = proc_or_hold(&mut module, &-1.0, &mut output, &mut report);
        assert_eq!(result, Err(String::from("negative input -1")));
        assert_eq!((output, report), (3.0, 1));

        proc_or_hold(&mut module, &2.0, &mut output, &mut report).unwrap();
        assert_eq!((output, report), (4.0, 2));
    }
}
