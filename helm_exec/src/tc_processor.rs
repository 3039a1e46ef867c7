//! # Telecommand processor
//!
//! Applies planner telecommands to the data store. Commands are only ever applied between cycles,
//! so a change never takes effect half way through helm control processing.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{info, warn};

use comms_if::tc::Tc;

use crate::data_store::DataStore;

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Execute the given TC
pub fn exec(ds: &mut DataStore, tc: &Tc) {
    match tc {
        Tc::SetSailingMode(mode) => {
            if *mode != ds.sailing_mode {
                info!("Sailing mode changed from {} to {}", ds.sailing_mode, mode);
            }
            ds.sailing_mode = *mode;
        },
        Tc::SetGoalHeading(heading_deg) => {
            if heading_deg.is_finite() {
                ds.goal_heading_deg = *heading_deg;
            }
            else {
                warn!("Ignoring non-finite goal heading {}", heading_deg);
            }
        },
        Tc::SetRemoteControl(rc) => {
            ds.remote_control_request = Some(*rc);
        },
        Tc::Stop => {
            info!("Stop TC recieved");
            ds.stop_requested = true;
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::tc::SailingMode;

    #[test]
    fn test_exec() {
        let mut ds = DataStore::default();

        exec(&mut ds, &Tc::SetSailingMode(SailingMode::SwitchToStarboardTack));
        exec(&mut ds, &Tc::SetGoalHeading(135.0));
        exec(&mut ds, &Tc::SetGoalHeading(f64::INFINITY));
        exec(&mut ds, &Tc::SetRemoteControl(true));

        assert_eq!(ds.sailing_mode, SailingMode::SwitchToStarboardTack);
        assert_eq!(ds.goal_heading_deg, 135.0);
        assert_eq!(ds.remote_control_request, Some(true));
        assert!(!ds.stop_requested);

        exec(&mut ds, &Tc::Stop);
        assert!(ds.stop_requested);
    }
}
