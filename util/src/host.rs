//! Host platform (linux for example) utility functions

use std::env;
use std::path::PathBuf;
use uname;

/// Environment variable pointing at the root of the software checkout. Parameter files are found
/// in `$HELM_SW_ROOT/params` and sessions are written to `$HELM_SW_ROOT/sessions`.
pub const SW_ROOT_ENV_VAR: &str = "HELM_SW_ROOT";

/// Retrieve uname information.
pub fn get_uname() -> std::io::Result<uname::Info> {
    uname::uname()
}

/// Get the software root directory from the environment.
pub fn get_sw_root() -> Result<PathBuf, env::VarError> {
    env::var(SW_ROOT_ENV_VAR).map(PathBuf::from)
}
