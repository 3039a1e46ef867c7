//! # Logger
//!
//! Records are written to the terminal and to the session log file. Helm control logs every
//! cycle at trace level, which would drown both at the loop rate, so records from the per-cycle
//! targets are held to `INFO` there and written in full to a separate cycle log in the session
//! directory.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use std::fmt;
use log::{self, info, Level, Metadata, Record};
use fern::{self, FormatCallback};
use colored::{ColoredString, Colorize};
use thiserror::Error;

// Internal imports
use crate::session::{self, Session};

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Log targets which emit records every cycle, including their submodules.
pub const CYCLE_TARGETS: &[&str] = &["helm_lib::helm_ctrl", "helm_lib::cycle"];

/// Name of the per-cycle log file inside the session directory.
pub const CYCLE_LOG_FILE_NAME: &str = "cycle.log";

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("Expected a log level of at least `INFO`, found `{0}`")]
    InvalidMinLogLevel(log::LevelFilter),

    #[error("Error initialising the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("An error occured while setting up the logger: {0}")]
    FernInitError(log::SetLoggerError)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution.
///
/// `min_level` applies to the terminal and the session log, and must be at least `INFO` so that
/// maneuver outcomes always make it into the log file. The cycle log always records everything
/// from the [`CYCLE_TARGETS`].
///
/// Must only be called once per process.
pub fn logger_init(
    min_level: LevelFilter,
    session: &Session
) -> Result<(), LoggerInitError> {

    if min_level < Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(min_level))
    }

    let cycle_log_path = session.session_root.join(CYCLE_LOG_FILE_NAME);

    let log_file = fern::log_file(&session.log_file_path)
        .map_err(LoggerInitError::LogFileInitError)?;
    let cycle_log_file = fern::log_file(&cycle_log_path)
        .map_err(LoggerInitError::LogFileInitError)?;

    let terminal = fern::Dispatch::new()
        .format(format_coloured)
        .level(min_level)
        .filter(cap_cycle_targets)
        .chain(std::io::stdout());

    let session_log = fern::Dispatch::new()
        .format(format_plain)
        .level(min_level)
        .filter(cap_cycle_targets)
        .chain(log_file);

    let cycle_log = fern::Dispatch::new()
        .format(format_plain)
        .level(LevelFilter::Trace)
        .filter(|m| is_cycle_target(m.target()))
        .chain(cycle_log_file);

    fern::Dispatch::new()
        .level(LevelFilter::Trace)
        // Per-event socket monitor output
        .level_for("comms_if::net", LevelFilter::Debug)
        .chain(terminal)
        .chain(session_log)
        .chain(cycle_log)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised");
    info!("    Session epoch: {}", session::get_epoch());
    info!("    Log level: {:?}", min_level);
    info!("    Log file path: {:?}", session.log_file_path);
    info!("    Cycle log file path: {:?}", cycle_log_path);

    Ok(())
}

/// Returns true if `target` is one of the [`CYCLE_TARGETS`] or a submodule of one.
pub fn is_cycle_target(target: &str) -> bool {
    CYCLE_TARGETS.iter().any(|t| {
        target.starts_with(t) && {
            let rest = &target[t.len()..];
            rest.is_empty() || rest.starts_with("::")
        }
    })
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Let through cycle target records only at `INFO` and above.
fn cap_cycle_targets(metadata: &Metadata) -> bool {
    metadata.level() <= Level::Info || !is_cycle_target(metadata.target())
}

fn format_coloured(out: FormatCallback, message: &fmt::Arguments, record: &Record) {
    write_record(out, coloured_level_tag(record.level()), message, record)
}

fn format_plain(out: FormatCallback, message: &fmt::Arguments, record: &Record) {
    write_record(out, level_tag(record.level()), message, record)
}

/// Debug and trace records include their target.
fn write_record<T: fmt::Display>(
    out: FormatCallback,
    tag: T,
    message: &fmt::Arguments,
    record: &Record
) {
    if record.level() > Level::Info {
        out.finish(format_args!(
            "[{:10.6} {}] {}: {}",
            session::get_elapsed_seconds(),
            tag,
            record.target(),
            message
        ))
    }
    else {
        out.finish(format_args!(
            "[{:10.6} {}] {}",
            session::get_elapsed_seconds(),
            tag,
            message
        ))
    }
}

fn level_tag(level: Level) -> &'static str {
    match level {
        Level::Trace => "TRC",
        Level::Debug => "DBG",
        Level::Info  => "INF",
        Level::Warn  => "WRN",
        Level::Error => "ERR"
    }
}

fn coloured_level_tag(level: Level) -> ColoredString {
    let tag = level_tag(level);

    match level {
        Level::Trace => tag.dimmed().italic(),
        Level::Debug => tag.dimmed(),
        Level::Info  => tag.normal(),
        Level::Warn  => tag.yellow(),
        Level::Error => tag.red().bold()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_cycle_targets() {
        assert!(is_cycle_target("helm_lib::helm_ctrl"));
        assert!(is_cycle_target("helm_lib::helm_ctrl::scheduler"));
        assert!(is_cycle_target("helm_lib::cycle"));

        assert!(!is_cycle_target("helm_lib::helm_ctrl_extra"));
        assert!(!is_cycle_target("helm_lib::tc_client"));
        assert!(!is_cycle_target("helm_exec"));
    }

    fn meta(level: Level, target: &str) -> Metadata {
        Metadata::builder().level(level).target(target).build()
    }

    #[test]
    fn test_cycle_targets_capped_at_info() {
        assert!(!cap_cycle_targets(&meta(Level::Trace, "helm_lib::helm_ctrl::state")));
        assert!(!cap_cycle_targets(&meta(Level::Debug, "helm_lib::cycle")));
        assert!(cap_cycle_targets(&meta(Level::Info, "helm_lib::helm_ctrl::scheduler")));
        assert!(cap_cycle_targets(&meta(Level::Warn, "helm_lib::helm_ctrl::scheduler")));

        // Other targets are left to the level filter
        assert!(cap_cycle_targets(&meta(Level::Trace, "helm_exec")));
    }

    #[test]
    fn test_level_tags() {
        let tags: Vec<&str> = [Level::Error, Level::Warn, Level::Info, Level::Debug, Level::Trace]
            .iter()
            .map(|&l| level_tag(l))
            .collect();

        assert_eq!(tags, vec!["ERR", "WRN", "INF", "DBG", "TRC"]);
    }
}
