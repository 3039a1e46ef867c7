//! # Procedure scheduler
//!
//! The scheduler decides which procedure to try next when a maneuver is requested. Each procedure
//! keeps a rolling history of how long it took, with failed attempts recorded as a penalty
//! duration, and at the start of each maneuver session the procedures are ranked by the mean of
//! their history. Procedures that have never been tried are occasionally pulled to the front of
//! the ranking so they get a chance to build a history.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::collections::VecDeque;
use log::{debug, error, info, warn};
use ordered_float::OrderedFloat;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

// Internal
use comms_if::tc::SailingMode;
use super::{ActiveProcedure, ProcedureKind};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Maximum number of durations kept in each procedure's history.
pub const HISTORY_CAPACITY: usize = 10;

/// Scale of the random weight given to an untested procedure picked for exploration.
pub const EXPLORE_WEIGHT_SCALE: f64 = 0.1;

/// Fraction of the timeout constant separating untested procedures, so that they keep their
/// configured order.
pub const INIT_RANK_WEIGHT_STEP: f64 = 0.01;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A configured procedure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcedureEntry {
    /// The procedure kind
    pub kind: ProcedureKind,

    /// Timeout for this procedure, if not given the scheduler's timeout constant is used.
    ///
    /// Units: seconds
    #[serde(default)]
    pub timeout_s: Option<f64>
}

/// Scheduler tuning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Timeout constant, used as the default procedure timeout and to derive the weights of
    /// untested and failed procedures.
    ///
    /// Units: seconds
    pub timeout_s: f64,

    /// Exploration coefficient, the chance of an untested procedure being moved to the front of
    /// the ranking is this value divided by the number of untested procedures.
    pub explore_coef: f64,

    /// The duration recorded for a failed attempt, as a multiple of the longest timeout of any
    /// configured procedure (and never less than the timeout constant).
    pub failure_penalty_factor: f64
}

/// Bounded FIFO of procedure durations, the oldest entry is evicted first.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DurationHistory {
    durations: VecDeque<f64>
}

/// Performance record of one procedure.
#[derive(Debug, Clone, Serialize)]
pub struct ProcedureRecord {
    pub kind: ProcedureKind,

    /// Timeout of this procedure
    ///
    /// Units: seconds
    pub timeout_s: f64,

    /// Recorded durations
    pub history: DurationHistory,

    /// Position of the procedure in the configured list
    pub init_rank: usize
}

/// Serialisable summary of a procedure's performance, saved whenever an outcome is recorded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcedureHistory {
    pub kind: ProcedureKind,
    pub init_rank: usize,
    pub durations_s: Vec<f64>,
    pub mean_s: Option<f64>
}

/// Ranks the procedures and tracks the one that is currently running.
pub struct ProcedureScheduler {
    /// Records in trial order for the current session
    records: Vec<ProcedureRecord>,

    /// Index of the current procedure in `records`
    cursor: usize,

    /// The running procedure
    active: Option<ActiveProcedure>,

    /// Index in `records` of the running procedure's record, outcomes are credited to this
    /// record even when the same kind is configured more than once
    active_index: usize,

    /// Duration recorded for a failed attempt
    ///
    /// Units: seconds
    failure_penalty_s: f64,

    config: SchedulerConfig,

    rng: StdRng,

    /// If true outcomes are not added to the histories
    remote_control: bool,

    /// Number of failed attempts in the current session
    failures_in_session: usize
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Noteworthy changes of scheduler state, reported through telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// A procedure has been started.
    Started {
        kind: ProcedureKind,
        mode: SailingMode
    },

    /// The running procedure completed.
    Succeeded {
        kind: ProcedureKind,
        duration_s: f64,
        recorded: bool
    },

    /// The running procedure timed out.
    Failed {
        kind: ProcedureKind,
        elapsed_s: f64,
        recorded: bool
    },

    /// The running procedure was dropped because the requested mode changed.
    Discarded {
        kind: ProcedureKind
    },

    /// Every procedure has failed at least once in this session.
    Exhausted {
        failures: usize
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SchedulerError {
    #[error("At least one procedure must be configured")]
    NoProcedures,

    #[error("The timeout of {0} must be a positive number of seconds, found {1}")]
    InvalidTimeout(String, f64),

    #[error("The exploration coefficient must be in [0, 1], found {0}")]
    InvalidExploreCoef(f64),

    #[error("The failure penalty factor must be greater than 1, found {0}")]
    InvalidPenaltyFactor(f64)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            timeout_s: 30.0,
            explore_coef: 0.1,
            failure_penalty_factor: 1.5
        }
    }
}

impl DurationHistory {
    /// Add a duration, evicting the oldest one if the history is full.
    pub fn push(&mut self, duration_s: f64) {
        if self.durations.len() == HISTORY_CAPACITY {
            self.durations.pop_front();
        }
        self.durations.push_back(duration_s);
    }

    /// Mean of the recorded durations, `None` if no durations have been recorded.
    pub fn mean(&self) -> Option<f64> {
        if self.durations.is_empty() {
            None
        }
        else {
            Some(self.durations.iter().sum::<f64>() / self.durations.len() as f64)
        }
    }

    pub fn len(&self) -> usize {
        self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    /// Iterate over the durations, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.durations.iter()
    }
}

impl Default for ProcedureScheduler {
    /// A scheduler over every procedure kind with the default configuration and an entropy
    /// seeded random number generator.
    fn default() -> Self {
        let config = SchedulerConfig::default();

        Self {
            records: ProcedureKind::ALL
                .iter()
                .enumerate()
                .map(|(init_rank, &kind)| ProcedureRecord {
                    kind,
                    timeout_s: config.timeout_s,
                    history: DurationHistory::default(),
                    init_rank
                })
                .collect(),
            cursor: 0,
            active: None,
            active_index: 0,
            failure_penalty_s: config.failure_penalty_factor * config.timeout_s,
            config,
            rng: StdRng::from_entropy(),
            remote_control: false,
            failures_in_session: 0
        }
    }
}

impl ProcedureScheduler {
    /// Create a new scheduler for the given procedures. The order of the procedures gives their
    /// initial rank.
    pub fn new(
        entries: &[ProcedureEntry],
        config: SchedulerConfig,
        rng: StdRng
    ) -> Result<Self, SchedulerError> {
        if entries.is_empty() {
            return Err(SchedulerError::NoProcedures)
        }
        if !(config.timeout_s.is_finite() && config.timeout_s > 0.0) {
            return Err(SchedulerError::InvalidTimeout(
                String::from("the scheduler"), config.timeout_s
            ))
        }
        if !(config.explore_coef >= 0.0 && config.explore_coef <= 1.0) {
            return Err(SchedulerError::InvalidExploreCoef(config.explore_coef))
        }
        if !(config.failure_penalty_factor > 1.0 && config.failure_penalty_factor.is_finite()) {
            return Err(SchedulerError::InvalidPenaltyFactor(config.failure_penalty_factor))
        }

        let mut records = Vec::with_capacity(entries.len());

        for (init_rank, entry) in entries.iter().enumerate() {
            let timeout_s = entry.timeout_s.unwrap_or(config.timeout_s);

            if !(timeout_s.is_finite() && timeout_s > 0.0) {
                return Err(SchedulerError::InvalidTimeout(entry.kind.to_string(), timeout_s))
            }

            records.push(ProcedureRecord {
                kind: entry.kind,
                timeout_s,
                history: DurationHistory::default(),
                init_rank
            });
        }

        // Every success is shorter than its own timeout, so scaling the longest timeout keeps a
        // failure weighted behind any success
        let longest_timeout_s = records
            .iter()
            .map(|r| r.timeout_s)
            .fold(config.timeout_s, f64::max);

        Ok(Self {
            records,
            cursor: 0,
            active: None,
            active_index: 0,
            failure_penalty_s: config.failure_penalty_factor * longest_timeout_s,
            config,
            rng,
            remote_control: false,
            failures_in_session: 0
        })
    }

    /// Enable or disable remote control. Under remote control outcomes are not recorded.
    pub fn set_remote_control(&mut self, remote_control: bool) {
        if remote_control != self.remote_control {
            info!("Remote control {}", if remote_control { "enabled" } else { "disabled" });
        }
        self.remote_control = remote_control;
    }

    pub fn remote_control(&self) -> bool {
        self.remote_control
    }

    /// Rank the procedures by weight, lowest weight first.
    ///
    /// The weight of a tested procedure is the mean of its history. An untested procedure is
    /// picked for exploration with probability `explore_coef / num_untested` and given a small
    /// random weight, otherwise it is weighted just above the timeout constant in its configured
    /// order.
    ///
    /// # Panics
    /// - In debug builds, if a procedure is running, since its record would move under it.
    pub fn reorder_by_weight(&mut self) {
        debug_assert!(self.active.is_none(), "Procedures reordered while one is running");

        let num_untested = self.records
            .iter()
            .filter(|r| r.history.is_empty())
            .count();

        let timeout_s = self.config.timeout_s;
        let explore_chance = if num_untested > 0 {
            self.config.explore_coef / num_untested as f64
        }
        else {
            0.0
        };

        let mut weighted: Vec<(f64, ProcedureRecord)> = Vec::with_capacity(self.records.len());

        for record in self.records.drain(..) {
            let weight = match record.history.mean() {
                Some(m) => m,
                None => {
                    if self.rng.gen::<f64>() < explore_chance {
                        debug!("Exploring untested procedure {}", record.kind);
                        EXPLORE_WEIGHT_SCALE * self.rng.gen::<f64>()
                    }
                    else {
                        timeout_s
                            + record.init_rank as f64 * INIT_RANK_WEIGHT_STEP * timeout_s
                    }
                }
            };

            weighted.push((weight, record));
        }

        // Stable sort so equal weights keep their previous order
        weighted.sort_by_key(|(w, _)| OrderedFloat(*w));

        debug!(
            "Procedure ranking: {}",
            weighted
                .iter()
                .map(|(w, r)| format!("{} ({:.2})", r.kind, w))
                .collect::<Vec<_>>()
                .join(", ")
        );

        self.records = weighted.into_iter().map(|(_, r)| r).collect();
    }

    /// Start a new maneuver session, ranking the procedures and moving to the best one.
    pub fn start_session(&mut self) {
        self.reorder_by_weight();
        self.cursor = 0;
        self.failures_in_session = 0;
    }

    /// Move on to the next procedure in the ranking, wrapping back to the first.
    pub fn advance(&mut self) {
        self.cursor = (self.cursor + 1) % self.records.len();
    }

    /// Start the procedure under the cursor.
    ///
    /// # Panics
    /// - In debug builds, if a procedure is already running. There is only ever one active
    ///   procedure, the previous one must be marked or discarded first.
    pub fn start_procedure(&mut self, mode: SailingMode, now_s: f64) -> SessionEvent {
        debug_assert!(self.active.is_none(), "Two procedures active at once");

        let record = &self.records[self.cursor];
        let procedure = ActiveProcedure::new(record.kind, record.timeout_s, mode, now_s);

        info!("Start {}", procedure);

        self.active = Some(procedure);
        self.active_index = self.cursor;

        SessionEvent::Started {
            kind: record.kind,
            mode
        }
    }

    /// Record the running procedure as a success, taking its elapsed time as its duration.
    ///
    /// Returns `None` if no procedure is running.
    pub fn mark_success(&mut self, now_s: f64) -> Option<SessionEvent> {
        let procedure = self.active.take()?;
        let duration_s = procedure.elapsed_s(now_s);

        info!("Procedure success {} in {:.2} s", procedure, duration_s);

        let recorded = self.record(self.active_index, duration_s);

        Some(SessionEvent::Succeeded {
            kind: procedure.kind,
            duration_s,
            recorded
        })
    }

    /// Record the running procedure as a failure, adding the penalty duration to its history.
    ///
    /// The caller is expected to `advance` and start the next procedure. Returns the failure
    /// event, followed by an exhausted event if every procedure has now failed in this session.
    pub fn mark_failure(&mut self, now_s: f64) -> Vec<SessionEvent> {
        let procedure = match self.active.take() {
            Some(p) => p,
            None => return vec![]
        };

        let elapsed_s = procedure.elapsed_s(now_s);

        warn!("Procedure failed {} after {:.2} s", procedure, elapsed_s);

        let recorded = self.record(self.active_index, self.failure_penalty_s);
        self.failures_in_session += 1;

        let mut events = vec![SessionEvent::Failed {
            kind: procedure.kind,
            elapsed_s,
            recorded
        }];

        if self.failures_in_session == self.records.len() {
            error!(
                "All {} procedures have failed in this session, continuing to cycle",
                self.records.len()
            );
            events.push(SessionEvent::Exhausted {
                failures: self.failures_in_session
            });
        }

        events
    }

    /// Drop the running procedure without recording an outcome.
    pub fn discard(&mut self) -> Option<SessionEvent> {
        let procedure = self.active.take()?;

        info!("Discarding {}, requested mode has changed", procedure);

        Some(SessionEvent::Discarded {
            kind: procedure.kind
        })
    }

    /// The running procedure, if any.
    pub fn active(&self) -> Option<&ActiveProcedure> {
        self.active.as_ref()
    }

    pub fn is_in_progress(&self) -> bool {
        self.active.is_some()
    }

    /// Returns true if every procedure has failed at least once in the current session (counting
    /// repeat failures).
    pub fn is_exhausted(&self) -> bool {
        self.failures_in_session >= self.records.len()
    }

    /// The duration recorded for a failed attempt.
    pub fn failure_penalty_s(&self) -> f64 {
        self.failure_penalty_s
    }

    /// The records in their current ranking.
    pub fn records(&self) -> &[ProcedureRecord] {
        &self.records
    }

    /// The kind under the cursor.
    pub fn current_kind(&self) -> ProcedureKind {
        self.records[self.cursor].kind
    }

    /// Summaries of every procedure's history, in configured order.
    pub fn history_summary(&self) -> Vec<ProcedureHistory> {
        let mut summary: Vec<ProcedureHistory> = self.records
            .iter()
            .map(|r| ProcedureHistory {
                kind: r.kind,
                init_rank: r.init_rank,
                durations_s: r.history.iter().copied().collect(),
                mean_s: r.history.mean()
            })
            .collect();

        summary.sort_by_key(|h| h.init_rank);

        summary
    }

    /// Add a duration to the history of the record at `index` unless under remote control.
    /// Returns true if the duration was recorded.
    fn record(&mut self, index: usize, duration_s: f64) -> bool {
        if self.remote_control {
            return false
        }

        match self.records.get_mut(index) {
            Some(r) => {
                r.history.push(duration_s);
                true
            },
            None => false
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
