//! Run-state and per-tick reporting types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::strategy::OrderIntent;

/// Status message recorded for a tick skipped inside the post-open exclusion.
pub const SKIP_EARLY_SESSION: &str = "Skipping early session";

/// Coarse run-control state derived from the `running` and `panic` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Stopped,
    Running,
    /// Sticky; only a process restart clears it
    Panicked,
}

/// Process-wide orchestrator state, mutated by the loop and the control surface.
#[derive(Debug, Clone)]
pub struct RunState {
    pub running: bool,
    pub panic: bool,
    pub interval: Duration,
    pub paper: bool,
    pub last_tick: Option<DateTime<Utc>>,
    pub last_message: String,
    pub last_error: Option<String>,
    /// Symbol -> cooldown-until. Entries are overwritten, never removed.
    pub cooldowns: HashMap<String, DateTime<Utc>>,
}

impl RunState {
    pub fn new(interval_sec: u64, paper: bool) -> Self {
        Self {
            running: false,
            panic: false,
            interval: Duration::from_secs(interval_sec),
            paper,
            last_tick: None,
            last_message: "Idle".to_string(),
            last_error: None,
            cooldowns: HashMap::new(),
        }
    }

    pub fn phase(&self) -> RunPhase {
        if self.panic {
            RunPhase::Panicked
        } else if self.running {
            RunPhase::Running
        } else {
            RunPhase::Stopped
        }
    }

    pub fn status(&self) -> RunStatus {
        RunStatus {
            phase: self.phase(),
            running: self.running,
            panic: self.panic,
            paper: self.paper,
            interval_sec: self.interval.as_secs(),
            last_tick: self.last_tick,
            last_message: self.last_message.clone(),
            last_error: self.last_error.clone(),
        }
    }
}

/// Snapshot returned by `Orchestrator::status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStatus {
    pub phase: RunPhase,
    pub running: bool,
    pub panic: bool,
    pub paper: bool,
    pub interval_sec: u64,
    pub last_tick: Option<DateTime<Utc>>,
    pub last_message: String,
    pub last_error: Option<String>,
}

/// What happened to one admitted signal.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome {
    /// Both legs accepted by the venue
    Submitted(OrderIntent),
    /// Logged only; the strategy is in shadow mode
    Shadowed(OrderIntent),
    /// Account drawdown at or past the daily limit
    DrawdownBlocked,
    /// No recent bar to price the entry
    NoPrice,
    Failed {
        reason: String,
        /// Legs the venue accepted before the failure
        legs_submitted: usize,
    },
    /// Panic latched while the entry was in flight; nothing further was sent
    Halted { legs_submitted: usize },
}

impl EntryOutcome {
    /// Whether the venue now holds (part of) a position for the symbol.
    pub fn opened_position(&self) -> bool {
        match self {
            EntryOutcome::Submitted(_) => true,
            EntryOutcome::Failed { legs_submitted, .. }
            | EntryOutcome::Halted { legs_submitted } => *legs_submitted > 0,
            _ => false,
        }
    }
}

/// One entry attempt within a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryReport {
    pub strategy: String,
    pub symbol: String,
    pub outcome: EntryOutcome,
}

/// Summary of a single tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// "ok", or the reason the tick did no work
    pub message: String,
    pub skipped: bool,
    /// Distinct (symbol, timeframe) pairs requested this tick
    pub fetched_pairs: usize,
    pub watchlist: Vec<String>,
    pub entries: Vec<EntryReport>,
    /// Per-operation failures that degraded the tick
    pub errors: Vec<String>,
}

impl TickReport {
    pub fn skipped(message: &str) -> Self {
        Self {
            message: message.to_string(),
            skipped: true,
            ..Default::default()
        }
    }

    /// Message for a tick cut short by a panic.
    pub fn halt(&mut self) {
        self.message = "halted: panic".to_string();
    }

    /// Set the status message from the collected errors.
    pub fn finish(&mut self) {
        self.message = match self.errors.len() {
            0 => "ok".to_string(),
            n => format!("degraded: {} operation(s) failed", n),
        };
    }
}
