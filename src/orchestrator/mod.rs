//! The orchestration core.
//!
//! `Orchestrator` runs one tick at a time on a background task and exposes
//! the start/stop/panic control surface. `state` holds the run flags and the
//! per-tick report types. `control` parses operator command lines.

mod control;
mod engine;
mod state;

pub use control::ControlCommand;
pub use engine::Orchestrator;
pub use state::{
    EntryOutcome, EntryReport, RunPhase, RunState, RunStatus, TickReport, SKIP_EARLY_SESSION,
};
