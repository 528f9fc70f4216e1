//! Risk management for the orchestrator.
//!
//! - Daily drawdown latch
//! - Sector exposure caps over a static sector table
//! - Per-symbol loss cooldowns
//! - Confidence-weighted position sizing

mod gate;
mod sector;
mod sizing;

pub use gate::RiskGate;
pub use sector::{sector_counts, sector_of, Sector, SectorCounts};
pub use sizing::size_position;
