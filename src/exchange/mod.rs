//! Execution venue integrations.
//!
//! Provides the seams the orchestrator trades through:
//! - `ExecutionVenue`: account, positions, bracket submission, panic liquidation
//! - `AlertSink`: best-effort notifications
//!
//! Implementations: an Alpaca-style REST client, a webhook alerter and an
//! in-memory paper venue for simulated runs and tests.

mod alerts;
mod client;
pub mod mock;
mod traits;
mod types;

pub use alerts::WebhookAlerter;
pub use client::AlpacaTradingClient;
pub use mock::PaperVenue;
pub use traits::{AlertSink, ExecutionVenue};
pub use types::*;
