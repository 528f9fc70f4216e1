//! Venue-agnostic traits for order execution and alerting.
//!
//! The orchestrator only talks to these seams, so the HTTP venue and the
//! in-memory paper venue are interchangeable.

use async_trait::async_trait;

use super::types::{AccountSnapshot, BracketOrder, OpenPosition, OrderRecord, VenueError};

/// Remote execution venue.
///
/// Every call takes the paper flag so one client can serve both the simulated
/// and the real account.
#[async_trait]
pub trait ExecutionVenue: Send + Sync {
    /// Current equity and previous-close equity.
    async fn account(&self, paper: bool) -> anyhow::Result<AccountSnapshot>;

    /// All open positions.
    async fn open_positions(&self, paper: bool) -> anyhow::Result<Vec<OpenPosition>>;

    /// Submit one bracket order. Non-success responses are errors.
    async fn submit_bracket(
        &self,
        order: &BracketOrder,
        paper: bool,
    ) -> Result<OrderRecord, VenueError>;

    /// Cancel every open order. Best effort: failures are logged, not returned.
    async fn cancel_all_orders(&self, paper: bool);

    /// Liquidate every open position. Best effort: failures are logged, not returned.
    async fn close_all_positions(&self, paper: bool);
}

/// Out-of-band notification channel. Best effort and silent when unconfigured.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send_alert(&self, event: &str, payload: serde_json::Value);
}
