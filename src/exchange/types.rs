//! Type definitions for the execution venue.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account equity snapshot.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "AccountWire")]
pub struct AccountSnapshot {
    pub equity: Decimal,
    /// Equity at the previous session close; current equity when not reported
    pub last_equity: Decimal,
}

#[derive(Deserialize)]
struct AccountWire {
    #[serde(with = "rust_decimal::serde::str")]
    equity: Decimal,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    last_equity: Option<Decimal>,
}

impl From<AccountWire> for AccountSnapshot {
    fn from(wire: AccountWire) -> Self {
        Self {
            equity: wire.equity,
            last_equity: wire.last_equity.unwrap_or(wire.equity),
        }
    }
}

/// An open position as reported by the venue.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OpenPosition {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub qty: Decimal,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub avg_entry_price: Option<Decimal>,
}

/// One bracket order: market entry with attached take-profit and stop-loss.
#[derive(Debug, Clone, PartialEq)]
pub struct BracketOrder {
    pub symbol: String,
    pub qty: u64,
    pub side: OrderSide,
    pub take_profit: Decimal,
    pub stop_loss: Decimal,
    /// Price the order was sized against; not sent to the venue
    pub reference_price: Decimal,
}

/// Venue acknowledgement of a submitted order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrderRecord {
    pub id: String,
    #[serde(default)]
    pub client_order_id: String,
    pub symbol: String,
    #[serde(default)]
    pub status: String,
}

/// Order submission failure. Propagated to the caller, never swallowed.
#[derive(Debug, Error)]
pub enum VenueError {
    #[error("order request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("order rejected ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("malformed order response: {0}")]
    Decode(String),
}
