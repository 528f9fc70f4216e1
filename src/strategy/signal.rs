//! Strategy-facing signal protocol.

use serde::Serialize;

use super::bracket::ExitTargets;
use crate::exchange::OrderSide;
use crate::market::{FeatureSeries, Timeframe};

/// Directional call with a confidence in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Signal {
    pub side: OrderSide,
    pub confidence: f64,
}

impl Signal {
    pub fn buy(confidence: f64) -> Self {
        Self {
            side: OrderSide::Buy,
            confidence,
        }
    }

    pub fn sell(confidence: f64) -> Self {
        Self {
            side: OrderSide::Sell,
            confidence,
        }
    }
}

/// A pure signal rule over an engineered feature series.
///
/// Implementations must return `None` when the series is shorter than
/// `min_history()`.
pub trait SignalGenerator: Send + Sync {
    /// Fewest feature points the rule needs.
    fn min_history(&self) -> usize;

    fn generate_signal(&self, features: &FeatureSeries) -> Option<Signal>;
}

/// Which symbol list a strategy trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Universe {
    /// The configured core symbols
    Core,
    /// The per-tick small-cap watchlist
    SmallCap,
}

/// Static per-strategy parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyParams {
    pub timeframe: Timeframe,
    pub universe: Universe,
    pub exits: ExitTargets,
    /// New entries this strategy may open per tick
    pub max_positions: usize,
}
