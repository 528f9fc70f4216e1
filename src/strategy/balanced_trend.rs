//! Trend following on the MACD/signal cross, filtered by RSI.

use super::bracket::ExitTargets;
use super::signal::{Signal, SignalGenerator, StrategyParams, Universe};
use crate::market::{FeatureSeries, Timeframe};

pub struct BalancedTrend;

impl BalancedTrend {
    pub const NAME: &'static str = "balanced_trend";

    pub fn params() -> StrategyParams {
        StrategyParams {
            timeframe: Timeframe::Min15,
            universe: Universe::Core,
            exits: ExitTargets::for_strategy(Self::NAME),
            max_positions: 3,
        }
    }
}

impl SignalGenerator for BalancedTrend {
    fn min_history(&self) -> usize {
        70
    }

    fn generate_signal(&self, features: &FeatureSeries) -> Option<Signal> {
        let row = features.latest_if_sufficient(self.min_history())?;

        if row.macd > row.macd_signal && row.rsi > 50.0 {
            return Some(Signal::buy((0.5 + (row.rsi - 50.0) / 100.0).min(0.9)));
        }
        if row.macd < row.macd_signal && row.rsi < 50.0 {
            return Some(Signal::sell((0.5 + (50.0 - row.rsi) / 100.0).min(0.9)));
        }
        None
    }
}
