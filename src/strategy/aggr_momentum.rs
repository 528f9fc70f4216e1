//! Momentum entries on strong histogram and RSI agreement.

use super::bracket::ExitTargets;
use super::signal::{Signal, SignalGenerator, StrategyParams, Universe};
use crate::market::{FeatureSeries, Timeframe};

pub struct AggressiveMomentum;

impl AggressiveMomentum {
    pub const NAME: &'static str = "aggr_momentum";

    pub fn params() -> StrategyParams {
        StrategyParams {
            timeframe: Timeframe::Min5,
            universe: Universe::Core,
            exits: ExitTargets::for_strategy(Self::NAME),
            max_positions: 2,
        }
    }
}

impl SignalGenerator for AggressiveMomentum {
    fn min_history(&self) -> usize {
        60
    }

    fn generate_signal(&self, features: &FeatureSeries) -> Option<Signal> {
        let row = features.latest_if_sufficient(self.min_history())?;

        if row.macd_hist > 0.0 && row.rsi > 60.0 {
            Some(Signal::buy(0.65))
        } else if row.macd_hist < 0.0 && row.rsi < 40.0 {
            Some(Signal::sell(0.6))
        } else {
            None
        }
    }
}
