//! Short-horizon scalping on cheap, liquid names.

use super::bracket::ExitTargets;
use super::signal::{Signal, SignalGenerator, StrategyParams, Universe};
use crate::market::{FeatureSeries, Timeframe};

pub struct SmallCapScalper;

impl SmallCapScalper {
    pub const NAME: &'static str = "smallcap_scalper";

    pub fn params() -> StrategyParams {
        StrategyParams {
            timeframe: Timeframe::Min2,
            universe: Universe::SmallCap,
            exits: ExitTargets::for_strategy(Self::NAME),
            max_positions: 5,
        }
    }
}

impl SignalGenerator for SmallCapScalper {
    fn min_history(&self) -> usize {
        40
    }

    fn generate_signal(&self, features: &FeatureSeries) -> Option<Signal> {
        let row = features.latest_if_sufficient(self.min_history())?;

        if row.rsi > 55.0 && row.macd_hist > 0.0 {
            Some(Signal::buy(0.6))
        } else if row.rsi < 45.0 && row.macd_hist < 0.0 {
            Some(Signal::sell(0.55))
        } else {
            None
        }
    }
}
