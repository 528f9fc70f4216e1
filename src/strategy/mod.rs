//! Pluggable signal strategies and order construction.
//!
//! Contains:
//! - The `SignalGenerator` capability trait and the shipped signal rules
//! - `StrategySlot`, the registered instance with its runtime flags
//! - Split-bracket `OrderIntent` construction

mod aggr_momentum;
mod balanced_trend;
mod bracket;
mod signal;
mod slot;
mod smallcap_scalper;

pub use aggr_momentum::AggressiveMomentum;
pub use balanced_trend::BalancedTrend;
pub use bracket::{split_quantity, BracketLeg, ExitTargets, OrderIntent};
pub use signal::{Signal, SignalGenerator, StrategyParams, Universe};
pub use slot::{StrategyInfo, StrategySlot};
pub use smallcap_scalper::SmallCapScalper;

use crate::config::Config;

/// The shipped strategies in registration order, with flags and allocations
/// taken from configuration.
pub fn default_slots(config: &Config) -> Vec<StrategySlot> {
    let registry: [(&str, Box<dyn SignalGenerator>, StrategyParams); 3] = [
        (
            BalancedTrend::NAME,
            Box::new(BalancedTrend),
            BalancedTrend::params(),
        ),
        (
            SmallCapScalper::NAME,
            Box::new(SmallCapScalper),
            SmallCapScalper::params(),
        ),
        (
            AggressiveMomentum::NAME,
            Box::new(AggressiveMomentum),
            AggressiveMomentum::params(),
        ),
    ];

    registry
        .into_iter()
        .map(|(name, generator, params)| {
            let enabled = !config.disabled_strategies.iter().any(|s| s == name);
            let shadow = config.shadow_strategies.iter().any(|s| s == name);
            StrategySlot::new(name, generator, params, config.allocation_for(name))
                .with_flags(enabled, shadow)
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{Duration, TimeZone, Utc};

    use crate::market::{FeaturePoint, FeatureSeries};

    /// `len` neutral feature points; `last` customizes the newest one.
    pub(crate) fn series_with_last(len: usize, last: impl FnOnce(&mut FeaturePoint)) -> FeatureSeries {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap();
        let mut points: Vec<FeaturePoint> = (0..len)
            .map(|i| FeaturePoint {
                timestamp: start + Duration::minutes(i as i64),
                close: 100.0,
                ret1: 0.0,
                ret5: 0.0,
                volatility: 0.01,
                rsi: 50.0,
                macd: 0.0,
                macd_signal: 0.0,
                macd_hist: 0.0,
            })
            .collect();
        if let Some(point) = points.last_mut() {
            last(point);
        }
        FeatureSeries::new(points)
    }
}
