//! Registered strategy instances and their runtime flags.

use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::signal::{SignalGenerator, StrategyParams, Universe};
use crate::market::Timeframe;

/// One registered strategy.
///
/// Flags are atomics so the control surface can flip them while the loop is
/// mid-tick; the loop reads them once per strategy evaluation.
pub struct StrategySlot {
    name: String,
    generator: Box<dyn SignalGenerator>,
    params: StrategyParams,
    /// Advisory capital fraction, reported but not enforced
    allocation: Decimal,
    enabled: AtomicBool,
    shadow: AtomicBool,
    trades: AtomicU64,
    wins: AtomicU64,
    losses: AtomicU64,
}

/// Read-only view returned by the control surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyInfo {
    pub name: String,
    pub enabled: bool,
    pub shadow: bool,
    pub allocation: Decimal,
    pub max_positions: usize,
    pub timeframe: Timeframe,
    pub universe: Universe,
    pub trades: u64,
    pub wins: u64,
    pub losses: u64,
}

impl StrategySlot {
    pub fn new(
        name: impl Into<String>,
        generator: Box<dyn SignalGenerator>,
        params: StrategyParams,
        allocation: Decimal,
    ) -> Self {
        Self {
            name: name.into(),
            generator,
            params,
            allocation,
            enabled: AtomicBool::new(true),
            shadow: AtomicBool::new(false),
            trades: AtomicU64::new(0),
            wins: AtomicU64::new(0),
            losses: AtomicU64::new(0),
        }
    }

    /// Builder-style initial flags.
    pub fn with_flags(self, enabled: bool, shadow: bool) -> Self {
        self.enabled.store(enabled, Ordering::SeqCst);
        self.shadow.store(shadow, Ordering::SeqCst);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn generator(&self) -> &dyn SignalGenerator {
        self.generator.as_ref()
    }

    pub fn params(&self) -> &StrategyParams {
        &self.params
    }

    pub fn allocation(&self) -> Decimal {
        self.allocation
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_shadow(&self) -> bool {
        self.shadow.load(Ordering::SeqCst)
    }

    /// Flip shadow mode and return the new value.
    pub fn toggle_shadow(&self) -> bool {
        !self.shadow.fetch_xor(true, Ordering::SeqCst)
    }

    /// Count a closed trade in the advisory counters.
    pub fn record_result(&self, won: bool) {
        self.trades.fetch_add(1, Ordering::SeqCst);
        if won {
            self.wins.fetch_add(1, Ordering::SeqCst);
        } else {
            self.losses.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn info(&self) -> StrategyInfo {
        StrategyInfo {
            name: self.name.clone(),
            enabled: self.is_enabled(),
            shadow: self.is_shadow(),
            allocation: self.allocation,
            max_positions: self.params.max_positions,
            timeframe: self.params.timeframe,
            universe: self.params.universe,
            trades: self.trades.load(Ordering::SeqCst),
            wins: self.wins.load(Ordering::SeqCst),
            losses: self.losses.load(Ordering::SeqCst),
        }
    }
}

impl std::fmt::Debug for StrategySlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategySlot")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("enabled", &self.is_enabled())
            .field("shadow", &self.is_shadow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::BalancedTrend;
    use rust_decimal_macros::dec;

    fn slot() -> StrategySlot {
        StrategySlot::new(
            BalancedTrend::NAME,
            Box::new(BalancedTrend),
            BalancedTrend::params(),
            dec!(0.4),
        )
    }

    #[test]
    fn test_new_slot_is_enabled_and_live() {
        let slot = slot();
        assert!(slot.is_enabled());
        assert!(!slot.is_shadow());
        assert_eq!(slot.generator().min_history(), 70);
    }

    #[test]
    fn test_toggle_shadow_returns_new_state() {
        let slot = slot();
        assert!(slot.toggle_shadow());
        assert!(slot.is_shadow());
        assert!(!slot.toggle_shadow());
        assert!(!slot.is_shadow());
    }

    #[test]
    fn test_info_reflects_counters() {
        let slot = slot().with_flags(false, true);
        slot.record_result(true);
        slot.record_result(false);
        slot.record_result(false);

        let info = slot.info();
        assert_eq!(info.name, "balanced_trend");
        assert!(!info.enabled);
        assert!(info.shadow);
        assert_eq!(info.max_positions, 3);
        assert_eq!((info.trades, info.wins, info.losses), (3, 1, 2));
        assert_eq!(info.allocation, dec!(0.4));
    }
}
