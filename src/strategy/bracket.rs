//! Split-bracket order construction.
//!
//! One sized signal becomes two independent bracket orders: a quick-exit leg
//! at the strategy's take-profit and a runner leg at an extended target. Both
//! share the same stop.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::exchange::{BracketOrder, OrderSide};

/// Take-profit and stop-loss distances as fractions of the entry price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExitTargets {
    pub take_profit_pct: Decimal,
    pub stop_loss_pct: Decimal,
}

impl ExitTargets {
    /// Fixed per-strategy targets; unknown strategies get 2% / 1%.
    pub fn for_strategy(name: &str) -> Self {
        let (tp, sl) = match name {
            "balanced_trend" => (Decimal::new(2, 2), Decimal::new(1, 2)),
            "smallcap_scalper" => (Decimal::new(12, 3), Decimal::new(6, 3)),
            "aggr_momentum" => (Decimal::new(3, 2), Decimal::new(15, 3)),
            _ => (Decimal::new(2, 2), Decimal::new(1, 2)),
        };
        Self {
            take_profit_pct: tp,
            stop_loss_pct: sl,
        }
    }
}

/// One bracket leg.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BracketLeg {
    pub qty: u64,
    pub take_profit: Decimal,
    pub stop_loss: Decimal,
}

/// An admitted, sized signal ready for dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderIntent {
    pub symbol: String,
    pub side: OrderSide,
    /// Quantity returned by the sizer
    pub sized_qty: u64,
    pub strategy: String,
    pub entry_price: Decimal,
    /// Quick-exit leg, then runner leg
    pub legs: [BracketLeg; 2],
}

/// Split a sized quantity into (quick, runner) legs.
///
/// The quick leg is half, rounded down, but at least one share; the runner
/// takes the remainder, also at least one. For a single share this yields
/// (1, 1): the executed total is rounded up by one share.
pub fn split_quantity(qty: u64) -> (u64, u64) {
    let quick = (qty / 2).max(1);
    let runner = qty.saturating_sub(quick).max(1);
    (quick, runner)
}

impl OrderIntent {
    /// Build the two-leg intent.
    ///
    /// The runner target is `take_profit_pct * (1 + trail_extra_tp_pct)` away
    /// from the entry.
    pub fn split(
        symbol: &str,
        side: OrderSide,
        sized_qty: u64,
        entry_price: Decimal,
        exits: ExitTargets,
        trail_extra_tp_pct: Decimal,
        strategy: &str,
    ) -> Self {
        let (quick_qty, runner_qty) = split_quantity(sized_qty);
        let runner_tp_pct = exits.take_profit_pct * (Decimal::ONE + trail_extra_tp_pct);

        let (tp1, tp2, sl) = match side {
            OrderSide::Buy => (
                entry_price * (Decimal::ONE + exits.take_profit_pct),
                entry_price * (Decimal::ONE + runner_tp_pct),
                entry_price * (Decimal::ONE - exits.stop_loss_pct),
            ),
            OrderSide::Sell => (
                entry_price * (Decimal::ONE - exits.take_profit_pct),
                entry_price * (Decimal::ONE - runner_tp_pct),
                entry_price * (Decimal::ONE + exits.stop_loss_pct),
            ),
        };

        Self {
            symbol: symbol.to_string(),
            side,
            sized_qty,
            strategy: strategy.to_string(),
            entry_price,
            legs: [
                BracketLeg {
                    qty: quick_qty,
                    take_profit: tp1,
                    stop_loss: sl,
                },
                BracketLeg {
                    qty: runner_qty,
                    take_profit: tp2,
                    stop_loss: sl,
                },
            ],
        }
    }

    /// Shares across both legs.
    pub fn total_qty(&self) -> u64 {
        self.legs.iter().map(|l| l.qty).sum()
    }

    /// Venue orders, quick leg first.
    pub fn bracket_orders(&self) -> Vec<BracketOrder> {
        self.legs
            .iter()
            .map(|leg| BracketOrder {
                symbol: self.symbol.clone(),
                qty: leg.qty,
                side: self.side,
                take_profit: leg.take_profit,
                stop_loss: leg.stop_loss,
                reference_price: self.entry_price,
            })
            .collect()
    }
}
