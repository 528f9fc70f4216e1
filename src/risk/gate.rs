//! Admission control for new entries.
//!
//! The gate makes no network calls. Callers hand it the account snapshot,
//! the held-symbol set and the sector counts they already have.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

use crate::config::{ExposureConfig, RiskConfig};

use super::sector::{sector_of, Sector, SectorCounts};

/// Guards the percentage computation against a zero previous equity.
const EQUITY_EPSILON: Decimal = dec!(0.000000001);

/// Daily drawdown latch, sector caps and cooldown checks.
#[derive(Debug, Clone)]
pub struct RiskGate {
    /// Daily drop, in percent, that blocks entries
    max_daily_drawdown_pct: Decimal,
    sector_caps: HashMap<String, usize>,
    default_sector_max: usize,
    /// Set once a day's drawdown crosses the threshold; cleared by `reset_day`
    daily_dd_hit: bool,
    trading_day: Option<NaiveDate>,
}

impl RiskGate {
    pub fn new(risk: &RiskConfig, exposure: &ExposureConfig) -> Self {
        Self {
            max_daily_drawdown_pct: risk.max_daily_drawdown_pct,
            sector_caps: exposure.sector_max_positions.clone(),
            default_sector_max: exposure.default_sector_max,
            daily_dd_hit: false,
            trading_day: None,
        }
    }

    /// Percentage drop from the previous close.
    pub fn drawdown_pct(equity: Decimal, last_equity: Decimal) -> Decimal {
        (last_equity - equity) / last_equity.max(EQUITY_EPSILON) * dec!(100)
    }

    /// Returns true when today's drop meets or exceeds the threshold.
    ///
    /// A true result also latches `daily_drawdown_hit` until the next
    /// `reset_day`. Callers must block the entry being evaluated.
    pub fn evaluate_daily_drawdown(&mut self, equity: Decimal, last_equity: Decimal) -> bool {
        let dd = Self::drawdown_pct(equity, last_equity);
        let hit = dd >= self.max_daily_drawdown_pct;

        if hit && !self.daily_dd_hit {
            warn!(
                drawdown_pct = %dd.round_dp(2),
                limit_pct = %self.max_daily_drawdown_pct,
                "Daily drawdown threshold reached"
            );
        }
        if hit {
            self.daily_dd_hit = true;
        }
        hit
    }

    /// Whether the threshold has been crossed since the last reset.
    pub fn daily_drawdown_hit(&self) -> bool {
        self.daily_dd_hit
    }

    /// Clear the drawdown latch.
    pub fn reset_day(&mut self) {
        self.daily_dd_hit = false;
        info!("Daily risk state reset");
    }

    /// Reset the latch when `today` differs from the last seen trading day.
    ///
    /// Returns true if a reset happened. The very first call only records the
    /// day.
    pub fn roll_day(&mut self, today: NaiveDate) -> bool {
        match self.trading_day.replace(today) {
            Some(previous) if previous != today => {
                self.reset_day();
                true
            }
            _ => false,
        }
    }

    /// Maximum simultaneous positions for a sector.
    pub fn sector_cap(&self, sector: Sector) -> usize {
        self.sector_caps
            .get(sector.as_str())
            .copied()
            .unwrap_or(self.default_sector_max)
    }

    /// False if the symbol is already held or its sector is at capacity.
    pub fn can_enter_symbol(
        &self,
        symbol: &str,
        held: &HashSet<String>,
        sector_counts: &SectorCounts,
    ) -> bool {
        if held.contains(symbol) {
            return false;
        }
        let sector = sector_of(symbol);
        let open = sector_counts.get(&sector).copied().unwrap_or(0);
        open < self.sector_cap(sector)
    }

    /// True while the symbol's cooldown-until timestamp lies in the future.
    ///
    /// Expired entries are simply ignored; nothing is removed.
    pub fn on_cooldown(
        symbol: &str,
        cooldowns: &HashMap<String, DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        cooldowns.get(symbol).is_some_and(|until| now < *until)
    }
}
