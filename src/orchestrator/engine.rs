//! The scheduling actor: tick procedure, run loop and control surface.

use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures_util::stream::{self, StreamExt};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::config::Config;
use crate::events::{EventLog, EventRecord};
use crate::exchange::{AlertSink, ExecutionVenue, OrderSide};
use crate::market::{compute_features, BarSource, FeatureSeries, MarketClock, Timeframe};
use crate::risk::{sector_counts, sector_of, size_position, RiskGate, SectorCounts};
use crate::strategy::{OrderIntent, Signal, StrategyInfo, StrategySlot, Universe};

use super::state::{
    EntryOutcome, EntryReport, RunState, RunStatus, TickReport, SKIP_EARLY_SESSION,
};

/// Daily bars looked back over when filtering the small-cap universe.
const WATCHLIST_LOOKBACK_DAYS: i64 = 5;
const WATCHLIST_BAR_LIMIT: u32 = 5;
/// Short-window bars used to price an entry.
const PRICE_LOOKBACK_DAYS: i64 = 2;
const PRICE_BAR_LIMIT: u32 = 50;

/// Multi-strategy orchestrator.
///
/// One instance owns the strategy slots, the risk gate and the run state. The
/// loop and the control surface share it through an `Arc`.
pub struct Orchestrator {
    config: Config,
    slots: Vec<StrategySlot>,
    bars: Arc<dyn BarSource>,
    venue: Arc<dyn ExecutionVenue>,
    alerts: Arc<dyn AlertSink>,
    events: Arc<EventLog>,
    clock: MarketClock,
    gate: Mutex<RiskGate>,
    state: RwLock<RunState>,
    /// Bumped on every start; a loop exits once it no longer owns the latest value
    generation: AtomicU64,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        slots: Vec<StrategySlot>,
        bars: Arc<dyn BarSource>,
        venue: Arc<dyn ExecutionVenue>,
        alerts: Arc<dyn AlertSink>,
        events: Arc<EventLog>,
    ) -> Result<Self> {
        config.validate()?;

        let mut names = HashSet::new();
        for slot in &slots {
            anyhow::ensure!(
                names.insert(slot.name().to_string()),
                "duplicate strategy name: {}",
                slot.name()
            );
        }

        let clock = MarketClock::new(&config.session, config.risk.skip_minutes_after_open);
        let gate = RiskGate::new(&config.risk, &config.exposure_limits);
        let state = RunState::new(config.interval_sec, config.paper);

        Ok(Self {
            config,
            slots,
            bars,
            venue,
            alerts,
            events,
            clock,
            gate: Mutex::new(gate),
            state: RwLock::new(state),
            generation: AtomicU64::new(0),
            loop_handle: Mutex::new(None),
        })
    }

    // ==================== Control surface ====================

    /// Spawn the run loop. Returns false if it was already running.
    pub async fn start(self: &Arc<Self>) -> bool {
        {
            let mut state = self.state.write().await;
            if state.running {
                return false;
            }
            state.running = true;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.run_loop(generation).await });
        *self.loop_handle.lock().await = Some(handle);

        self.events.info(
            "loop_started",
            json!({
                "paper": self.config.paper,
                "interval_sec": self.config.interval_sec,
                "strategies": self.slots.len(),
            }),
        );
        true
    }

    /// Ask the loop to exit at its next iteration boundary or sleep step.
    pub async fn stop(&self) {
        let was_running = std::mem::replace(&mut self.state.write().await.running, false);
        if was_running {
            info!("Stop requested");
        }
    }

    /// Wait for the most recently started loop to exit.
    pub async fn wait_stopped(&self) {
        let handle = self.loop_handle.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Run loop terminated abnormally");
            }
        }
    }

    /// Latch panic, then cancel all orders and close all positions.
    ///
    /// The latch is set first so an in-flight tick stops submitting before the
    /// liquidation runs. There is no way back out of panic short of restarting
    /// the process.
    pub async fn panic(&self) {
        let paper = self.config.paper;
        warn!(paper, "PANIC: cancelling all orders and closing all positions");

        self.state.write().await.panic = true;
        self.venue.cancel_all_orders(paper).await;
        self.venue.close_all_positions(paper).await;

        self.events.warn("panic_close", json!({ "paper": paper }));
        self.alerts
            .send_alert("panic_close", json!({ "paper": paper }))
            .await;
    }

    pub async fn status(&self) -> RunStatus {
        self.state.read().await.status()
    }

    /// Strategies in registration order.
    pub fn list_strategies(&self) -> Vec<StrategyInfo> {
        self.slots.iter().map(StrategySlot::info).collect()
    }

    pub fn strategy(&self, name: &str) -> Option<&StrategySlot> {
        self.slots.iter().find(|s| s.name() == name)
    }

    /// Returns false for an unknown strategy.
    pub fn set_strategy_enabled(&self, name: &str, enabled: bool) -> bool {
        let Some(slot) = self.strategy(name) else {
            return false;
        };
        slot.set_enabled(enabled);

        let event = if enabled {
            "strategy_enabled"
        } else {
            "strategy_disabled"
        };
        self.events.info(event, json!({ "strategy": name }));
        true
    }

    /// Flip shadow mode; `None` for an unknown strategy.
    pub fn toggle_shadow(&self, name: &str) -> Option<bool> {
        let slot = self.strategy(name)?;
        let shadow = slot.toggle_shadow();
        self.events
            .info("shadow_toggled", json!({ "strategy": name, "shadow": shadow }));
        Some(shadow)
    }

    /// Record an externally observed exit.
    ///
    /// A negative P&L counts as a loss and puts the symbol on cooldown for
    /// `loss_cooldown_minutes`. Returns false for an unknown strategy.
    pub async fn record_closed_trade(&self, strategy: &str, symbol: &str, pnl: Decimal) -> bool {
        let Some(slot) = self.strategy(strategy) else {
            return false;
        };

        let loss = pnl < Decimal::ZERO;
        slot.record_result(!loss);

        let mut cooldown_until = None;
        if loss {
            let until = Utc::now() + ChronoDuration::minutes(self.config.risk.loss_cooldown_minutes);
            self.state
                .write()
                .await
                .cooldowns
                .insert(symbol.to_string(), until);
            cooldown_until = Some(until);
        }

        self.events.info(
            "trade_closed",
            json!({
                "strategy": strategy,
                "symbol": symbol,
                "pnl": pnl.to_string(),
                "cooldown_until": cooldown_until,
            }),
        );
        true
    }

    /// Last `n` event-log records.
    pub fn tail_events(&self, n: usize) -> Result<Vec<EventRecord>> {
        self.events.tail(n)
    }

    // ==================== Run loop ====================

    async fn panic_latched(&self) -> bool {
        self.state.read().await.panic
    }

    async fn is_current(&self, generation: u64) -> bool {
        self.state.read().await.running && self.generation.load(Ordering::SeqCst) == generation
    }

    async fn run_loop(self: Arc<Self>, generation: u64) {
        info!(generation, "Orchestration loop started");

        while self.is_current(generation).await {
            if self.panic_latched().await {
                debug!("Panic latched, idling");
            } else {
                // A panic inside a tick surfaces as a JoinError instead of
                // unwinding through the loop.
                let this = Arc::clone(&self);
                match tokio::spawn(async move { this.run_tick_at(Utc::now()).await }).await {
                    Ok(report) => {
                        let mut state = self.state.write().await;
                        state.last_message = report.message;
                        state.last_error = report.errors.last().cloned();
                    }
                    Err(e) => {
                        let err = e.to_string();
                        error!(error = %err, "Tick failed");
                        {
                            let mut state = self.state.write().await;
                            state.last_message = "error".to_string();
                            state.last_error = Some(err.clone());
                        }
                        self.events.error("loop_error", json!({ "err": err }));
                        self.alerts
                            .send_alert("loop_error", json!({ "err": err }))
                            .await;
                    }
                }
            }

            self.state.write().await.last_tick = Some(Utc::now());

            let interval = self.state.read().await.interval;
            let step = Duration::from_secs(1);
            let mut slept = Duration::ZERO;
            while slept < interval && self.is_current(generation).await {
                tokio::time::sleep(step).await;
                slept += step;
            }
        }

        info!(generation, "Orchestration loop stopped");
        self.events
            .info("loop_stopped", json!({ "generation": generation }));
    }

    // ==================== Tick ====================

    pub async fn run_tick(&self) -> TickReport {
        self.run_tick_at(Utc::now()).await
    }

    /// One full tick evaluated as of `now`.
    pub async fn run_tick_at(&self, now: DateTime<Utc>) -> TickReport {
        if self.panic_latched().await {
            return TickReport::skipped("panic");
        }

        let today = now.date_naive();
        if self.gate.lock().await.roll_day(today) {
            self.events
                .info("daily_reset", json!({ "date": today.to_string() }));
        }

        if self.clock.in_pre_open_exclusion(now) {
            debug!(
                minutes_since_open = self.clock.minutes_since_open(now),
                "Inside post-open exclusion window"
            );
            return TickReport::skipped(SKIP_EARLY_SESSION);
        }

        let mut report = TickReport::default();
        let active: Vec<&StrategySlot> = self.slots.iter().filter(|s| s.is_enabled()).collect();

        if active
            .iter()
            .any(|s| s.params().universe == Universe::SmallCap)
        {
            report.watchlist = self.smallcap_watchlist(now, &mut report.errors).await;
        }

        // Each (timeframe, symbol) pair is fetched once, however many strategies need it.
        let mut needed = BTreeSet::new();
        for slot in &active {
            for symbol in self.universe_symbols(slot, &report.watchlist) {
                needed.insert((slot.params().timeframe, symbol.clone()));
            }
        }
        report.fetched_pairs = needed.len();
        let features = self.fetch_features(&needed, now, &mut report.errors).await;

        let (mut held, mut counts) = match self.venue.open_positions(self.config.paper).await {
            Ok(positions) => {
                let held: HashSet<String> = positions.iter().map(|p| p.symbol.clone()).collect();
                (held, sector_counts(&positions))
            }
            Err(e) => {
                let err = format!("{:#}", e);
                self.events
                    .error("positions_failed", json!({ "err": err }));
                report.errors.push(format!("positions: {}", err));
                (HashSet::new(), SectorCounts::new())
            }
        };

        let cooldowns = self.state.read().await.cooldowns.clone();
        let mut halted = false;

        'strategies: for slot in active {
            if !slot.is_enabled() {
                continue;
            }
            let params = slot.params();
            // Every entry attempt uses a slot, whatever its outcome.
            let mut taken = 0usize;

            for symbol in self.universe_symbols(slot, &report.watchlist) {
                if taken >= params.max_positions {
                    break;
                }
                if self.panic_latched().await {
                    halted = true;
                    break 'strategies;
                }
                if !self
                    .gate
                    .lock()
                    .await
                    .can_enter_symbol(symbol, &held, &counts)
                {
                    continue;
                }
                if RiskGate::on_cooldown(symbol, &cooldowns, now) {
                    debug!(%symbol, "Symbol on cooldown");
                    continue;
                }

                let Some(series) = features.get(&(params.timeframe, symbol.clone())) else {
                    continue;
                };
                let Some(signal) = slot.generator().generate_signal(series) else {
                    continue;
                };
                if signal.confidence < self.threshold(signal.side) {
                    debug!(
                        strategy = slot.name(),
                        %symbol,
                        confidence = signal.confidence,
                        "Signal below threshold"
                    );
                    continue;
                }

                let outcome = self.enter_trade(slot, symbol, signal, now).await;
                taken += 1;

                if outcome.opened_position() {
                    held.insert(symbol.clone());
                    *counts.entry(sector_of(symbol)).or_insert(0) += 1;
                }
                if let EntryOutcome::Failed { reason, .. } = &outcome {
                    report.errors.push(format!("{} {}: {}", slot.name(), symbol, reason));
                }

                let stop = matches!(outcome, EntryOutcome::Halted { .. });
                report.entries.push(EntryReport {
                    strategy: slot.name().to_string(),
                    symbol: symbol.clone(),
                    outcome,
                });
                if stop {
                    halted = true;
                    break 'strategies;
                }
            }
        }

        report.finish();
        if halted {
            warn!("Panic latched mid-tick, remaining entries dropped");
            report.halt();
        }
        info!(
            pairs = report.fetched_pairs,
            entries = report.entries.len(),
            errors = report.errors.len(),
            "Tick complete"
        );
        report
    }

    fn universe_symbols<'a>(&'a self, slot: &StrategySlot, watchlist: &'a [String]) -> &'a [String] {
        match slot.params().universe {
            Universe::Core => &self.config.symbols_core,
            Universe::SmallCap => watchlist,
        }
    }

    fn threshold(&self, side: OrderSide) -> f64 {
        match side {
            OrderSide::Buy => self.config.router.prob_long_thresh,
            OrderSide::Sell => self.config.router.prob_short_thresh,
        }
    }

    /// Universe symbols whose last daily close and volume pass the filters,
    /// in universe order, truncated to `max_symbols`.
    async fn smallcap_watchlist(&self, now: DateTime<Utc>, errors: &mut Vec<String>) -> Vec<String> {
        let start = now - ChronoDuration::days(WATCHLIST_LOOKBACK_DAYS);
        let filters = &self.config.watchlist;

        let lookups: Vec<_> = stream::iter(self.config.symbols_universe.iter().cloned())
            .map(|symbol: String| async move {
                let bars = self
                    .bars
                    .fetch_bars(&symbol, start, now, Timeframe::Day1, WATCHLIST_BAR_LIMIT)
                    .await;
                (symbol, bars)
            })
            .buffered(self.config.fetch.max_concurrent)
            .collect()
            .await;

        let mut watchlist = Vec::new();
        for (symbol, bars) in lookups {
            let last = match bars {
                Ok(bars) => bars.last().cloned(),
                Err(e) => {
                    let err = format!("{:#}", e);
                    self.events
                        .error("watchlist_failed", json!({ "symbol": symbol, "err": err }));
                    errors.push(format!("watchlist {}: {}", symbol, err));
                    continue;
                }
            };
            let Some(last) = last else {
                continue;
            };
            let (Some(close), Some(volume)) = (Decimal::from_f64(last.close), Decimal::from_f64(last.volume)) else {
                continue;
            };
            if close <= filters.smallcap_max_price && volume >= filters.smallcap_min_vol {
                watchlist.push(symbol);
            }
        }

        watchlist.truncate(filters.max_symbols);
        debug!(count = watchlist.len(), "Small-cap watchlist built");
        watchlist
    }

    /// Fetch and feature every pair concurrently. Failed pairs are absent
    /// from the result.
    async fn fetch_features(
        &self,
        needed: &BTreeSet<(Timeframe, String)>,
        now: DateTime<Utc>,
        errors: &mut Vec<String>,
    ) -> HashMap<(Timeframe, String), FeatureSeries> {
        let start = now - ChronoDuration::days(self.config.fetch.history_days);
        let limit = self.config.fetch.bar_limit;

        let results: Vec<_> = stream::iter(needed.iter().cloned())
            .map(|(timeframe, symbol)| async move {
                let bars = self
                    .bars
                    .fetch_bars(&symbol, start, now, timeframe, limit)
                    .await;
                (timeframe, symbol, bars)
            })
            .buffer_unordered(self.config.fetch.max_concurrent)
            .collect()
            .await;

        let mut features = HashMap::with_capacity(results.len());
        for (timeframe, symbol, bars) in results {
            match bars {
                Ok(bars) => {
                    let series = compute_features(&bars);
                    if series.is_empty() {
                        debug!(%symbol, %timeframe, bars = bars.len(), "Insufficient history");
                    }
                    features.insert((timeframe, symbol), series);
                }
                Err(e) => {
                    let err = format!("{:#}", e);
                    self.events.error(
                        "bars_failed",
                        json!({ "symbol": symbol, "timeframe": timeframe, "err": err }),
                    );
                    errors.push(format!("bars {} {}: {}", symbol, timeframe, err));
                }
            }
        }
        features
    }

    /// Last 1-minute close for `symbol`, `None` when there are no bars.
    async fn entry_price(&self, symbol: &str, now: DateTime<Utc>) -> Result<Option<Decimal>> {
        let start = now - ChronoDuration::days(PRICE_LOOKBACK_DAYS);
        let bars = self
            .bars
            .fetch_bars(symbol, start, now, Timeframe::Min1, PRICE_BAR_LIMIT)
            .await?;
        Ok(bars.last().and_then(|b| Decimal::from_f64(b.close)))
    }

    /// Check drawdown, price, size and dispatch one admitted signal.
    #[instrument(skip(self, slot, signal, now), fields(strategy = slot.name(), side = %signal.side))]
    async fn enter_trade(
        &self,
        slot: &StrategySlot,
        symbol: &str,
        signal: Signal,
        now: DateTime<Utc>,
    ) -> EntryOutcome {
        let paper = self.config.paper;

        if self.panic_latched().await {
            return EntryOutcome::Halted { legs_submitted: 0 };
        }

        let account = match self.venue.account(paper).await {
            Ok(account) => account,
            Err(e) => {
                let err = format!("{:#}", e);
                self.events.error("account_failed", json!({ "err": err }));
                self.alerts
                    .send_alert("account_failed", json!({ "err": err }))
                    .await;
                return EntryOutcome::Failed {
                    reason: format!("account: {}", err),
                    legs_submitted: 0,
                };
            }
        };

        let dd_hit = self
            .gate
            .lock()
            .await
            .evaluate_daily_drawdown(account.equity, account.last_equity);
        if dd_hit {
            let details = json!({
                "equity": account.equity.to_string(),
                "last_equity": account.last_equity.to_string(),
                "symbol": symbol,
            });
            self.events.warn("daily_dd_hit", details.clone());
            self.alerts.send_alert("daily_dd_hit", details).await;
            return EntryOutcome::DrawdownBlocked;
        }

        let price = match self.entry_price(symbol, now).await {
            Ok(Some(price)) => price,
            Ok(None) => {
                debug!("No recent bar to price the entry");
                return EntryOutcome::NoPrice;
            }
            Err(e) => {
                let err = format!("{:#}", e);
                self.events
                    .error("price_failed", json!({ "symbol": symbol, "err": err }));
                return EntryOutcome::Failed {
                    reason: format!("price: {}", err),
                    legs_submitted: 0,
                };
            }
        };

        let risk = &self.config.risk;
        let qty = size_position(price, signal.confidence, risk.equity_cap, risk.per_trade_risk_frac);
        let intent = OrderIntent::split(
            symbol,
            signal.side,
            qty,
            price,
            slot.params().exits,
            self.config.router.trail_extra_tp_pct,
            slot.name(),
        );
        let details = serde_json::to_value(&intent).unwrap_or_default();

        if slot.is_shadow() {
            info!(qty, %price, "Shadow entry, not submitting");
            self.events.info("shadow_signal", details);
            return EntryOutcome::Shadowed(intent);
        }

        let mut legs_submitted = 0;
        for order in intent.bracket_orders() {
            if self.panic_latched().await {
                warn!(legs_submitted, "Panic latched, abandoning remaining legs");
                return EntryOutcome::Halted { legs_submitted };
            }
            match self.venue.submit_bracket(&order, paper).await {
                Ok(record) => {
                    legs_submitted += 1;
                    debug!(order_id = %record.id, qty = order.qty, "Bracket leg accepted");
                }
                Err(e) => {
                    let err = e.to_string();
                    error!(error = %err, legs_submitted, "Bracket submission failed");
                    let failure = json!({
                        "strategy": slot.name(),
                        "symbol": symbol,
                        "leg": legs_submitted + 1,
                        "err": err,
                    });
                    self.events.error("order_failed", failure.clone());
                    self.alerts.send_alert("order_failed", failure).await;
                    return EntryOutcome::Failed {
                        reason: err,
                        legs_submitted,
                    };
                }
            }
        }

        info!(qty = intent.total_qty(), %price, "Split bracket submitted");
        self.events.info("order_submitted", details);
        EntryOutcome::Submitted(intent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::tests::temp_state_dir;
    use crate::exchange::PaperVenue;
    use crate::market::{zigzag_bars, Bar, MockBarSource};
    use crate::orchestrator::RunPhase;
    use crate::strategy::{ExitTargets, SignalGenerator, StrategyParams};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    /// Bar source that records every request.
    #[derive(Default)]
    struct CountingBars {
        calls: std::sync::Mutex<Vec<(String, Timeframe)>>,
        failing: HashSet<String>,
    }

    impl CountingBars {
        /// Feature requests only: no daily watchlist or 1-minute price lookups.
        fn feature_calls(&self) -> Vec<(String, Timeframe)> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, tf)| !matches!(tf, Timeframe::Day1 | Timeframe::Min1))
                .cloned()
                .collect()
        }

        fn total_calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn clear(&self) {
            self.calls.lock().unwrap().clear();
        }
    }

    #[async_trait]
    impl BarSource for CountingBars {
        async fn fetch_bars(
            &self,
            symbol: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
            timeframe: Timeframe,
            _limit: u32,
        ) -> Result<Vec<Bar>> {
            self.calls
                .lock()
                .unwrap()
                .push((symbol.to_string(), timeframe));
            anyhow::ensure!(!self.failing.contains(symbol), "simulated outage for {}", symbol);
            Ok(zigzag_bars(100))
        }
    }

    /// Bar source that latches panic the first time an entry is priced.
    #[derive(Default)]
    struct PanicsOnPricing {
        orch: std::sync::OnceLock<std::sync::Weak<Orchestrator>>,
    }

    #[async_trait]
    impl BarSource for PanicsOnPricing {
        async fn fetch_bars(
            &self,
            _symbol: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
            timeframe: Timeframe,
            _limit: u32,
        ) -> Result<Vec<Bar>> {
            if timeframe == Timeframe::Min1 {
                if let Some(orch) = self.orch.get().and_then(|w| w.upgrade()) {
                    orch.panic().await;
                }
            }
            Ok(zigzag_bars(100))
        }
    }

    struct Fixed(Option<Signal>);

    impl SignalGenerator for Fixed {
        fn min_history(&self) -> usize {
            0
        }

        fn generate_signal(&self, _features: &FeatureSeries) -> Option<Signal> {
            self.0
        }
    }

    struct Explodes;

    impl SignalGenerator for Explodes {
        fn min_history(&self) -> usize {
            0
        }

        fn generate_signal(&self, _features: &FeatureSeries) -> Option<Signal> {
            panic!("strategy bug")
        }
    }

    #[derive(Default)]
    struct RecordingAlerts {
        sent: std::sync::Mutex<Vec<String>>,
    }

    impl RecordingAlerts {
        fn events(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AlertSink for RecordingAlerts {
        async fn send_alert(&self, event: &str, _payload: serde_json::Value) {
            self.sent.lock().unwrap().push(event.to_string());
        }
    }

    struct Harness {
        orch: Arc<Orchestrator>,
        venue: Arc<PaperVenue>,
        bars: Arc<CountingBars>,
        alerts: Arc<RecordingAlerts>,
    }

    fn config(core: &[&str]) -> Config {
        let mut config = Config::default();
        config.symbols_core = core.iter().map(|s| s.to_string()).collect();
        config.symbols_universe = Vec::new();
        config.state_dir = temp_state_dir().to_string_lossy().into_owned();
        config.risk.skip_minutes_after_open = 0;
        config
    }

    fn slot(
        name: &str,
        universe: Universe,
        timeframe: Timeframe,
        max_positions: usize,
        signal: Option<Signal>,
    ) -> StrategySlot {
        StrategySlot::new(
            name,
            Box::new(Fixed(signal)),
            StrategyParams {
                timeframe,
                universe,
                exits: ExitTargets::for_strategy(name),
                max_positions,
            },
            dec!(0.3),
        )
    }

    fn build(
        config: Config,
        slots: Vec<StrategySlot>,
        bars: Arc<dyn BarSource>,
    ) -> (Arc<Orchestrator>, Arc<PaperVenue>, Arc<RecordingAlerts>) {
        let venue = Arc::new(PaperVenue::new(dec!(100000)));
        let alerts = Arc::new(RecordingAlerts::default());
        let events = Arc::new(EventLog::open(&config.state_dir).unwrap());
        let orch =
            Orchestrator::new(config, slots, bars, venue.clone(), alerts.clone(), events).unwrap();
        (Arc::new(orch), venue, alerts)
    }

    fn harness_with(config: Config, slots: Vec<StrategySlot>, bars: CountingBars) -> Harness {
        let bars = Arc::new(bars);
        let (orch, venue, alerts) = build(config, slots, bars.clone());
        Harness {
            orch,
            venue,
            bars,
            alerts,
        }
    }

    fn harness(config: Config, slots: Vec<StrategySlot>) -> Harness {
        harness_with(config, slots, CountingBars::default())
    }

    /// Monday, mid-session.
    fn session_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap()
    }

    fn event_names(orch: &Orchestrator) -> Vec<String> {
        orch.tail_events(200)
            .unwrap()
            .into_iter()
            .map(|r| r.event)
            .collect()
    }

    fn ordered_symbols(orders: &[crate::exchange::BracketOrder]) -> Vec<String> {
        orders.iter().map(|o| o.symbol.clone()).collect()
    }

    #[tokio::test]
    async fn test_fetches_each_pair_once_per_tick() {
        let h = harness(
            config(&["AAPL", "MSFT"]),
            vec![
                slot("trend_a", Universe::Core, Timeframe::Min15, 3, None),
                slot("trend_b", Universe::Core, Timeframe::Min15, 3, None),
                slot("momo", Universe::Core, Timeframe::Min5, 2, None),
            ],
        );

        let report = h.orch.run_tick_at(session_time()).await;

        let mut calls = h.bars.feature_calls();
        calls.sort();
        assert_eq!(
            calls,
            vec![
                ("AAPL".to_string(), Timeframe::Min5),
                ("AAPL".to_string(), Timeframe::Min15),
                ("MSFT".to_string(), Timeframe::Min5),
                ("MSFT".to_string(), Timeframe::Min15),
            ]
        );
        assert_eq!(report.fetched_pairs, 4);
        // No small-cap strategy, so no daily watchlist lookups.
        assert_eq!(h.bars.total_calls(), 4);
        assert_eq!(report.message, "ok");
    }

    #[tokio::test]
    async fn test_disabled_strategy_requests_nothing() {
        let h = harness(
            config(&["AAPL"]),
            vec![slot("trend", Universe::Core, Timeframe::Min15, 3, Some(Signal::buy(0.9)))],
        );
        assert!(h.orch.set_strategy_enabled("trend", false));

        let report = h.orch.run_tick_at(session_time()).await;

        assert_eq!(h.bars.total_calls(), 0);
        assert!(report.entries.is_empty());
        assert!(h.venue.submitted_orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_held_symbol_is_not_reentered() {
        let h = harness(
            config(&["AAPL", "MSFT"]),
            vec![slot("trend", Universe::Core, Timeframe::Min15, 3, Some(Signal::buy(0.8)))],
        );
        h.venue.add_position("AAPL", dec!(10), dec!(180)).await;

        h.orch.run_tick_at(session_time()).await;

        let orders = h.venue.submitted_orders().await;
        assert_eq!(ordered_symbols(&orders), ["MSFT", "MSFT"]);
    }

    #[tokio::test]
    async fn test_split_legs_reach_the_venue() {
        let h = harness(
            config(&["AAPL"]),
            vec![slot("balanced_trend", Universe::Core, Timeframe::Min15, 3, Some(Signal::sell(0.8)))],
        );

        let report = h.orch.run_tick_at(session_time()).await;

        let EntryOutcome::Submitted(intent) = &report.entries[0].outcome else {
            panic!("expected submission, got {:?}", report.entries[0].outcome);
        };
        let orders = h.venue.submitted_orders().await;
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].qty + orders[1].qty, intent.sized_qty);
        assert!(orders.iter().all(|o| o.side == OrderSide::Sell));
        // Runner target sits farther below the entry for a short.
        assert!(orders[1].take_profit < orders[0].take_profit);
        assert_eq!(orders[0].stop_loss, orders[1].stop_loss);
        assert!(event_names(&h.orch).contains(&"order_submitted".to_string()));
    }

    #[tokio::test]
    async fn test_sector_cap_holds_across_strategies_within_tick() {
        let mut config = config(&["BAC", "XLF"]);
        config
            .exposure_limits
            .sector_max_positions
            .insert("finance".to_string(), 1);
        let h = harness(
            config,
            vec![
                slot("first", Universe::Core, Timeframe::Min15, 3, Some(Signal::buy(0.8))),
                slot("second", Universe::Core, Timeframe::Min5, 3, Some(Signal::buy(0.8))),
            ],
        );

        let report = h.orch.run_tick_at(session_time()).await;

        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.entries[0].strategy, "first");
        assert_eq!(ordered_symbols(&h.venue.submitted_orders().await), ["BAC", "BAC"]);
    }

    #[tokio::test]
    async fn test_existing_sector_exposure_counts_against_cap() {
        let h = harness(
            config(&["NVDA", "AMD", "SPY"]),
            vec![slot("trend", Universe::Core, Timeframe::Min15, 3, Some(Signal::buy(0.8)))],
        );
        // tech cap is 3 by default
        h.venue.add_position("AAPL", dec!(1), dec!(180)).await;
        h.venue.add_position("MSFT", dec!(1), dec!(400)).await;

        h.orch.run_tick_at(session_time()).await;

        let symbols = ordered_symbols(&h.venue.submitted_orders().await);
        assert_eq!(symbols, ["NVDA", "NVDA", "SPY", "SPY"]);
    }

    #[tokio::test]
    async fn test_max_positions_is_per_strategy() {
        let h = harness(
            config(&["SPY", "QQQ", "XLE"]),
            vec![
                slot("one", Universe::Core, Timeframe::Min15, 1, Some(Signal::buy(0.8))),
                slot("two", Universe::Core, Timeframe::Min5, 1, Some(Signal::buy(0.8))),
            ],
        );

        let report = h.orch.run_tick_at(session_time()).await;

        let entered: Vec<(&str, &str)> = report
            .entries
            .iter()
            .map(|e| (e.strategy.as_str(), e.symbol.as_str()))
            .collect();
        assert_eq!(entered, [("one", "SPY"), ("two", "QQQ")]);
    }

    #[tokio::test]
    async fn test_below_threshold_signal_is_ignored() {
        let h = harness(
            config(&["AAPL"]),
            vec![
                slot("weak_long", Universe::Core, Timeframe::Min15, 3, Some(Signal::buy(0.5))),
                slot("weak_short", Universe::Core, Timeframe::Min5, 3, Some(Signal::sell(0.54))),
            ],
        );

        let report = h.orch.run_tick_at(session_time()).await;

        assert!(report.entries.is_empty());
        assert_eq!(h.venue.call_count(), 1); // positions only
    }

    #[tokio::test]
    async fn test_cooldown_blocks_until_expiry() {
        let h = harness(
            config(&["AAPL", "MSFT"]),
            vec![slot("trend", Universe::Core, Timeframe::Min15, 3, Some(Signal::buy(0.8)))],
        );
        let now = session_time();
        h.orch
            .state
            .write()
            .await
            .cooldowns
            .insert("AAPL".to_string(), now + ChronoDuration::minutes(10));

        let report = h.orch.run_tick_at(now).await;
        let symbols: Vec<&str> = report.entries.iter().map(|e| e.symbol.as_str()).collect();
        assert_eq!(symbols, ["MSFT"]);

        // Eleven minutes later the entry is stale and AAPL is eligible again.
        let h2 = harness(
            config(&["AAPL"]),
            vec![slot("trend", Universe::Core, Timeframe::Min15, 3, Some(Signal::buy(0.8)))],
        );
        h2.orch
            .state
            .write()
            .await
            .cooldowns
            .insert("AAPL".to_string(), now + ChronoDuration::minutes(10));
        let report = h2.orch.run_tick_at(now + ChronoDuration::minutes(11)).await;
        assert_eq!(report.entries.len(), 1);
        assert_eq!(h2.orch.state.read().await.cooldowns.len(), 1);
    }

    #[tokio::test]
    async fn test_losing_trade_sets_cooldown() {
        let h = harness(
            config(&["TSLA"]),
            vec![slot("trend", Universe::Core, Timeframe::Min15, 3, Some(Signal::buy(0.8)))],
        );

        assert!(h.orch.record_closed_trade("trend", "TSLA", dec!(-42.5)).await);
        assert!(h.orch.record_closed_trade("trend", "NVDA", dec!(10)).await);
        assert!(!h.orch.record_closed_trade("unknown", "TSLA", dec!(-1)).await);

        let info = &h.orch.list_strategies()[0];
        assert_eq!((info.trades, info.wins, info.losses), (2, 1, 1));

        // The cooldown runs from wall-clock now, so a tick at the current time skips TSLA.
        let report = h.orch.run_tick_at(Utc::now()).await;
        assert!(report.skipped || report.entries.is_empty());
        assert!(h.venue.submitted_orders().await.is_empty());
        assert!(h.orch.state.read().await.cooldowns.contains_key("TSLA"));
        assert!(!h.orch.state.read().await.cooldowns.contains_key("NVDA"));
    }

    #[tokio::test]
    async fn test_drawdown_blocks_entry_and_alerts() {
        let h = harness(
            config(&["AAPL", "MSFT"]),
            vec![slot("trend", Universe::Core, Timeframe::Min15, 3, Some(Signal::buy(0.8)))],
        );
        h.venue.set_equity(dec!(96000), dec!(100000)).await;

        let report = h.orch.run_tick_at(session_time()).await;

        assert!(report
            .entries
            .iter()
            .all(|e| e.outcome == EntryOutcome::DrawdownBlocked));
        assert_eq!(report.entries.len(), 2);
        assert!(h.venue.submitted_orders().await.is_empty());
        assert!(h.alerts.events().contains(&"daily_dd_hit".to_string()));
        assert!(h.orch.gate.lock().await.daily_drawdown_hit());
    }

    #[tokio::test]
    async fn test_blocked_entries_use_up_strategy_slot() {
        let symbols = ["AAPL", "MSFT", "SPY", "QQQ"];
        let trend = || slot("trend", Universe::Core, Timeframe::Min15, 1, Some(Signal::buy(0.8)));

        let h = harness(config(&symbols), vec![trend()]);
        h.venue.set_equity(dec!(96000), dec!(100000)).await;
        let report = h.orch.run_tick_at(session_time()).await;

        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.entries[0].outcome, EntryOutcome::DrawdownBlocked);
        assert_eq!(h.alerts.events(), ["daily_dd_hit"]);
        // positions once, account once
        assert_eq!(h.venue.call_count(), 2);

        let h = harness(config(&symbols), vec![trend()]);
        h.venue.set_fail_account(true).await;
        let report = h.orch.run_tick_at(session_time()).await;

        assert_eq!(report.entries.len(), 1);
        assert_eq!(h.alerts.events(), ["account_failed"]);
        assert_eq!(h.venue.call_count(), 2);
    }

    #[tokio::test]
    async fn test_new_utc_day_resets_drawdown_latch() {
        let h = harness(
            config(&["AAPL"]),
            vec![slot("trend", Universe::Core, Timeframe::Min15, 3, Some(Signal::buy(0.8)))],
        );
        h.venue.set_equity(dec!(90000), dec!(100000)).await;
        h.orch.run_tick_at(session_time()).await;
        assert!(h.orch.gate.lock().await.daily_drawdown_hit());

        h.venue.set_equity(dec!(100000), dec!(100000)).await;
        let report = h
            .orch
            .run_tick_at(session_time() + ChronoDuration::days(1))
            .await;

        assert!(!h.orch.gate.lock().await.daily_drawdown_hit());
        assert!(matches!(report.entries[0].outcome, EntryOutcome::Submitted(_)));
        assert!(event_names(&h.orch).contains(&"daily_reset".to_string()));
    }

    #[tokio::test]
    async fn test_shadow_mode_logs_without_submitting() {
        let h = harness(
            config(&["AAPL", "MSFT"]),
            vec![slot("trend", Universe::Core, Timeframe::Min15, 1, Some(Signal::buy(0.8)))],
        );
        assert_eq!(h.orch.toggle_shadow("trend"), Some(true));
        assert_eq!(h.orch.toggle_shadow("missing"), None);

        let report = h.orch.run_tick_at(session_time()).await;

        // The shadow entry still uses up the strategy's single slot.
        assert_eq!(report.entries.len(), 1);
        assert!(matches!(report.entries[0].outcome, EntryOutcome::Shadowed(_)));
        assert!(h.venue.submitted_orders().await.is_empty());
        assert!(event_names(&h.orch).contains(&"shadow_signal".to_string()));
    }

    #[tokio::test]
    async fn test_order_failure_is_isolated() {
        let h = harness(
            config(&["AAPL", "MSFT"]),
            vec![slot("trend", Universe::Core, Timeframe::Min15, 3, Some(Signal::buy(0.8)))],
        );
        h.venue.reject_symbol("AAPL").await;

        let report = h.orch.run_tick_at(session_time()).await;

        assert!(matches!(
            report.entries[0].outcome,
            EntryOutcome::Failed { legs_submitted: 0, .. }
        ));
        assert!(matches!(report.entries[1].outcome, EntryOutcome::Submitted(_)));
        assert_eq!(ordered_symbols(&h.venue.submitted_orders().await), ["MSFT", "MSFT"]);
        assert_eq!(h.alerts.events(), ["order_failed"]);
        assert!(report.message.starts_with("degraded"));
    }

    #[tokio::test]
    async fn test_bar_failure_skips_only_that_symbol() {
        let bars = CountingBars {
            failing: ["AAPL".to_string()].into(),
            ..Default::default()
        };
        let h = harness_with(
            config(&["AAPL", "MSFT"]),
            vec![slot("trend", Universe::Core, Timeframe::Min15, 3, Some(Signal::buy(0.8)))],
            bars,
        );

        let report = h.orch.run_tick_at(session_time()).await;

        let symbols: Vec<&str> = report.entries.iter().map(|e| e.symbol.as_str()).collect();
        assert_eq!(symbols, ["MSFT"]);
        assert_eq!(report.errors.len(), 1);
        assert!(event_names(&h.orch).contains(&"bars_failed".to_string()));
    }

    #[tokio::test]
    async fn test_positions_failure_degrades_to_empty() {
        let h = harness(
            config(&["AAPL"]),
            vec![slot("trend", Universe::Core, Timeframe::Min15, 3, Some(Signal::buy(0.8)))],
        );
        h.venue.add_position("AAPL", dec!(5), dec!(180)).await;
        h.venue.set_fail_positions(true).await;

        let report = h.orch.run_tick_at(session_time()).await;

        // Nothing is known to be held, so the tick proceeds.
        assert!(matches!(report.entries[0].outcome, EntryOutcome::Submitted(_)));
        assert!(event_names(&h.orch).contains(&"positions_failed".to_string()));
    }

    #[tokio::test]
    async fn test_account_failure_abandons_entry() {
        let h = harness(
            config(&["AAPL"]),
            vec![slot("trend", Universe::Core, Timeframe::Min15, 3, Some(Signal::buy(0.8)))],
        );
        h.venue.set_fail_account(true).await;

        let report = h.orch.run_tick_at(session_time()).await;

        assert!(matches!(report.entries[0].outcome, EntryOutcome::Failed { .. }));
        assert!(h.venue.submitted_orders().await.is_empty());
        assert_eq!(h.alerts.events(), ["account_failed"]);
    }

    #[tokio::test]
    async fn test_panic_liquidates_and_halts_ticks() {
        let h = harness(
            config(&["AAPL"]),
            vec![slot("trend", Universe::Core, Timeframe::Min15, 3, Some(Signal::buy(0.8)))],
        );

        h.orch.panic().await;

        assert_eq!(h.venue.liquidation_calls().await, (1, 1));
        assert_eq!(h.orch.status().await.phase, RunPhase::Panicked);
        let venue_calls = h.venue.call_count();

        let report = h.orch.run_tick_at(session_time()).await;

        assert!(report.skipped);
        assert_eq!(h.bars.total_calls(), 0);
        assert_eq!(h.venue.call_count(), venue_calls);
        assert!(event_names(&h.orch).contains(&"panic_close".to_string()));
    }

    #[tokio::test]
    async fn test_panic_during_tick_stops_further_submissions() {
        let bars = Arc::new(PanicsOnPricing::default());
        let (orch, venue, _alerts) = build(
            config(&["AAPL", "SPY", "MSFT"]),
            vec![
                slot("trend", Universe::Core, Timeframe::Min15, 3, Some(Signal::buy(0.8))),
                slot("momo", Universe::Core, Timeframe::Min5, 3, Some(Signal::buy(0.8))),
            ],
            bars.clone(),
        );
        let _ = bars.orch.set(Arc::downgrade(&orch));

        let report = orch.run_tick_at(session_time()).await;

        assert_eq!(report.entries.len(), 1);
        assert_eq!(
            report.entries[0].outcome,
            EntryOutcome::Halted { legs_submitted: 0 }
        );
        assert_eq!(report.message, "halted: panic");
        assert!(venue.submitted_orders().await.is_empty());
        assert!(venue.open_positions(true).await.unwrap().is_empty());
        assert_eq!(venue.liquidation_calls().await, (1, 1));
        assert_eq!(orch.status().await.phase, RunPhase::Panicked);
    }

    #[tokio::test]
    async fn test_early_session_is_skipped() {
        let mut config = config(&["AAPL"]);
        config.risk.skip_minutes_after_open = 5;
        let h = harness(
            config,
            vec![slot("trend", Universe::Core, Timeframe::Min15, 3, Some(Signal::buy(0.8)))],
        );

        let two_minutes_in = Utc.with_ymd_and_hms(2024, 3, 4, 13, 32, 0).unwrap();
        let report = h.orch.run_tick_at(two_minutes_in).await;

        assert!(report.skipped);
        assert_eq!(report.message, SKIP_EARLY_SESSION);
        assert_eq!(h.bars.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_smallcap_watchlist_filters_in_universe_order() {
        let mut config = config(&[]);
        config.symbols_universe = ["SOFI", "PLTR", "NIO", "F", "RIVN"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let mut bars = MockBarSource::new();
        bars.expect_fetch_bars()
            .returning(|symbol, _start, _end, timeframe, _limit| {
                if timeframe != Timeframe::Day1 {
                    return Ok(zigzag_bars(100));
                }
                let (close, volume) = match symbol {
                    "SOFI" => (8.4, 2_000_000.0),
                    "PLTR" => (25.0, 5_000_000.0),
                    "NIO" => (5.0, 100_000.0),
                    "F" => (12.0, 3_000_000.0),
                    _ => anyhow::bail!("no daily data for {}", symbol),
                };
                let mut bar = zigzag_bars(1).remove(0);
                bar.close = close;
                bar.volume = volume;
                Ok(vec![bar])
            });

        let (orch, _venue, _alerts) = build(
            config,
            vec![slot("smallcap_scalper", Universe::SmallCap, Timeframe::Min2, 5, None)],
            Arc::new(bars),
        );

        let report = orch.run_tick_at(session_time()).await;

        assert_eq!(report.watchlist, ["SOFI", "F"]);
        assert_eq!(report.fetched_pairs, 2);
        assert!(event_names(&orch).contains(&"watchlist_failed".to_string()));
    }

    #[tokio::test]
    async fn test_constructor_rejects_duplicate_names() {
        let config = config(&["AAPL"]);
        let events = Arc::new(EventLog::open(&config.state_dir).unwrap());
        let result = Orchestrator::new(
            config,
            vec![
                slot("dup", Universe::Core, Timeframe::Min15, 1, None),
                slot("dup", Universe::Core, Timeframe::Min5, 1, None),
            ],
            Arc::new(CountingBars::default()),
            Arc::new(PaperVenue::new(dec!(1000))),
            Arc::new(RecordingAlerts::default()),
            events,
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_control_surface_lookups() {
        let h = harness(
            config(&["AAPL"]),
            vec![
                slot("a", Universe::Core, Timeframe::Min15, 3, None),
                slot("b", Universe::Core, Timeframe::Min5, 2, None),
            ],
        );

        assert!(!h.orch.set_strategy_enabled("zzz", true));
        assert!(h.orch.set_strategy_enabled("b", false));

        let infos = h.orch.list_strategies();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].name, "a");
        assert!(infos[0].enabled);
        assert!(!infos[1].enabled);
        assert_eq!(infos[1].max_positions, 2);

        let names = event_names(&h.orch);
        assert_eq!(names, ["strategy_disabled"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_start_stop_lifecycle() {
        let h = harness(
            config(&["AAPL"]),
            vec![slot("trend", Universe::Core, Timeframe::Min15, 1, None)],
        );

        assert!(h.orch.start().await);
        assert!(!h.orch.start().await);

        tokio::time::sleep(Duration::from_secs(150)).await;

        let status = h.orch.status().await;
        assert_eq!(status.phase, RunPhase::Running);
        assert!(status.last_tick.is_some());
        assert!(status.last_error.is_none());
        assert!(h.bars.feature_calls().len() >= 2);

        h.orch.stop().await;
        h.orch.wait_stopped().await;

        assert_eq!(h.orch.status().await.phase, RunPhase::Stopped);
        let names = event_names(&h.orch);
        assert_eq!(names.first().map(String::as_str), Some("loop_started"));
        assert_eq!(names.last().map(String::as_str), Some("loop_stopped"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_supersedes_sleeping_loop() {
        let h = harness(
            config(&["AAPL"]),
            vec![slot("trend", Universe::Core, Timeframe::Min15, 1, None)],
        );

        assert!(h.orch.start().await);
        tokio::time::sleep(Duration::from_secs(10)).await;
        h.orch.stop().await;
        h.bars.clear();
        assert!(h.orch.start().await);

        tokio::time::sleep(Duration::from_secs(100)).await;

        // A single scheduler ticks at +0s and +60s.
        assert_eq!(h.bars.feature_calls().len(), 2);

        h.orch.stop().await;
        h.orch.wait_stopped().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_strategy_panic_does_not_kill_the_loop() {
        let config = config(&["AAPL"]);
        let explodes = StrategySlot::new(
            "explodes",
            Box::new(Explodes),
            StrategyParams {
                timeframe: Timeframe::Min15,
                universe: Universe::Core,
                exits: ExitTargets::for_strategy("explodes"),
                max_positions: 1,
            },
            dec!(0.1),
        );
        let h = harness(config, vec![explodes]);

        assert!(h.orch.start().await);
        tokio::time::sleep(Duration::from_secs(5)).await;

        let status = h.orch.status().await;
        assert_eq!(status.phase, RunPhase::Running);
        assert_eq!(status.last_message, "error");
        assert!(status.last_error.is_some());
        assert!(h.alerts.events().contains(&"loop_error".to_string()));

        h.orch.stop().await;
        h.orch.wait_stopped().await;
    }
}
