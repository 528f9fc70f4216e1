//! Configuration management for the strategy orchestrator.
//!
//! Loads settings from environment variables and config files once at startup.
//! There is no hot reload.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Seconds between tick completions
    #[serde(default = "default_interval_sec")]
    pub interval_sec: u64,
    /// Route orders to the paper venue instead of the live one
    #[serde(default = "default_paper")]
    pub paper: bool,
    /// Directory holding the event log and rolling diagnostics
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
    /// Large-cap symbols traded by the trend and momentum strategies
    #[serde(default = "default_symbols_core")]
    pub symbols_core: Vec<String>,
    /// Candidate symbols filtered into the small-cap watchlist each tick
    #[serde(default = "default_symbols_universe")]
    pub symbols_universe: Vec<String>,
    /// Advisory capital fraction per strategy name
    #[serde(default = "default_allocations")]
    pub allocations: HashMap<String, Decimal>,
    /// Strategies registered but disabled at startup
    #[serde(default)]
    pub disabled_strategies: Vec<String>,
    /// Strategies registered in shadow mode at startup
    #[serde(default)]
    pub shadow_strategies: Vec<String>,
    #[serde(default)]
    pub watchlist: WatchlistConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub exposure_limits: ExposureConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub alpaca: AlpacaConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistConfig {
    /// Highest last close a small-cap candidate may have
    #[serde(default = "default_smallcap_max_price")]
    pub smallcap_max_price: Decimal,
    /// Lowest last daily volume a small-cap candidate may have
    #[serde(default = "default_smallcap_min_vol")]
    pub smallcap_min_vol: Decimal,
    /// Watchlist is truncated to this many symbols, in universe order
    #[serde(default = "default_watchlist_max_symbols")]
    pub max_symbols: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Daily equity drop, in percent, that blocks new entries
    #[serde(default = "default_max_daily_drawdown_pct")]
    pub max_daily_drawdown_pct: Decimal,
    /// Capital ceiling used by the position sizer
    #[serde(default = "default_equity_cap")]
    pub equity_cap: Decimal,
    /// Fraction of the capital ceiling risked per trade (0.0-1.0)
    #[serde(default = "default_per_trade_risk_frac")]
    pub per_trade_risk_frac: Decimal,
    /// Minutes after the session open during which no strategy runs (0 = never skip)
    #[serde(default = "default_skip_minutes_after_open")]
    pub skip_minutes_after_open: u32,
    /// Cooldown applied to a symbol after a losing exit
    #[serde(default = "default_loss_cooldown_minutes")]
    pub loss_cooldown_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExposureConfig {
    /// Maximum simultaneous open positions per sector tag
    #[serde(default = "default_sector_max_positions")]
    pub sector_max_positions: HashMap<String, usize>,
    /// Cap for sectors missing from `sector_max_positions`
    #[serde(default = "default_sector_max")]
    pub default_sector_max: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Minimum confidence for a long entry
    #[serde(default = "default_prob_thresh")]
    pub prob_long_thresh: f64,
    /// Minimum confidence for a short entry
    #[serde(default = "default_prob_thresh")]
    pub prob_short_thresh: f64,
    /// Runner leg target = tp_pct * (1 + trail_extra_tp_pct)
    #[serde(default = "default_trail_extra_tp_pct")]
    pub trail_extra_tp_pct: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Days of history requested for feature computation
    #[serde(default = "default_history_days")]
    pub history_days: i64,
    /// Bar limit per request
    #[serde(default = "default_bar_limit")]
    pub bar_limit: u32,
    /// Concurrent (symbol, timeframe) fetches per tick
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Regular session open, UTC hour
    #[serde(default = "default_open_hour")]
    pub open_hour_utc: u32,
    #[serde(default = "default_open_minute")]
    pub open_minute_utc: u32,
    /// Regular session close, UTC hour
    #[serde(default = "default_close_hour")]
    pub close_hour_utc: u32,
    #[serde(default)]
    pub close_minute_utc: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlpacaConfig {
    #[serde(default)]
    pub key_id: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default = "default_paper_base_url")]
    pub paper_base_url: String,
    #[serde(default = "default_live_base_url")]
    pub live_base_url: String,
    #[serde(default = "default_data_base_url")]
    pub data_base_url: String,
    /// Upper bound on any single venue or data request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Webhook receiving `{event, payload}` posts; alerts are dropped when unset
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_alert_timeout")]
    pub timeout_secs: u64,
}

// Default value functions
fn default_interval_sec() -> u64 {
    60
}

fn default_paper() -> bool {
    true
}

fn default_state_dir() -> String {
    "./state".to_string()
}

fn default_symbols_core() -> Vec<String> {
    ["SPY", "QQQ", "AAPL", "MSFT", "NVDA", "AMD", "META", "TSLA", "XLF", "XLE"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_symbols_universe() -> Vec<String> {
    ["SOFI", "PLTR", "NIO", "F", "SNAP", "RIVN", "LCID", "AAL", "CCL", "BAC"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_allocations() -> HashMap<String, Decimal> {
    HashMap::from([
        ("balanced_trend".to_string(), Decimal::new(40, 2)),
        ("smallcap_scalper".to_string(), Decimal::new(30, 2)),
        ("aggr_momentum".to_string(), Decimal::new(30, 2)),
    ])
}

fn default_smallcap_max_price() -> Decimal {
    Decimal::new(20, 0) // $20
}

fn default_smallcap_min_vol() -> Decimal {
    Decimal::new(1_000_000, 0) // 1M shares
}

fn default_watchlist_max_symbols() -> usize {
    20
}

fn default_max_daily_drawdown_pct() -> Decimal {
    Decimal::new(3, 0) // 3%
}

fn default_equity_cap() -> Decimal {
    Decimal::new(20_000, 0)
}

fn default_per_trade_risk_frac() -> Decimal {
    Decimal::new(1, 2) // 0.01
}

fn default_skip_minutes_after_open() -> u32 {
    5
}

fn default_loss_cooldown_minutes() -> i64 {
    30
}

fn default_sector_max_positions() -> HashMap<String, usize> {
    HashMap::from([
        ("tech".to_string(), 3),
        ("finance".to_string(), 2),
        ("energy".to_string(), 2),
        ("broad".to_string(), 2),
    ])
}

fn default_sector_max() -> usize {
    2
}

fn default_prob_thresh() -> f64 {
    0.55
}

fn default_trail_extra_tp_pct() -> Decimal {
    Decimal::new(5, 1) // runner target 1.5x the quick target
}

fn default_history_days() -> i64 {
    10
}

fn default_bar_limit() -> u32 {
    1000
}

fn default_max_concurrent() -> usize {
    8
}

fn default_open_hour() -> u32 {
    13
}

fn default_open_minute() -> u32 {
    30
}

fn default_close_hour() -> u32 {
    20
}

fn default_paper_base_url() -> String {
    "https://paper-api.alpaca.markets".to_string()
}

fn default_live_base_url() -> String {
    "https://api.alpaca.markets".to_string()
}

fn default_data_base_url() -> String {
    "https://data.alpaca.markets".to_string()
}

fn default_request_timeout() -> u64 {
    20
}

fn default_alert_timeout() -> u64 {
    10
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .prefix("ORCH")
                    .list_separator(",")
                    .with_list_parse_key("symbols_core")
                    .with_list_parse_key("symbols_universe")
                    .with_list_parse_key("disabled_strategies")
                    .with_list_parse_key("shadow_strategies")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.interval_sec > 0, "interval_sec must be positive");

        anyhow::ensure!(
            self.risk.per_trade_risk_frac > Decimal::ZERO
                && self.risk.per_trade_risk_frac <= Decimal::ONE,
            "per_trade_risk_frac must be between 0 and 1"
        );

        anyhow::ensure!(
            self.risk.max_daily_drawdown_pct > Decimal::ZERO
                && self.risk.max_daily_drawdown_pct <= Decimal::ONE_HUNDRED,
            "max_daily_drawdown_pct must be between 0 and 100"
        );

        anyhow::ensure!(
            self.risk.equity_cap > Decimal::ZERO,
            "equity_cap must be positive"
        );

        anyhow::ensure!(
            (0.0..=1.0).contains(&self.router.prob_long_thresh)
                && (0.0..=1.0).contains(&self.router.prob_short_thresh),
            "confidence thresholds must be between 0 and 1"
        );

        // The runner target has to sit beyond the quick target.
        anyhow::ensure!(
            self.router.trail_extra_tp_pct > Decimal::ZERO,
            "trail_extra_tp_pct must be positive"
        );

        anyhow::ensure!(
            self.fetch.max_concurrent >= 1,
            "fetch.max_concurrent must be at least 1"
        );

        anyhow::ensure!(
            self.session.open_hour_utc < 24
                && self.session.close_hour_utc < 24
                && self.session.open_minute_utc < 60
                && self.session.close_minute_utc < 60,
            "session times must be valid UTC clock times"
        );

        Ok(())
    }

    /// Advisory allocation for a strategy, zero when unconfigured.
    pub fn allocation_for(&self, strategy: &str) -> Decimal {
        self.allocations
            .get(strategy)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_sec: default_interval_sec(),
            paper: default_paper(),
            state_dir: default_state_dir(),
            symbols_core: default_symbols_core(),
            symbols_universe: default_symbols_universe(),
            allocations: default_allocations(),
            disabled_strategies: Vec::new(),
            shadow_strategies: Vec::new(),
            watchlist: WatchlistConfig::default(),
            risk: RiskConfig::default(),
            exposure_limits: ExposureConfig::default(),
            router: RouterConfig::default(),
            fetch: FetchConfig::default(),
            session: SessionConfig::default(),
            alpaca: AlpacaConfig::default(),
            alerts: AlertConfig::default(),
        }
    }
}

impl Default for WatchlistConfig {
    fn default() -> Self {
        Self {
            smallcap_max_price: default_smallcap_max_price(),
            smallcap_min_vol: default_smallcap_min_vol(),
            max_symbols: default_watchlist_max_symbols(),
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_daily_drawdown_pct: default_max_daily_drawdown_pct(),
            equity_cap: default_equity_cap(),
            per_trade_risk_frac: default_per_trade_risk_frac(),
            skip_minutes_after_open: default_skip_minutes_after_open(),
            loss_cooldown_minutes: default_loss_cooldown_minutes(),
        }
    }
}

impl Default for ExposureConfig {
    fn default() -> Self {
        Self {
            sector_max_positions: default_sector_max_positions(),
            default_sector_max: default_sector_max(),
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            prob_long_thresh: default_prob_thresh(),
            prob_short_thresh: default_prob_thresh(),
            trail_extra_tp_pct: default_trail_extra_tp_pct(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            history_days: default_history_days(),
            bar_limit: default_bar_limit(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            open_hour_utc: default_open_hour(),
            open_minute_utc: default_open_minute(),
            close_hour_utc: default_close_hour(),
            close_minute_utc: 0,
        }
    }
}

impl Default for AlpacaConfig {
    fn default() -> Self {
        Self {
            key_id: String::new(),
            secret_key: String::new(),
            paper_base_url: default_paper_base_url(),
            live_base_url: default_live_base_url(),
            data_base_url: default_data_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: default_alert_timeout(),
        }
    }
}
