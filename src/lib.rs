//! # Strategy Orchestrator
//!
//! A periodic decision loop that shares one account's risk budget across
//! several independent equity strategies and dispatches split bracket orders.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `market`: Bars, feature engineering, session clock and the data client
//! - `exchange`: Execution venue and alert seams, Alpaca-style REST client, paper venue
//! - `strategy`: Signal rules, strategy slots and split-bracket construction
//! - `risk`: Daily drawdown latch, sector caps, cooldowns and position sizing
//! - `events`: Append-only JSON-lines event log
//! - `orchestrator`: The tick procedure, run loop and control surface

pub mod config;
pub mod events;
pub mod exchange;
pub mod market;
pub mod orchestrator;
pub mod risk;
pub mod strategy;

pub use config::Config;
pub use orchestrator::Orchestrator;
