//! Operator commands accepted while the loop runs.
//!
//! Each input line is parsed like a command line, e.g. `disable aggr_momentum`
//! or `closed balanced_trend TSLA -42.10`, and answered with a JSON value.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde_json::{json, Value};

use super::Orchestrator;

#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_help_flag = true, disable_version_flag = true)]
struct ControlLine {
    #[command(subcommand)]
    command: ControlCommand,
}

/// One operator command.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ControlCommand {
    /// Show the run status
    Status,
    /// Cancel all orders, close all positions and halt trading
    Panic,
    /// List strategies with their flags and counters
    Strategies,
    /// Enable a strategy
    Enable { name: String },
    /// Disable a strategy
    Disable { name: String },
    /// Flip a strategy's shadow mode
    Shadow { name: String },
    /// Record an exit observed outside the loop
    Closed {
        strategy: String,
        symbol: String,
        #[arg(allow_negative_numbers = true)]
        pnl: Decimal,
    },
    /// Tail the event log
    Logs {
        #[arg(default_value = "20")]
        n: usize,
    },
}

impl ControlCommand {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse_line(line: &str) -> Result<Option<Self>> {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            return Ok(None);
        }
        let parsed = ControlLine::try_parse_from(words).context("Invalid control command")?;
        Ok(Some(parsed.command))
    }
}

impl Orchestrator {
    /// Apply an operator command and describe the result.
    pub async fn execute(&self, command: ControlCommand) -> Result<Value> {
        match command {
            ControlCommand::Status => Ok(serde_json::to_value(self.status().await)?),
            ControlCommand::Panic => {
                self.panic().await;
                Ok(json!({ "panic": true }))
            }
            ControlCommand::Strategies => Ok(serde_json::to_value(self.list_strategies())?),
            ControlCommand::Enable { name } => self.apply_enabled(&name, true),
            ControlCommand::Disable { name } => self.apply_enabled(&name, false),
            ControlCommand::Shadow { name } => {
                let shadow = self
                    .toggle_shadow(&name)
                    .with_context(|| format!("Unknown strategy: {}", name))?;
                Ok(json!({ "strategy": name, "shadow": shadow }))
            }
            ControlCommand::Closed {
                strategy,
                symbol,
                pnl,
            } => {
                anyhow::ensure!(
                    self.record_closed_trade(&strategy, &symbol, pnl).await,
                    "Unknown strategy: {}",
                    strategy
                );
                Ok(json!({ "strategy": strategy, "symbol": symbol, "pnl": pnl.to_string() }))
            }
            ControlCommand::Logs { n } => Ok(serde_json::to_value(self.tail_events(n)?)?),
        }
    }

    fn apply_enabled(&self, name: &str, enabled: bool) -> Result<Value> {
        anyhow::ensure!(
            self.set_strategy_enabled(name, enabled),
            "Unknown strategy: {}",
            name
        );
        Ok(json!({ "strategy": name, "enabled": enabled }))
    }
}
