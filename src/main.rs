//! Strategy Orchestrator - Main Entry Point
//!
//! Runs the multi-strategy loop against the Alpaca-style venue, or against the
//! in-memory paper venue with `run --simulate`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use strategy_orchestrator::config::Config;
use strategy_orchestrator::events::EventLog;
use strategy_orchestrator::exchange::{
    AlertSink, AlpacaTradingClient, ExecutionVenue, PaperVenue, WebhookAlerter,
};
use strategy_orchestrator::market::AlpacaDataClient;
use strategy_orchestrator::orchestrator::{ControlCommand, Orchestrator, RunPhase};
use strategy_orchestrator::strategy::default_slots;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Strategy Orchestrator CLI
#[derive(Parser)]
#[command(name = "strategy-orchestrator")]
#[command(version, about = "Multi-strategy equity trading orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the orchestration loop (default)
    Run {
        /// Route orders to the in-memory paper venue instead of the REST venue
        #[arg(long)]
        simulate: bool,

        /// Starting equity for the simulated venue
        #[arg(long, default_value = "100000")]
        equity: Decimal,
    },

    /// Print the last records of the event log
    Logs {
        /// Number of records
        #[arg(short, long, default_value = "30")]
        n: usize,
    },

    /// Show the configured strategies and their startup flags
    Strategies,
}

/// How often the foreground task logs a status line while the loop runs.
const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;
    config.validate()?;

    init_logging(&config.state_dir)?;

    match cli.command.unwrap_or(Commands::Run {
        simulate: false,
        equity: Decimal::new(100_000, 0),
    }) {
        Commands::Run { simulate, equity } => run(config, simulate, equity).await,
        Commands::Logs { n } => show_logs(&config, n),
        Commands::Strategies => show_strategies(&config),
    }
}

async fn run(config: Config, simulate: bool, equity: Decimal) -> Result<()> {
    info!("╔════════════════════════════════════════════════════════════╗");
    info!(
        "║           Strategy Orchestrator v{}                     ║",
        env!("CARGO_PKG_VERSION")
    );
    info!("╚════════════════════════════════════════════════════════════╝");

    log_config(&config);

    let venue: Arc<dyn ExecutionVenue> = if simulate {
        info!(%equity, "📝 SIMULATED VENUE - orders stay in memory");
        Arc::new(PaperVenue::new(equity))
    } else {
        if config.paper {
            info!("📝 PAPER ACCOUNT - orders go to the paper endpoint");
        } else {
            warn!("⚠️  LIVE ACCOUNT - Real money at risk!");
        }
        if config.alpaca.key_id.is_empty() {
            warn!("⚠️  No API key configured; venue requests will be rejected");
        }
        Arc::new(AlpacaTradingClient::new(&config.alpaca)?)
    };

    let bars = Arc::new(AlpacaDataClient::new(&config.alpaca)?);
    let alerter = WebhookAlerter::new(&config.alerts)?;
    if !alerter.is_enabled() {
        info!("No alert webhook configured; alerts are dropped");
    }
    let alerts: Arc<dyn AlertSink> = Arc::new(alerter);
    let events = Arc::new(EventLog::open(&config.state_dir)?);

    let slots = default_slots(&config);
    let orchestrator = Arc::new(Orchestrator::new(
        config, slots, bars, venue, alerts, events,
    )?);

    orchestrator.start().await;
    info!("🚀 Orchestration loop running, Ctrl-C to stop");
    info!("⌨️  Commands on stdin: status, panic, strategies, enable|disable|shadow <name>, closed <strategy> <symbol> <pnl>, logs [n]");

    let mut status_timer = tokio::time::interval(STATUS_LOG_INTERVAL);
    status_timer.tick().await;

    let mut commands = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("🛑 Shutdown signal received");
                break;
            }
            line = commands.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => handle_command(&orchestrator, &line).await,
                    Ok(None) => {
                        debug!("stdin closed, operator commands disabled");
                        stdin_open = false;
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to read stdin, operator commands disabled");
                        stdin_open = false;
                    }
                }
            }
            _ = status_timer.tick() => {
                let status = orchestrator.status().await;
                info!(
                    phase = ?status.phase,
                    last_tick = ?status.last_tick,
                    last_message = %status.last_message,
                    last_error = ?status.last_error,
                    "📊 Status"
                );
                if status.phase == RunPhase::Panicked {
                    warn!("Panic latched; restart the process to resume trading");
                }
            }
        }
    }

    orchestrator.stop().await;
    orchestrator.wait_stopped().await;
    info!("👋 Strategy Orchestrator shutdown complete");
    Ok(())
}

async fn handle_command(orchestrator: &Orchestrator, line: &str) {
    let command = match ControlCommand::parse_line(line) {
        Ok(Some(command)) => command,
        Ok(None) => return,
        Err(e) => {
            warn!("{:#}", e);
            return;
        }
    };

    info!(?command, "Operator command");
    match orchestrator.execute(command).await {
        Ok(reply) => println!("{}", reply),
        Err(e) => warn!("{:#}", e),
    }
}

fn show_logs(config: &Config, n: usize) -> Result<()> {
    let events = EventLog::open(&config.state_dir)?;
    for record in events.tail(n)? {
        let line = serde_json::to_string(&record).context("Failed to format event")?;
        println!("{}", line);
    }
    Ok(())
}

fn show_strategies(config: &Config) -> Result<()> {
    let infos: Vec<_> = default_slots(config).iter().map(|s| s.info()).collect();
    println!("{}", serde_json::to_string_pretty(&infos)?);
    Ok(())
}

/// Initialize logging to stdout and an hourly rolling file under `<state_dir>/logs`.
fn init_logging(state_dir: &str) -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    let log_dir = std::path::Path::new(state_dir).join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log dir {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::hourly(&log_dir, "orchestrator.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Keep the writer guard alive for the program duration
    Box::leak(Box::new(guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("strategy_orchestrator=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    Ok(())
}

/// Log configuration on startup.
fn log_config(config: &Config) {
    info!("📋 Configuration:");
    info!("   Interval: {}s", config.interval_sec);
    info!("   Account: {}", if config.paper { "paper" } else { "live" });
    info!("   Core symbols: {}", config.symbols_core.join(", "));
    info!("   Small-cap universe: {} symbols", config.symbols_universe.len());
    info!(
        "   Max daily drawdown: {}%",
        config.risk.max_daily_drawdown_pct
    );
    info!(
        "   Equity cap: ${}, risk per trade: {}",
        config.risk.equity_cap, config.risk.per_trade_risk_frac
    );
    info!(
        "   Confidence thresholds: long {}, short {}",
        config.router.prob_long_thresh, config.router.prob_short_thresh
    );
    if !config.disabled_strategies.is_empty() {
        info!("   Disabled: {}", config.disabled_strategies.join(", "));
    }
    if !config.shadow_strategies.is_empty() {
        info!("   Shadow: {}", config.shadow_strategies.join(", "));
    }
}
