//! In-memory paper venue for simulated trading and tests.

use super::traits::ExecutionVenue;
use super::types::*;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Simulated position.
#[derive(Debug, Clone)]
pub struct PaperPosition {
    pub symbol: String,
    /// Signed share count (negative = short)
    pub qty: Decimal,
    pub entry_price: Decimal,
    pub opened_at: DateTime<Utc>,
}

/// Mutable venue state.
#[derive(Debug, Default)]
pub struct PaperState {
    pub equity: Decimal,
    pub last_equity: Decimal,
    pub positions: HashMap<String, PaperPosition>,
    /// Every accepted bracket, in submission order
    pub orders: Vec<BracketOrder>,
    pub open_order_count: usize,
    pub cancel_all_calls: u64,
    pub close_all_calls: u64,
    fail_account: bool,
    fail_positions: bool,
    rejected_symbols: HashSet<String>,
}

/// Venue that fills every bracket entry immediately at its reference price.
pub struct PaperVenue {
    state: Arc<RwLock<PaperState>>,
    order_id_counter: AtomicU64,
    /// Total remote-style calls served, including failed ones
    calls: AtomicU64,
}

impl PaperVenue {
    /// Create a new paper venue with flat equity.
    pub fn new(initial_equity: Decimal) -> Self {
        let state = PaperState {
            equity: initial_equity,
            last_equity: initial_equity,
            ..Default::default()
        };

        Self {
            state: Arc::new(RwLock::new(state)),
            order_id_counter: AtomicU64::new(1),
            calls: AtomicU64::new(0),
        }
    }

    /// Override current and previous-close equity.
    pub async fn set_equity(&self, equity: Decimal, last_equity: Decimal) {
        let mut state = self.state.write().await;
        state.equity = equity;
        state.last_equity = last_equity;
    }

    /// Seed an existing position.
    pub async fn add_position(&self, symbol: &str, qty: Decimal, entry_price: Decimal) {
        self.state.write().await.positions.insert(
            symbol.to_string(),
            PaperPosition {
                symbol: symbol.to_string(),
                qty,
                entry_price,
                opened_at: Utc::now(),
            },
        );
    }

    /// Make account lookups fail.
    pub async fn set_fail_account(&self, fail: bool) {
        self.state.write().await.fail_account = fail;
    }

    /// Make position listing fail.
    pub async fn set_fail_positions(&self, fail: bool) {
        self.state.write().await.fail_positions = fail;
    }

    /// Reject every bracket submitted for `symbol`.
    pub async fn reject_symbol(&self, symbol: &str) {
        self.state
            .write()
            .await
            .rejected_symbols
            .insert(symbol.to_string());
    }

    /// Accepted orders so far.
    pub async fn submitted_orders(&self) -> Vec<BracketOrder> {
        self.state.read().await.orders.clone()
    }

    /// Snapshot of `(cancel_all_calls, close_all_calls)`.
    pub async fn liquidation_calls(&self) -> (u64, u64) {
        let state = self.state.read().await;
        (state.cancel_all_calls, state.close_all_calls)
    }

    /// Number of venue calls served.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_order_id(&self) -> u64 {
        self.order_id_counter.fetch_add(1, Ordering::SeqCst)
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ExecutionVenue for PaperVenue {
    async fn account(&self, _paper: bool) -> Result<AccountSnapshot> {
        self.record_call();
        let state = self.state.read().await;
        anyhow::ensure!(!state.fail_account, "simulated account outage");

        Ok(AccountSnapshot {
            equity: state.equity,
            last_equity: state.last_equity,
        })
    }

    async fn open_positions(&self, _paper: bool) -> Result<Vec<OpenPosition>> {
        self.record_call();
        let state = self.state.read().await;
        anyhow::ensure!(!state.fail_positions, "simulated positions outage");

        Ok(state
            .positions
            .values()
            .filter(|p| !p.qty.is_zero())
            .map(|p| OpenPosition {
                symbol: p.symbol.clone(),
                qty: p.qty.abs(),
                side: Some(if p.qty > Decimal::ZERO { "long" } else { "short" }.to_string()),
                avg_entry_price: Some(p.entry_price),
            })
            .collect())
    }

    async fn submit_bracket(
        &self,
        order: &BracketOrder,
        _paper: bool,
    ) -> Result<OrderRecord, VenueError> {
        self.record_call();
        let mut state = self.state.write().await;

        if state.rejected_symbols.contains(&order.symbol) {
            return Err(VenueError::Rejected {
                status: 422,
                body: format!("simulated rejection for {}", order.symbol),
            });
        }

        let signed = match order.side {
            OrderSide::Buy => Decimal::from(order.qty),
            OrderSide::Sell => -Decimal::from(order.qty),
        };

        let position = state
            .positions
            .entry(order.symbol.clone())
            .or_insert_with(|| PaperPosition {
                symbol: order.symbol.clone(),
                qty: Decimal::ZERO,
                entry_price: order.reference_price,
                opened_at: Utc::now(),
            });
        position.qty += signed;
        position.entry_price = order.reference_price;

        state.orders.push(order.clone());
        // Each bracket leaves a take-profit and a stop-loss child working.
        state.open_order_count += 2;

        let order_id = self.next_order_id();

        info!(
            order_id,
            symbol = %order.symbol,
            side = %order.side,
            qty = order.qty,
            price = %order.reference_price,
            take_profit = %order.take_profit,
            stop_loss = %order.stop_loss,
            "Paper bracket order filled"
        );

        Ok(OrderRecord {
            id: format!("paper-{}", order_id),
            client_order_id: String::new(),
            symbol: order.symbol.clone(),
            status: "filled".to_string(),
        })
    }

    async fn cancel_all_orders(&self, _paper: bool) {
        self.record_call();
        let mut state = self.state.write().await;
        state.cancel_all_calls += 1;
        state.open_order_count = 0;
        debug!("Paper venue cancelled all orders");
    }

    async fn close_all_positions(&self, _paper: bool) {
        self.record_call();
        let mut state = self.state.write().await;
        state.close_all_calls += 1;
        state.positions.clear();
        debug!("Paper venue closed all positions");
    }
}
