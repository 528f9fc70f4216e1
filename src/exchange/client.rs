//! Alpaca-style trading REST client.

use crate::config::AlpacaConfig;
use crate::exchange::traits::ExecutionVenue;
use crate::exchange::types::*;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use rust_decimal::Decimal;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Wire body for a bracket order.
#[derive(Debug, Serialize)]
struct BracketOrderRequest<'a> {
    symbol: &'a str,
    qty: String,
    side: OrderSide,
    #[serde(rename = "type")]
    order_type: &'static str,
    time_in_force: &'static str,
    order_class: &'static str,
    take_profit: TakeProfitLeg,
    stop_loss: StopLossLeg,
}

#[derive(Debug, Serialize)]
struct TakeProfitLeg {
    limit_price: Decimal,
}

#[derive(Debug, Serialize)]
struct StopLossLeg {
    stop_price: Decimal,
}

impl<'a> BracketOrderRequest<'a> {
    fn from_order(order: &'a BracketOrder) -> Self {
        Self {
            symbol: &order.symbol,
            qty: order.qty.to_string(),
            side: order.side,
            order_type: "market",
            time_in_force: "day",
            order_class: "bracket",
            take_profit: TakeProfitLeg {
                limit_price: order.take_profit.round_dp(2),
            },
            stop_loss: StopLossLeg {
                stop_price: order.stop_loss.round_dp(2),
            },
        }
    }
}

/// Trading API client serving both paper and live accounts.
pub struct AlpacaTradingClient {
    http: Client,
    key_id: String,
    secret_key: String,
    paper_base_url: String,
    live_base_url: String,
}

impl AlpacaTradingClient {
    /// Create a new trading client from configuration.
    pub fn new(config: &AlpacaConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            key_id: config.key_id.clone(),
            secret_key: config.secret_key.clone(),
            paper_base_url: config.paper_base_url.trim_end_matches('/').to_string(),
            live_base_url: config.live_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn base(&self, paper: bool) -> &str {
        if paper {
            &self.paper_base_url
        } else {
            &self.live_base_url
        }
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("APCA-API-KEY-ID", &self.key_id)
            .header("APCA-API-SECRET-KEY", &self.secret_key)
    }

    /// Fire a DELETE and only log the outcome.
    async fn best_effort_delete(&self, url: String, what: &str) {
        match self.authed(self.http.delete(&url)).send().await {
            Ok(resp) if resp.status().is_success() => debug!(%url, "{} succeeded", what),
            Ok(resp) => warn!(%url, status = %resp.status(), "{} returned non-success", what),
            Err(e) => warn!(%url, error = %e, "{} failed", what),
        }
    }
}

#[async_trait]
impl ExecutionVenue for AlpacaTradingClient {
    #[instrument(skip(self))]
    async fn account(&self, paper: bool) -> Result<AccountSnapshot> {
        let url = format!("{}/v2/account", self.base(paper));
        let response = self
            .authed(self.http.get(&url))
            .send()
            .await
            .context("Failed to fetch account")?
            .error_for_status()
            .context("Account request rejected")?;

        response
            .json()
            .await
            .context("Failed to parse account response")
    }

    #[instrument(skip(self))]
    async fn open_positions(&self, paper: bool) -> Result<Vec<OpenPosition>> {
        let url = format!("{}/v2/positions", self.base(paper));
        let response = self
            .authed(self.http.get(&url))
            .send()
            .await
            .context("Failed to fetch positions")?
            .error_for_status()
            .context("Positions request rejected")?;

        response
            .json()
            .await
            .context("Failed to parse positions response")
    }

    #[instrument(skip(self, order), fields(symbol = %order.symbol, qty = order.qty, side = %order.side))]
    async fn submit_bracket(
        &self,
        order: &BracketOrder,
        paper: bool,
    ) -> Result<OrderRecord, VenueError> {
        let url = format!("{}/v2/orders", self.base(paper));
        let body = BracketOrderRequest::from_order(order);

        debug!("Submitting bracket order: {:?}", body);

        let response = self.authed(self.http.post(&url)).json(&body).send().await?;

        let status = response.status();
        if status.as_u16() >= 300 {
            let body = response.text().await.unwrap_or_default();
            return Err(VenueError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| VenueError::Decode(e.to_string()))
    }

    async fn cancel_all_orders(&self, paper: bool) {
        let url = format!("{}/v2/orders", self.base(paper));
        self.best_effort_delete(url, "Cancel all orders").await;
    }

    async fn close_all_positions(&self, paper: bool) {
        let url = format!("{}/v2/positions", self.base(paper));
        self.best_effort_delete(url, "Close all positions").await;
    }
}
