//! Market-data REST client.

use super::types::{Bar, Timeframe};
use crate::config::AlpacaConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

/// Source of historical price bars.
///
/// Implementations return bars oldest first. An empty vector means no data,
/// not an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BarSource: Send + Sync {
    async fn fetch_bars(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timeframe: Timeframe,
        limit: u32,
    ) -> Result<Vec<Bar>>;
}

#[derive(Debug, Deserialize)]
struct BarsResponse {
    #[serde(default)]
    bars: Option<Vec<Bar>>,
}

/// Alpaca-style stock bars client.
#[derive(Debug, Clone)]
pub struct AlpacaDataClient {
    http: Client,
    base_url: String,
    key_id: String,
    secret_key: String,
}

impl AlpacaDataClient {
    /// Create a new data client from configuration.
    pub fn new(config: &AlpacaConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: config.data_base_url.trim_end_matches('/').to_string(),
            key_id: config.key_id.clone(),
            secret_key: config.secret_key.clone(),
        })
    }
}

#[async_trait]
impl BarSource for AlpacaDataClient {
    #[instrument(skip(self), fields(timeframe = %timeframe))]
    async fn fetch_bars(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timeframe: Timeframe,
        limit: u32,
    ) -> Result<Vec<Bar>> {
        let url = format!("{}/v2/stocks/{}/bars", self.base_url, symbol);
        let limit = limit.to_string();
        let start = start.to_rfc3339_opts(SecondsFormat::Secs, true);
        let end = end.to_rfc3339_opts(SecondsFormat::Secs, true);

        let response = self
            .http
            .get(&url)
            .header("APCA-API-KEY-ID", &self.key_id)
            .header("APCA-API-SECRET-KEY", &self.secret_key)
            .query(&[
                ("timeframe", timeframe.as_str()),
                ("start", start.as_str()),
                ("end", end.as_str()),
                ("limit", limit.as_str()),
                ("adjustment", "all"),
            ])
            .send()
            .await
            .with_context(|| format!("Failed to fetch bars for {}", symbol))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Bars request for {} failed with {}: {}", symbol, status, body);
        }

        let parsed: BarsResponse = response
            .json()
            .await
            .context("Failed to parse bars response")?;

        let bars = parsed.bars.unwrap_or_default();
        debug!(%symbol, count = bars.len(), "Fetched bars");
        Ok(bars)
    }
}
