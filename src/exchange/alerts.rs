//! Webhook alert delivery.

use crate::config::AlertConfig;
use crate::exchange::traits::AlertSink;
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

/// Posts `{event, payload}` to a webhook. A missing URL disables delivery.
pub struct WebhookAlerter {
    http: reqwest::Client,
    webhook_url: Option<String>,
}

impl WebhookAlerter {
    pub fn new(config: &AlertConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            webhook_url: config.webhook_url.clone().filter(|u| !u.is_empty()),
        })
    }

    /// An alerter that drops everything.
    pub fn disabled() -> Self {
        Self {
            http: reqwest::Client::new(),
            webhook_url: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }
}

#[async_trait]
impl AlertSink for WebhookAlerter {
    async fn send_alert(&self, event: &str, payload: serde_json::Value) {
        let Some(url) = &self.webhook_url else {
            return; // Not configured
        };

        let body = serde_json::json!({ "event": event, "payload": payload });

        match self.http.post(url).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => debug!(%event, "Alert delivered"),
            Ok(resp) => warn!(%event, status = %resp.status(), "Alert webhook returned non-success"),
            Err(e) => warn!(%event, error = %e, "Alert delivery failed"),
        }
    }
}
