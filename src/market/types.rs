//! Type definitions for bars and engineered features.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bar aggregation period, in the data venue's wire notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1Min")]
    Min1,
    #[serde(rename = "2Min")]
    Min2,
    #[serde(rename = "5Min")]
    Min5,
    #[serde(rename = "15Min")]
    Min15,
    #[serde(rename = "1Day")]
    Day1,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Min1 => "1Min",
            Timeframe::Min2 => "2Min",
            Timeframe::Min5 => "5Min",
            Timeframe::Min15 => "15Min",
            Timeframe::Day1 => "1Day",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One OHLCV price bar.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Bar {
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "o")]
    pub open: f64,
    #[serde(rename = "h")]
    pub high: f64,
    #[serde(rename = "l")]
    pub low: f64,
    #[serde(rename = "c")]
    pub close: f64,
    #[serde(rename = "v")]
    pub volume: f64,
}

/// Engineered indicators for a single bar.
#[derive(Debug, Clone, PartialEq)]
pub struct FeaturePoint {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    /// One-bar close-to-close return
    pub ret1: f64,
    /// Five-bar close-to-close return
    pub ret5: f64,
    /// Rolling standard deviation of `ret1`
    pub volatility: f64,
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_hist: f64,
}

/// Ordered indicator series for one (symbol, timeframe) pair.
///
/// Produced fresh every tick; never cached across ticks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSeries {
    points: Vec<FeaturePoint>,
}

impl FeatureSeries {
    pub fn new(points: Vec<FeaturePoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Most recent point.
    pub fn latest(&self) -> Option<&FeaturePoint> {
        self.points.last()
    }

    pub fn points(&self) -> &[FeaturePoint] {
        &self.points
    }

    /// Latest point, only when the series holds at least `min_len` points.
    pub fn latest_if_sufficient(&self, min_len: usize) -> Option<&FeaturePoint> {
        if self.points.len() < min_len {
            return None;
        }
        self.latest()
    }
}
