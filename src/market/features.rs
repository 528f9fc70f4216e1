//! Indicator engineering: raw bars -> `FeatureSeries`.
//!
//! Pure and infallible. Too little history yields an empty series rather than
//! an error so callers treat it as transient data unavailability.

use super::types::{Bar, FeaturePoint, FeatureSeries};

/// Fewer input bars than this produce an empty series.
pub const MIN_FEATURE_BARS: usize = 60;

const VOL_WINDOW: usize = 20;
const RSI_WINDOW: usize = 14;
const EMA_FAST: usize = 12;
const EMA_SLOW: usize = 26;
const EMA_SIGNAL: usize = 9;

/// Compute the engineered feature series for a bar sequence.
///
/// Leading rows whose rolling windows are not yet full, and rows where RSI is
/// undefined (no losses in the window), are dropped.
pub fn compute_features(bars: &[Bar]) -> FeatureSeries {
    if bars.len() < MIN_FEATURE_BARS {
        return FeatureSeries::default();
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let n = closes.len();

    let ret1: Vec<f64> = (0..n)
        .map(|i| if i >= 1 { pct_change(closes[i - 1], closes[i]) } else { f64::NAN })
        .collect();
    let ret5: Vec<f64> = (0..n)
        .map(|i| if i >= 5 { pct_change(closes[i - 5], closes[i]) } else { f64::NAN })
        .collect();

    let volatility: Vec<f64> = (0..n)
        .map(|i| {
            if i + 1 < VOL_WINDOW {
                return f64::NAN;
            }
            sample_std(&ret1[i + 1 - VOL_WINDOW..=i])
        })
        .collect();

    let ema_fast = ema(&closes, EMA_FAST);
    let ema_slow = ema(&closes, EMA_SLOW);
    let macd: Vec<f64> = ema_fast.iter().zip(&ema_slow).map(|(f, s)| f - s).collect();
    let macd_signal = ema(&macd, EMA_SIGNAL);

    let rsi = rsi(&closes, RSI_WINDOW);

    let points = (0..n)
        .filter_map(|i| {
            let point = FeaturePoint {
                timestamp: bars[i].timestamp,
                close: closes[i],
                ret1: ret1[i],
                ret5: ret5[i],
                volatility: volatility[i],
                rsi: rsi[i],
                macd: macd[i],
                macd_signal: macd_signal[i],
                macd_hist: macd[i] - macd_signal[i],
            };
            is_complete(&point).then_some(point)
        })
        .collect();

    FeatureSeries::new(points)
}

fn is_complete(p: &FeaturePoint) -> bool {
    [
        p.ret1,
        p.ret5,
        p.volatility,
        p.rsi,
        p.macd,
        p.macd_signal,
        p.macd_hist,
    ]
    .iter()
    .all(|v| !v.is_nan())
}

fn pct_change(prev: f64, current: f64) -> f64 {
    current / prev - 1.0
}

/// Sample (n - 1) standard deviation; NaN if any input is NaN.
fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 || values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Recursive EMA seeded with the first value (no bias adjustment).
fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev = None;
    for &v in values {
        let next = match prev {
            None => v,
            Some(p) => alpha * v + (1.0 - alpha) * p,
        };
        out.push(next);
        prev = Some(next);
    }
    out
}

/// RSI from simple rolling means of gains and losses.
fn rsi(closes: &[f64], window: usize) -> Vec<f64> {
    let n = closes.len();
    let mut gains = vec![f64::NAN; n];
    let mut losses = vec![f64::NAN; n];
    for i in 1..n {
        let delta = closes[i] - closes[i - 1];
        gains[i] = delta.max(0.0);
        losses[i] = (-delta).max(0.0);
    }

    (0..n)
        .map(|i| {
            if i < window {
                return f64::NAN;
            }
            let range = i + 1 - window..=i;
            let avg_gain = gains[range.clone()].iter().sum::<f64>() / window as f64;
            let avg_loss = losses[range].iter().sum::<f64>() / window as f64;
            if avg_loss == 0.0 {
                return f64::NAN;
            }
            let rs = avg_gain / avg_loss;
            100.0 - 100.0 / (1.0 + rs)
        })
        .collect()
}
