//! Market data plumbing for the orchestrator.
//!
//! - `types`: bars, timeframes and engineered feature series
//! - `features`: pure bar -> indicator computation
//! - `clock`: regular-session window and pre-open exclusion
//! - `client`: REST market-data client behind the `BarSource` trait

mod client;
mod clock;
mod features;
mod types;

pub use client::{AlpacaDataClient, BarSource};
#[cfg(test)]
pub use client::MockBarSource;
pub use clock::MarketClock;
pub use features::{compute_features, MIN_FEATURE_BARS};
pub use types::*;

#[cfg(test)]
pub(crate) use features::tests::zigzag_bars;
