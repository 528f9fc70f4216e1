//! Position sizing.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const MIN_CONFIDENCE: f64 = 0.2;
const MAX_CONFIDENCE: f64 = 1.0;
/// Assumed adverse move per share
const ADVERSE_MOVE: Decimal = dec!(0.01);
/// Floor on per-share risk so very cheap instruments don't explode the size
const MIN_PER_SHARE_RISK: Decimal = dec!(0.5);

/// Share quantity for a signal.
///
/// Confidence is clamped to [0.2, 1.0], so weak signals still size above zero.
/// Dollar risk `equity_cap * risk_frac * confidence` is budgeted against a 1%
/// move per share (at least $0.50). Never returns less than one share.
pub fn size_position(
    price: Decimal,
    confidence: f64,
    equity_cap: Decimal,
    risk_frac: Decimal,
) -> u64 {
    let clamped = if confidence.is_nan() {
        MIN_CONFIDENCE
    } else {
        confidence.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
    };
    let confidence = Decimal::from_f64(clamped).unwrap_or(dec!(0.2));

    let dollar_risk = equity_cap * risk_frac * confidence;
    let per_share_risk = (price * ADVERSE_MOVE).max(MIN_PER_SHARE_RISK);

    let qty = (dollar_risk / per_share_risk).floor();
    if qty < Decimal::ONE {
        return 1;
    }
    qty.to_u64().unwrap_or(u64::MAX)
}
