use rust_decimal::Decimal;

use crate::types::Candle;

/// Volume-weighted average of typical prices over the given candles.
/// Undefined when no volume traded.
pub fn vwap(candles: &[Candle]) -> Option<Decimal> {
    let mut tp_volume = Decimal::ZERO;
    let mut total_volume = Decimal::ZERO;
    for c in candles {
        tp_volume += c.typical_price() * c.volume;
        total_volume += c.volume;
    }
    if total_volume.is_zero() {
        None
    } else {
        Some(tp_volume / total_volume)
    }
}
