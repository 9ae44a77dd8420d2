use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Symbol;

/// A single OHLCV bar. Immutable once built; buffers replace rather than
/// mutate when the same bucket is polled twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: Symbol,
    pub open_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Candle {
    /// Synthesize a flat current-bar candle from a single traded price,
    /// as the ingestor does between full bars.
    pub fn synthetic(symbol: Symbol, open_time: DateTime<Utc>, price: Decimal, volume: Decimal) -> Self {
        Self {
            symbol,
            open_time,
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
        }
    }

    pub fn typical_price(&self) -> Decimal {
        (self.high + self.low + self.close) / Decimal::from(3)
    }

    pub fn range(&self) -> Decimal {
        self.high - self.low
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Basic sanity: low ≤ open/close ≤ high and volume ≥ 0.
    pub fn is_well_formed(&self) -> bool {
        self.low <= self.open
            && self.low <= self.close
            && self.open <= self.high
            && self.close <= self.high
            && self.volume >= Decimal::ZERO
    }
}
