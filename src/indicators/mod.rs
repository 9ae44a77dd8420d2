pub mod ema;
pub mod rsi;
pub mod swing;
pub mod volatility;
pub mod vwap;

pub use ema::*;
pub use rsi::*;
pub use swing::*;
pub use volatility::*;
pub use vwap::*;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::Candle;

pub const RSI_PERIOD: usize = 14;
pub const SWING_LOOKBACK: usize = 20;
pub const VOLUME_PERIOD: usize = 20;
pub const VOLATILITY_PERIOD: usize = 20;

pub fn sma(values: &[Decimal], period: usize) -> Option<Decimal> {
    if period == 0 || values.len() < period {
        return None;
    }
    let sum: Decimal = values.iter().rev().take(period).sum();
    Some(sum / Decimal::from(period as u64))
}

pub fn highest(values: &[Decimal], period: usize) -> Option<Decimal> {
    if values.len() < period {
        return None;
    }
    values.iter().rev().take(period).max().copied()
}

pub fn lowest(values: &[Decimal], period: usize) -> Option<Decimal> {
    if values.len() < period {
        return None;
    }
    values.iter().rev().take(period).min().copied()
}

/// Everything the synthesizer looks at, derived from one candle snapshot.
/// `None` marks an indicator that is undefined for the available history;
/// the synthesizer treats any undefined input as HOLD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub rsi: Option<Decimal>,
    pub ema9: Option<Decimal>,
    pub ema21: Option<Decimal>,
    pub ema50: Option<Decimal>,
    pub ema200: Option<Decimal>,
    pub ma50: Option<Decimal>,
    pub ma200: Option<Decimal>,
    pub vwap: Option<Decimal>,
    pub volume: Option<Decimal>,
    pub avg_volume_20: Option<Decimal>,
    pub swing_high: Option<Decimal>,
    pub swing_low: Option<Decimal>,
    pub atr_or_vol: Option<Decimal>,
    pub computed_at: DateTime<Utc>,
}

impl IndicatorSet {
    pub fn empty(computed_at: DateTime<Utc>) -> Self {
        Self {
            rsi: None,
            ema9: None,
            ema21: None,
            ema50: None,
            ema200: None,
            ma50: None,
            ma200: None,
            vwap: None,
            volume: None,
            avg_volume_20: None,
            swing_high: None,
            swing_low: None,
            atr_or_vol: None,
            computed_at,
        }
    }

    /// Derive the full set from an ordered candle snapshot. Pure: the same
    /// candles and timestamp always produce the same set.
    pub fn compute(candles: &[Candle], computed_at: DateTime<Utc>) -> Self {
        if candles.is_empty() {
            return Self::empty(computed_at);
        }

        let closes: Vec<Decimal> = candles.iter().map(|c| c.close).collect();
        let volumes: Vec<Decimal> = candles.iter().map(|c| c.volume).collect();
        let levels = swing_levels(candles, SWING_LOOKBACK);

        Self {
            rsi: rsi(&closes, RSI_PERIOD),
            ema9: ema(&closes, 9),
            ema21: ema(&closes, 21),
            ema50: ema(&closes, 50),
            ema200: ema(&closes, 200),
            ma50: sma(&closes, 50),
            ma200: sma(&closes, 200),
            vwap: vwap(candles),
            volume: volumes.last().copied(),
            avg_volume_20: sma(&volumes, VOLUME_PERIOD),
            swing_high: levels.map(|l| l.high),
            swing_low: levels.map(|l| l.low),
            atr_or_vol: volatility(&closes, VOLATILITY_PERIOD),
            computed_at,
        }
    }

    /// Current volume relative to the 20-bar average.
    pub fn volume_ratio(&self) -> Option<Decimal> {
        match (self.volume, self.avg_volume_20) {
            (Some(v), Some(avg)) if !avg.is_zero() => Some(v / avg),
            _ => None,
        }
    }
}
