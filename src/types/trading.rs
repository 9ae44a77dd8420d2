use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Exchange symbol, normalized to upper case ("BTCUSDT", "RELIANCE", ...).
/// The engine is symbol-agnostic; the watchlist decides what is traded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(s: impl Into<String>) -> Self {
        Symbol(s.into().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Symbol::new(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    pub fn opposite(&self) -> Self {
        match self {
            PositionSide::Long => PositionSide::Short,
            PositionSide::Short => PositionSide::Long,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PositionSide::Long => "LONG",
            PositionSide::Short => "SHORT",
        }
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::StrongBuy => "STRONG_BUY",
            Signal::Buy => "BUY",
            Signal::Hold => "HOLD",
            Signal::Sell => "SELL",
            Signal::StrongSell => "STRONG_SELL",
        }
    }

    pub fn is_bullish(&self) -> bool {
        matches!(self, Signal::StrongBuy | Signal::Buy)
    }

    pub fn is_bearish(&self) -> bool {
        matches!(self, Signal::StrongSell | Signal::Sell)
    }

    pub fn is_strong(&self) -> bool {
        matches!(self, Signal::StrongBuy | Signal::StrongSell)
    }

    /// The position side this signal argues for, if any.
    pub fn side(&self) -> Option<PositionSide> {
        match self {
            Signal::StrongBuy | Signal::Buy => Some(PositionSide::Long),
            Signal::StrongSell | Signal::Sell => Some(PositionSide::Short),
            Signal::Hold => None,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why the synthesizer produced a given signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalReason {
    EmaCross,
    PullbackLong,
    PullbackShort,
    Momentum,
    TrendFollow,
    OversoldBounce,
    OverboughtFade,
    VwapDrift,
    Insufficient,
}

impl SignalReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalReason::EmaCross => "EMA_CROSS",
            SignalReason::PullbackLong => "PULLBACK_LONG",
            SignalReason::PullbackShort => "PULLBACK_SHORT",
            SignalReason::Momentum => "MOMENTUM",
            SignalReason::TrendFollow => "TREND_FOLLOW",
            SignalReason::OversoldBounce => "OVERSOLD_BOUNCE",
            SignalReason::OverboughtFade => "OVERBOUGHT_FADE",
            SignalReason::VwapDrift => "VWAP_DRIFT",
            SignalReason::Insufficient => "INSUFFICIENT",
        }
    }
}

impl fmt::Display for SignalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Candle bucket width used by the ingestor and the analyze command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    M1,
    M5,
    M15,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::M1 => "1m",
            Interval::M5 => "5m",
            Interval::M15 => "15m",
        }
    }

    pub fn secs(&self) -> i64 {
        match self {
            Interval::M1 => 60,
            Interval::M5 => 300,
            Interval::M15 => 900,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "1m" => Some(Interval::M1),
            "5m" => Some(Interval::M5),
            "15m" => Some(Interval::M15),
            _ => None,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A proposed market order, handed to the risk gate before execution.
#[derive(Debug, Clone)]
pub struct OrderIntent {
    pub symbol: Symbol,
    pub side: PositionSide,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub stop_loss: Decimal,
    pub target: Decimal,
    pub signal: Signal,
    pub confidence: Decimal,
    pub reason: SignalReason,
}

impl OrderIntent {
    pub fn notional(&self) -> Decimal {
        self.quantity * self.entry_price
    }
}
