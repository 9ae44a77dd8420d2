use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::{Signal, SignalReason, Symbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeKind {
    OpenLong,
    OpenShort,
    Close,
}

impl TradeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeKind::OpenLong => "OPEN_LONG",
            TradeKind::OpenShort => "OPEN_SHORT",
            TradeKind::Close => "CLOSE",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, TradeKind::OpenLong | TradeKind::OpenShort)
    }
}

impl fmt::Display for TradeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    TakeProfit,
    StopLoss,
    Timeout,
    OppositeSignal,
    Manual,
    Shutdown,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::TakeProfit => "TAKE_PROFIT",
            CloseReason::StopLoss => "STOP_LOSS",
            CloseReason::Timeout => "TIMEOUT",
            CloseReason::OppositeSignal => "OPPOSITE_SIGNAL",
            CloseReason::Manual => "MANUAL",
            CloseReason::Shutdown => "SHUTDOWN",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable journal record for one open or close event. Never mutated once
/// appended; close events carry a distinct `exit_price` so that entry prices
/// are never overwritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub symbol: Symbol,
    pub kind: TradeKind,
    pub price: Decimal,
    pub quantity: Decimal,
    pub timestamp: DateTime<Utc>,
    pub signal: Signal,
    pub confidence: Decimal,
    pub signal_reason: SignalReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hold_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realized_pnl: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<CloseReason>,
}

impl Trade {
    pub fn open(
        symbol: Symbol,
        kind: TradeKind,
        price: Decimal,
        quantity: Decimal,
        timestamp: DateTime<Utc>,
        signal: Signal,
        confidence: Decimal,
        signal_reason: SignalReason,
    ) -> Self {
        debug_assert!(kind.is_open());
        Self {
            id: Uuid::new_v4().to_string(),
            symbol,
            kind,
            price,
            quantity,
            timestamp,
            signal,
            confidence,
            signal_reason,
            exit_price: None,
            hold_seconds: None,
            realized_pnl: None,
            reason: None,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn close(
        symbol: Symbol,
        entry_price: Decimal,
        exit_price: Decimal,
        quantity: Decimal,
        timestamp: DateTime<Utc>,
        signal: Signal,
        confidence: Decimal,
        signal_reason: SignalReason,
        hold_seconds: i64,
        realized_pnl: Decimal,
        reason: CloseReason,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            symbol,
            kind: TradeKind::Close,
            price: entry_price,
            quantity,
            timestamp,
            signal,
            confidence,
            signal_reason,
            exit_price: Some(exit_price),
            hold_seconds: Some(hold_seconds),
            realized_pnl: Some(realized_pnl),
            reason: Some(reason),
        }
    }
}
