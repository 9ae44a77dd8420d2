pub mod synthesizer;
pub mod targets;

pub use synthesizer::*;
pub use targets::*;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::{Signal, SignalReason};

/// Graded signal produced by the synthesizer: direction, confidence on a
/// 0-100 scale, and the tier that fired.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub signal: Signal,
    pub confidence: Decimal,
    pub reason: SignalReason,
}

impl TradeSignal {
    pub fn hold() -> Self {
        Self {
            signal: Signal::Hold,
            confidence: dec!(50),
            reason: SignalReason::Insufficient,
        }
    }

    pub fn is_actionable(&self) -> bool {
        !matches!(self.signal, Signal::Hold)
    }
}
