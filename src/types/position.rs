use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{PositionSide, Signal, SignalReason, Symbol, Trade, TradeKind};

/// An open position. At most one exists per symbol; the orchestrator opens
/// it and the exit monitor retires it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub symbol: Symbol,
    pub side: PositionSide,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub entry_time: DateTime<Utc>,
    pub target_price: Decimal,
    pub stop_loss_price: Decimal,
    pub current_mark: Decimal,
    pub unrealized_pnl: Decimal,
    /// Balance reserved at open: full notional for longs, margin for shorts.
    /// Credited back verbatim at close.
    pub reserved: Decimal,
    /// Journal id of the opening trade.
    pub open_trade_id: String,
    pub signal: Signal,
    pub confidence: Decimal,
    pub signal_reason: SignalReason,
}

impl Position {
    /// Build the position installed by an opening trade.
    pub fn from_open_trade(
        trade: &Trade,
        target_price: Decimal,
        stop_loss_price: Decimal,
        reserved: Decimal,
    ) -> Self {
        debug_assert!(trade.kind.is_open());
        let side = match trade.kind {
            TradeKind::OpenShort => PositionSide::Short,
            _ => PositionSide::Long,
        };
        Self {
            id: Uuid::new_v4().to_string(),
            symbol: trade.symbol.clone(),
            side,
            quantity: trade.quantity,
            entry_price: trade.price,
            entry_time: trade.timestamp,
            target_price,
            stop_loss_price,
            current_mark: trade.price,
            unrealized_pnl: Decimal::ZERO,
            reserved,
            open_trade_id: trade.id.clone(),
            signal: trade.signal,
            confidence: trade.confidence,
            signal_reason: trade.signal_reason,
        }
    }

    pub fn pnl_at(&self, price: Decimal) -> Decimal {
        let diff = price - self.entry_price;
        match self.side {
            PositionSide::Long => diff * self.quantity,
            PositionSide::Short => -diff * self.quantity,
        }
    }

    pub fn mark_to(&mut self, price: Decimal) {
        self.current_mark = price;
        self.unrealized_pnl = self.pnl_at(price);
    }

    pub fn entry_notional(&self) -> Decimal {
        self.entry_price * self.quantity
    }

    /// Signed move from entry, positive when the position is in profit.
    pub fn favorable_move_pct(&self, price: Decimal) -> Decimal {
        if self.entry_price.is_zero() {
            return Decimal::ZERO;
        }
        let raw = (price - self.entry_price) / self.entry_price;
        match self.side {
            PositionSide::Long => raw,
            PositionSide::Short => -raw,
        }
    }

    pub fn target_hit(&self, price: Decimal) -> bool {
        match self.side {
            PositionSide::Long => price >= self.target_price,
            PositionSide::Short => price <= self.target_price,
        }
    }

    pub fn stop_hit(&self, price: Decimal) -> bool {
        match self.side {
            PositionSide::Long => price <= self.stop_loss_price,
            PositionSide::Short => price >= self.stop_loss_price,
        }
    }

    pub fn hold_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.entry_time).num_seconds().max(0)
    }

    /// Target and stop must sit on the correct side of the entry.
    pub fn levels_are_consistent(&self) -> bool {
        match self.side {
            PositionSide::Long => {
                self.stop_loss_price < self.entry_price && self.target_price > self.entry_price
            }
            PositionSide::Short => {
                self.stop_loss_price > self.entry_price && self.target_price < self.entry_price
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn long_position() -> Position {
        let trade = Trade::open(
            Symbol::new("BTCUSDT"),
            TradeKind::OpenLong,
            dec!(100),
            dec!(90),
            Utc::now(),
            Signal::Buy,
            dec!(70),
            SignalReason::PullbackLong,
        );
        Position::from_open_trade(&trade, dec!(101), dec!(99.5), dec!(9000))
    }

    #[test]
    fn opening_trade_seeds_the_position() {
        let p = long_position();
        assert_eq!(p.side, PositionSide::Long);
        assert_eq!(p.entry_price, dec!(100));
        assert_eq!(p.quantity, dec!(90));
        assert_eq!(p.current_mark, dec!(100));
        assert!(!p.open_trade_id.is_empty());
    }

    #[test]
    fn pnl_sign_flips_for_short() {
        let mut p = long_position();
        assert_eq!(p.pnl_at(dec!(101)), dec!(90));
        p.side = PositionSide::Short;
        assert_eq!(p.pnl_at(dec!(101)), dec!(-90));
    }

    #[test]
    fn long_target_and_stop_triggers() {
        let p = long_position();
        assert!(p.target_hit(dec!(101)));
        assert!(!p.target_hit(dec!(100.99)));
        assert!(p.stop_hit(dec!(99.5)));
        assert!(!p.stop_hit(dec!(99.51)));
    }

    #[test]
    fn favorable_move_is_signed_by_side() {
        let mut p = long_position();
        assert_eq!(p.favorable_move_pct(dec!(101)), dec!(0.01));
        p.side = PositionSide::Short;
        assert_eq!(p.favorable_move_pct(dec!(101)), dec!(-0.01));
    }

    #[test]
    fn level_consistency() {
        let mut p = long_position();
        assert!(p.levels_are_consistent());
        p.stop_loss_price = dec!(100.5);
        assert!(!p.levels_are_consistent());
    }
}
