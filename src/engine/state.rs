use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::config::Settings;
use crate::journal::JournalEvent;
use crate::types::{
    CloseReason, OrderIntent, Position, PositionSide, Symbol, Trade, TradeKind,
};

use super::EngineError;

/// Closed trades and rejection records kept for the projection surface.
pub const RECENT_TRADES_MAX: usize = 200;
pub const RECENT_REJECTIONS_MAX: usize = 100;

/// P&L smaller than this fraction of the entry price is floating-point
/// noise from a flat exit and is clamped to zero.
const PNL_NOISE_FRACTION: Decimal = dec!(0.001);

/// A risk-gate rejection, kept as a decision record rather than an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub at: DateTime<Utc>,
    pub symbol: Symbol,
    pub kind: String,
    pub confidence: Decimal,
}

/// The authoritative engine state. Mutated exclusively by the orchestrator
/// writer loop; every other component works from cloned snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineState {
    pub settings: Settings,
    pub watchlist: BTreeSet<Symbol>,
    pub positions: HashMap<Symbol, Position>,
    pub recent_trades: VecDeque<Trade>,
    pub recent_rejections: VecDeque<DecisionRecord>,
    /// Starting balance; never changes after boot.
    pub trading_balance: Decimal,
    /// Balance free for new entries.
    pub available_balance: Decimal,
    pub total_pnl: Decimal,
    pub day_pnl: Decimal,
    pub current_day: NaiveDate,
    pub last_trade_at: HashMap<Symbol, DateTime<Utc>>,
    pub next_seq: u64,
    pub started_at: DateTime<Utc>,
    pub trades_count: u64,
}

impl EngineState {
    pub fn new(
        settings: Settings,
        watchlist: impl IntoIterator<Item = Symbol>,
        initial_balance: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            settings,
            watchlist: watchlist.into_iter().collect(),
            positions: HashMap::new(),
            recent_trades: VecDeque::new(),
            recent_rejections: VecDeque::new(),
            trading_balance: initial_balance,
            available_balance: initial_balance,
            total_pnl: Decimal::ZERO,
            day_pnl: Decimal::ZERO,
            current_day: now.date_naive(),
            last_trade_at: HashMap::new(),
            next_seq: 0,
            started_at: now,
            trades_count: 0,
        }
    }

    pub fn advance_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    /// Reset the day P&L on the first mutation of a new wall-clock day.
    /// Returns the rollover event to journal, carrying the prior day's total.
    pub fn roll_day_if_needed(&mut self, now: DateTime<Utc>) -> Option<JournalEvent> {
        let today = now.date_naive();
        if today == self.current_day {
            return None;
        }
        let event = JournalEvent::DayRollover {
            day: self.current_day,
            realized: self.day_pnl,
        };
        self.current_day = today;
        self.day_pnl = Decimal::ZERO;
        Some(event)
    }

    /// Balance reserved by an order at open: full notional for longs, the
    /// configured margin fraction for shorts.
    pub fn reserve_for(&self, side: PositionSide, notional: Decimal) -> Decimal {
        match side {
            PositionSide::Long => notional,
            PositionSide::Short => notional * self.settings.short_margin_percent / dec!(100),
        }
    }

    /// Install a position for an admitted order filled at `fill_price`.
    /// Returns the opening trade for journaling.
    pub fn open_position(
        &mut self,
        intent: &OrderIntent,
        fill_price: Decimal,
        fill_time: DateTime<Utc>,
    ) -> Trade {
        let kind = match intent.side {
            PositionSide::Long => TradeKind::OpenLong,
            PositionSide::Short => TradeKind::OpenShort,
        };
        let trade = Trade::open(
            intent.symbol.clone(),
            kind,
            fill_price,
            intent.quantity,
            fill_time,
            intent.signal,
            intent.confidence,
            intent.reason,
        );
        let reserved = self.reserve_for(intent.side, intent.quantity * fill_price);
        let position =
            Position::from_open_trade(&trade, intent.target, intent.stop_loss, reserved);

        self.available_balance -= reserved;
        self.positions.insert(intent.symbol.clone(), position);
        self.last_trade_at.insert(intent.symbol.clone(), fill_time);
        self.trades_count += 1;
        self.push_trade(trade.clone());
        trade
    }

    /// Retire a position at `exit_price`, credit the reserve plus realized
    /// P&L, and return the close trade for journaling. Realized P&L within
    /// noise of a flat exit is clamped to exactly zero.
    pub fn close_position(
        &mut self,
        symbol: &Symbol,
        exit_price: Decimal,
        reason: CloseReason,
        now: DateTime<Utc>,
    ) -> Result<Trade, EngineError> {
        let position = self
            .positions
            .remove(symbol)
            .ok_or_else(|| EngineError::NotOpen(symbol.clone()))?;

        let mut realized = position.pnl_at(exit_price);
        if (exit_price - position.entry_price).abs() < PNL_NOISE_FRACTION * position.entry_price {
            realized = Decimal::ZERO;
        }

        let trade = Trade::close(
            symbol.clone(),
            position.entry_price,
            exit_price,
            position.quantity,
            now,
            position.signal,
            position.confidence,
            position.signal_reason,
            position.hold_seconds(now),
            realized,
            reason,
        );

        self.available_balance += position.reserved + realized;
        self.total_pnl += realized;
        self.day_pnl += realized;
        self.trades_count += 1;
        self.push_trade(trade.clone());
        Ok(trade)
    }

    pub fn record_rejection(&mut self, symbol: &Symbol, kind: String, confidence: Decimal, at: DateTime<Utc>) {
        self.recent_rejections.push_back(DecisionRecord {
            at,
            symbol: symbol.clone(),
            kind,
            confidence,
        });
        while self.recent_rejections.len() > RECENT_REJECTIONS_MAX {
            self.recent_rejections.pop_front();
        }
    }

    fn push_trade(&mut self, trade: Trade) {
        self.recent_trades.push_back(trade);
        while self.recent_trades.len() > RECENT_TRADES_MAX {
            self.recent_trades.pop_front();
        }
    }

    /// Sum of balance reserved by open positions.
    pub fn total_reserved(&self) -> Decimal {
        self.positions.values().map(|p| p.reserved).sum()
    }

    /// Deviation from the accounting identity
    /// `available + reserved == trading_balance + total_pnl`.
    /// Non-zero drift means a mutation double-counted somewhere.
    pub fn balance_drift(&self) -> Decimal {
        self.available_balance + self.total_reserved() - self.trading_balance - self.total_pnl
    }

    /// Hard invariants checked after every mutation. A violation is fatal.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.available_balance < Decimal::ZERO {
            return Err(format!(
                "available balance is negative: {}",
                self.available_balance
            ));
        }
        for (symbol, position) in &self.positions {
            if symbol != &position.symbol {
                return Err(format!(
                    "position keyed under {} but belongs to {}",
                    symbol, position.symbol
                ));
            }
            if position.quantity <= Decimal::ZERO {
                return Err(format!("{} position has non-positive quantity", symbol));
            }
            if position.entry_price <= Decimal::ZERO {
                return Err(format!("{} position has non-positive entry price", symbol));
            }
            if !position.levels_are_consistent() {
                return Err(format!(
                    "{} position has target/stop on the wrong side of entry",
                    symbol
                ));
            }
        }
        Ok(())
    }
}
