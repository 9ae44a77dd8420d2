use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;

use crate::config::Settings;
use crate::engine::EngineState;
use crate::types::OrderIntent;

/// Why the gate refused an order. A rejection is a recorded decision, not
/// an error; the orchestrator logs it and moves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("confidence below minimum")]
    BelowConfidence,
    #[error("daily loss limit reached")]
    DailyLossExceeded,
    #[error("too many open positions")]
    TooManyPositions,
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("symbol cooling down")]
    SymbolCoolingDown,
    #[error("position already open on same side")]
    AlreadyOpen,
    #[error("computed quantity is zero")]
    ZeroQuantity,
}

/// Pure admission predicate over the proposed order and current state.
/// The gate validates what the orchestrator proposes; it never sizes.
pub fn admit(order: &OrderIntent, state: &EngineState, now: DateTime<Utc>) -> Result<(), Rejection> {
    let settings = &state.settings;

    if order.confidence < settings.min_confidence {
        return Err(Rejection::BelowConfidence);
    }

    if state.day_pnl.abs() >= settings.max_daily_loss {
        return Err(Rejection::DailyLossExceeded);
    }

    // A same-symbol position would be replaced, not added, so it does not
    // count against the cap.
    if state.positions.len() >= settings.max_positions
        && !state.positions.contains_key(&order.symbol)
    {
        return Err(Rejection::TooManyPositions);
    }

    let required = state.reserve_for(order.side, order.notional());
    if required > state.available_balance {
        return Err(Rejection::InsufficientBalance);
    }

    if settings.cooldown_seconds > 0 {
        if let Some(last) = state.last_trade_at.get(&order.symbol) {
            let elapsed = (now - *last).num_seconds();
            if elapsed < settings.cooldown_seconds as i64 {
                return Err(Rejection::SymbolCoolingDown);
            }
        }
    }

    if let Some(existing) = state.positions.get(&order.symbol) {
        if existing.side == order.side {
            return Err(Rejection::AlreadyOpen);
        }
    }

    if order.quantity <= Decimal::ZERO {
        return Err(Rejection::ZeroQuantity);
    }

    Ok(())
}

/// Quantity for a new entry: `min(max_position_size, available·0.9)` worth
/// of units, floored to the configured precision, additionally capped by
/// the per-trade risk budget against the stop distance.
pub fn position_size(
    price: Decimal,
    stop_loss: Decimal,
    settings: &Settings,
    available_balance: Decimal,
    equity: Decimal,
    quantity_precision: u32,
) -> Decimal {
    if price <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let notional = settings
        .max_position_size
        .min(available_balance * dec!(0.9));
    let mut quantity = floor_dp(notional / price, quantity_precision);

    let risk_per_unit = (price - stop_loss).abs();
    if risk_per_unit > Decimal::ZERO {
        let risk_amount = equity * settings.risk_per_trade / dec!(100);
        let risk_capped = floor_dp(risk_amount / risk_per_unit, quantity_precision);
        quantity = quantity.min(risk_capped);
    }

    quantity.max(Decimal::ZERO)
}

fn floor_dp(value: Decimal, decimal_places: u32) -> Decimal {
    let factor = Decimal::from(10u64.pow(decimal_places));
    (value * factor).floor() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PositionSide, Signal, SignalReason, Symbol};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn state() -> EngineState {
        EngineState::new(
            Settings {
                min_confidence: dec!(50),
                ..Settings::default()
            },
            [Symbol::new("BTCUSDT"), Symbol::new("ETHUSDT")],
            dec!(10000),
            t0(),
        )
    }

    fn intent(symbol: &str, quantity: Decimal) -> OrderIntent {
        OrderIntent {
            symbol: Symbol::new(symbol),
            side: PositionSide::Long,
            quantity,
            entry_price: dec!(100),
            stop_loss: dec!(99.5),
            target: dec!(101),
            signal: Signal::Buy,
            confidence: dec!(70),
            reason: SignalReason::PullbackLong,
        }
    }

    #[test]
    fn well_formed_order_is_admitted() {
        assert_eq!(admit(&intent("BTCUSDT", dec!(90)), &state(), t0()), Ok(()));
    }

    #[test]
    fn low_confidence_is_rejected() {
        let mut order = intent("BTCUSDT", dec!(90));
        order.confidence = dec!(49);
        assert_eq!(
            admit(&order, &state(), t0()),
            Err(Rejection::BelowConfidence)
        );
    }

    #[test]
    fn daily_loss_halts_entries_in_both_directions() {
        let mut s = state();
        s.day_pnl = dec!(-500.01);
        assert_eq!(
            admit(&intent("BTCUSDT", dec!(90)), &s, t0()),
            Err(Rejection::DailyLossExceeded)
        );
        // The halt keys on |day P&L|, so a runaway gain halts too.
        s.day_pnl = dec!(500);
        assert_eq!(
            admit(&intent("BTCUSDT", dec!(90)), &s, t0()),
            Err(Rejection::DailyLossExceeded)
        );
    }

    #[test]
    fn position_cap_ignores_replaceable_symbol() {
        let mut s = state();
        s.settings.max_positions = 1;
        s.open_position(&intent("ETHUSDT", dec!(10)), dec!(100), t0());

        assert_eq!(
            admit(&intent("BTCUSDT", dec!(10)), &s, t0()),
            Err(Rejection::TooManyPositions)
        );
        // An opposite-side order on the already-open symbol is not capped.
        let mut flip = intent("ETHUSDT", dec!(10));
        flip.side = PositionSide::Short;
        let later = t0() + Duration::seconds(60);
        assert_eq!(admit(&flip, &s, later), Ok(()));
    }

    #[test]
    fn exact_balance_is_admitted() {
        let mut s = state();
        s.available_balance = dec!(9000);
        // 90 * 100 = exactly the available balance.
        assert_eq!(admit(&intent("BTCUSDT", dec!(90)), &s, t0()), Ok(()));
        s.available_balance = dec!(8999.99);
        assert_eq!(
            admit(&intent("BTCUSDT", dec!(90)), &s, t0()),
            Err(Rejection::InsufficientBalance)
        );
    }

    #[test]
    fn short_orders_only_need_margin() {
        let mut s = state();
        s.available_balance = dec!(1800);
        let mut order = intent("BTCUSDT", dec!(90));
        order.side = PositionSide::Short;
        // 20% of 9000 = 1800.
        assert_eq!(admit(&order, &s, t0()), Ok(()));
    }

    #[test]
    fn cooldown_window_is_strict() {
        let mut s = state();
        s.last_trade_at.insert(Symbol::new("BTCUSDT"), t0());

        let at = t0() + Duration::seconds(10);
        assert_eq!(
            admit(&intent("BTCUSDT", dec!(90)), &s, at),
            Err(Rejection::SymbolCoolingDown)
        );
        let at = t0() + Duration::seconds(30);
        assert_eq!(admit(&intent("BTCUSDT", dec!(90)), &s, at), Ok(()));
    }

    #[test]
    fn same_side_position_rejects() {
        let mut s = state();
        s.open_position(&intent("BTCUSDT", dec!(10)), dec!(100), t0());
        let later = t0() + Duration::seconds(60);
        assert_eq!(
            admit(&intent("BTCUSDT", dec!(10)), &s, later),
            Err(Rejection::AlreadyOpen)
        );
    }

    #[test]
    fn zero_quantity_rejects() {
        assert_eq!(
            admit(&intent("BTCUSDT", Decimal::ZERO), &state(), t0()),
            Err(Rejection::ZeroQuantity)
        );
    }

    #[test]
    fn sizing_floors_whole_units_from_available() {
        let settings = Settings::default();
        // min(10_000, 9_000) / 100 = 90 whole units.
        assert_eq!(
            position_size(dec!(100), dec!(99.5), &settings, dec!(10000), dec!(10000), 0),
            dec!(90)
        );
        // min(10_000, 9_000) / 50 = 180 whole units.
        assert_eq!(
            position_size(dec!(50), dec!(50.25), &settings, dec!(10000), dec!(10000), 0),
            dec!(180)
        );
    }

    #[test]
    fn risk_budget_caps_wide_stops() {
        let settings = Settings::default();
        // Risk budget: 2% of 10_000 = 200. Stop 10 wide -> at most 20 units,
        // well under the 90 the notional leg would allow.
        assert_eq!(
            position_size(dec!(100), dec!(90), &settings, dec!(10000), dec!(10000), 0),
            dec!(20)
        );
    }

    #[test]
    fn precision_floors_fractional_quantities() {
        let settings = Settings::default();
        // Notional leg: floor(9000 / 7) = 1285; risk leg floor(200 / 0.1) =
        // 2000 is not binding.
        let qty = position_size(dec!(7), dec!(6.9), &settings, dec!(10000), dec!(10000), 0);
        assert_eq!(qty, dec!(1285));
        // Risk leg: 200 / 1000 = 0.2, under the 0.3 the notional allows.
        let qty = position_size(dec!(30000), dec!(29000), &settings, dec!(10000), dec!(10000), 4);
        assert_eq!(qty, dec!(0.2));
    }
}
