use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::market::MarketHub;
use crate::types::{CloseReason, Position, Symbol};

use super::{Command, EngineState};

/// Decide whether a position must leave the book at the given mark.
/// Take-profit and stop-loss trigger on either the percent move or the
/// absolute level, whichever is crossed first; the timeout check replaces
/// per-position timers without changing semantics.
pub fn evaluate_exit(
    position: &Position,
    price: Decimal,
    settings: &Settings,
    now: DateTime<Utc>,
) -> Option<CloseReason> {
    let pct = position.favorable_move_pct(price);
    let tp_frac = settings.take_profit_percent / Decimal::from(100);
    let sl_frac = settings.stop_loss_percent / Decimal::from(100);

    if pct >= tp_frac || position.target_hit(price) {
        return Some(CloseReason::TakeProfit);
    }
    if pct <= -sl_frac || position.stop_hit(price) {
        return Some(CloseReason::StopLoss);
    }
    if position.hold_seconds(now) >= settings.max_hold_seconds as i64 {
        return Some(CloseReason::Timeout);
    }
    None
}

/// One monitoring pass: refresh marks and enqueue a close command for every
/// position that has triggered an exit.
pub async fn scan(
    hub: &MarketHub,
    snapshot: &EngineState,
    commands: &mpsc::Sender<Command>,
    now: DateTime<Utc>,
) {
    if snapshot.positions.is_empty() {
        return;
    }

    let mut marks: Vec<(Symbol, Decimal)> = Vec::with_capacity(snapshot.positions.len());
    let mut closes: Vec<(Symbol, CloseReason)> = Vec::new();

    for (symbol, position) in &snapshot.positions {
        // A stale feed still honors exit rules at the last known mark.
        let price = match hub.latest_price(symbol).await {
            Some(price) => price,
            None => position.current_mark,
        };
        if price <= Decimal::ZERO {
            warn!("{} has no usable mark, skipping exit evaluation", symbol);
            continue;
        }
        marks.push((symbol.clone(), price));

        if let Some(reason) = evaluate_exit(position, price, &snapshot.settings, now) {
            info!(
                "{} exit triggered: {} @ {} (entry {})",
                symbol, reason, price, position.entry_price
            );
            closes.push((symbol.clone(), reason));
        }
    }

    if !marks.is_empty() && commands.send(Command::UpdateMarks { marks }).await.is_err() {
        debug!("orchestrator gone; dropping mark update");
        return;
    }
    for (symbol, reason) in closes {
        if commands
            .send(Command::ClosePosition {
                symbol,
                reason,
                reply: None,
            })
            .await
            .is_err()
        {
            debug!("orchestrator gone; dropping close command");
            return;
        }
    }
}

/// Exit monitor worker loop; ticks every `exit_interval` until shutdown.
pub async fn run_exit_monitor(
    hub: Arc<MarketHub>,
    state_rx: watch::Receiver<Arc<EngineState>>,
    commands: mpsc::Sender<Command>,
    mut shutdown: watch::Receiver<bool>,
    exit_interval: Duration,
) {
    info!(
        "exit monitor started ({}s interval)",
        exit_interval.as_secs()
    );
    let mut ticker = tokio::time::interval(exit_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }
        let snapshot = Arc::clone(&state_rx.borrow());
        scan(&hub, &snapshot, &commands, Utc::now()).await;
    }
    info!("exit monitor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::Quote;
    use crate::types::{OrderIntent, PositionSide, Signal, SignalReason, Trade, TradeKind};
    use chrono::{Duration as ChronoDuration, TimeZone};
    use rust_decimal_macros::dec;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn settings() -> Settings {
        Settings {
            take_profit_percent: dec!(1),
            stop_loss_percent: dec!(0.5),
            max_hold_seconds: 300,
            ..Settings::default()
        }
    }

    fn position(side: PositionSide, entry: Decimal, quantity: Decimal) -> Position {
        let kind = match side {
            PositionSide::Long => TradeKind::OpenLong,
            PositionSide::Short => TradeKind::OpenShort,
        };
        let trade = Trade::open(
            Symbol::new("BTCUSDT"),
            kind,
            entry,
            quantity,
            t0(),
            Signal::Buy,
            dec!(70),
            SignalReason::PullbackLong,
        );
        let (target, stop) = match side {
            PositionSide::Long => (entry * dec!(1.01), entry * dec!(0.995)),
            PositionSide::Short => (entry * dec!(0.99), entry * dec!(1.005)),
        };
        Position::from_open_trade(&trade, target, stop, entry * quantity)
    }

    #[test]
    fn long_take_profit_by_percent() {
        let p = position(PositionSide::Long, dec!(100), dec!(90));
        let at = t0() + ChronoDuration::seconds(2);
        assert_eq!(
            evaluate_exit(&p, dec!(101.10), &settings(), at),
            Some(CloseReason::TakeProfit)
        );
    }

    #[test]
    fn long_take_profit_by_level() {
        let mut p = position(PositionSide::Long, dec!(100), dec!(90));
        // Pull the absolute target inside the percent band.
        p.target_price = dec!(100.80);
        let at = t0() + ChronoDuration::seconds(2);
        assert_eq!(
            evaluate_exit(&p, dec!(100.80), &settings(), at),
            Some(CloseReason::TakeProfit)
        );
    }

    #[test]
    fn short_stop_loss_by_percent() {
        // Short at 50.00; a mark of 50.30 is a 0.6% adverse move.
        let p = position(PositionSide::Short, dec!(50), dec!(180));
        let at = t0() + ChronoDuration::seconds(1);
        assert_eq!(
            evaluate_exit(&p, dec!(50.30), &settings(), at),
            Some(CloseReason::StopLoss)
        );
    }

    #[test]
    fn flat_position_times_out() {
        let p = position(PositionSide::Long, dec!(10), dec!(100));
        let mut s = settings();
        s.max_hold_seconds = 5;

        let at = t0() + ChronoDuration::seconds(4);
        assert_eq!(evaluate_exit(&p, dec!(10.0005), &s, at), None);

        let at = t0() + ChronoDuration::seconds(6);
        assert_eq!(
            evaluate_exit(&p, dec!(10.0005), &s, at),
            Some(CloseReason::Timeout)
        );
    }

    #[test]
    fn quiet_market_keeps_the_position() {
        let p = position(PositionSide::Long, dec!(100), dec!(90));
        let at = t0() + ChronoDuration::seconds(30);
        assert_eq!(evaluate_exit(&p, dec!(100.40), &settings(), at), None);
    }

    #[tokio::test]
    async fn scan_enqueues_marks_and_closes() {
        let hub = MarketHub::new();
        let sym = Symbol::new("BTCUSDT");
        hub.update_quote(
            &sym,
            Quote {
                price: dec!(101.10),
                volume: dec!(1),
                timestamp: t0(),
            },
        )
        .await;

        let mut state = EngineState::new(settings(), [sym.clone()], dec!(10000), t0());
        let intent = OrderIntent {
            symbol: sym.clone(),
            side: PositionSide::Long,
            quantity: dec!(90),
            entry_price: dec!(100),
            stop_loss: dec!(99.5),
            target: dec!(101),
            signal: Signal::Buy,
            confidence: dec!(70),
            reason: SignalReason::PullbackLong,
        };
        state.open_position(&intent, dec!(100), t0());

        let (tx, mut rx) = mpsc::channel(8);
        scan(&hub, &state, &tx, t0() + ChronoDuration::seconds(2)).await;

        match rx.try_recv().unwrap() {
            Command::UpdateMarks { marks } => {
                assert_eq!(marks, vec![(sym.clone(), dec!(101.10))]);
            }
            _ => panic!("expected mark update first"),
        }
        match rx.try_recv().unwrap() {
            Command::ClosePosition { symbol, reason, .. } => {
                assert_eq!(symbol, sym);
                assert_eq!(reason, CloseReason::TakeProfit);
            }
            _ => panic!("expected close command"),
        }
    }

    #[tokio::test]
    async fn scan_uses_last_mark_when_feed_is_stale() {
        let hub = MarketHub::new();
        let sym = Symbol::new("BTCUSDT");

        let mut s = settings();
        s.max_hold_seconds = 5;
        let mut state = EngineState::new(s, [sym.clone()], dec!(10000), t0());
        let intent = OrderIntent {
            symbol: sym.clone(),
            side: PositionSide::Long,
            quantity: dec!(10),
            entry_price: dec!(100),
            stop_loss: dec!(99.5),
            target: dec!(101),
            signal: Signal::Buy,
            confidence: dec!(70),
            reason: SignalReason::PullbackLong,
        };
        state.open_position(&intent, dec!(100), t0());

        // No quote in the hub at all; the timeout still fires off the
        // position's own mark.
        let (tx, mut rx) = mpsc::channel(8);
        scan(&hub, &state, &tx, t0() + ChronoDuration::seconds(10)).await;

        assert!(matches!(
            rx.try_recv().unwrap(),
            Command::UpdateMarks { .. }
        ));
        assert!(matches!(
            rx.try_recv().unwrap(),
            Command::ClosePosition {
                reason: CloseReason::Timeout,
                ..
            }
        ));
    }
}
