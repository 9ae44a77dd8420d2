use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::types::Signal;

/// Exit levels for a proposed entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Targets {
    pub stop_loss: Decimal,
    pub target: Decimal,
    pub risk_reward: Decimal,
}

/// Compute stop and target for an entry at `price`.
///
/// The stop anchors to the swing level (padded 0.5%) when one exists, never
/// wider than the percent fallback. The target is a risk multiple (2x for
/// strong signals, 1.5x otherwise) with the take-profit percent distance as
/// a floor. Returns `None` for HOLD or when no positive risk distance can be
/// established.
pub fn compute_targets(
    price: Decimal,
    signal: Signal,
    swing_low: Option<Decimal>,
    swing_high: Option<Decimal>,
    stop_loss_percent: Decimal,
    take_profit_percent: Decimal,
) -> Option<Targets> {
    if price <= Decimal::ZERO {
        return None;
    }
    let side = signal.side()?;
    let rr = if signal.is_strong() { dec!(2) } else { dec!(1.5) };
    let sl_frac = stop_loss_percent / dec!(100);
    let tp_frac = take_profit_percent / dec!(100);

    match side {
        crate::types::PositionSide::Long => {
            let pct_stop = price * (Decimal::ONE - sl_frac);
            let stop = swing_low
                .map(|s| (s * dec!(0.995)).min(pct_stop))
                .unwrap_or(pct_stop);
            let risk = price - stop;
            if risk <= Decimal::ZERO {
                return None;
            }
            let target = (price + risk * rr).max(price * (Decimal::ONE + tp_frac));
            Some(Targets {
                stop_loss: stop,
                target,
                risk_reward: (target - price) / risk,
            })
        }
        crate::types::PositionSide::Short => {
            let pct_stop = price * (Decimal::ONE + sl_frac);
            let stop = swing_high
                .map(|s| (s * dec!(1.005)).max(pct_stop))
                .unwrap_or(pct_stop);
            let risk = stop - price;
            if risk <= Decimal::ZERO {
                return None;
            }
            let target = (price - risk * rr).min(price * (Decimal::ONE - tp_frac));
            if target <= Decimal::ZERO {
                return None;
            }
            Some(Targets {
                stop_loss: stop,
                target,
                risk_reward: (price - target) / risk,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hold_has_no_targets() {
        assert_eq!(
            compute_targets(dec!(100), Signal::Hold, None, None, dec!(0.5), dec!(1)),
            None
        );
    }

    #[test]
    fn long_stop_takes_the_tighter_of_swing_and_percent() {
        // Swing low at the entry price: padded swing sits above the percent
        // stop, so the percent stop wins.
        let t = compute_targets(
            dec!(100),
            Signal::Buy,
            Some(dec!(100)),
            None,
            dec!(0.5),
            dec!(1),
        )
        .unwrap();
        assert_eq!(t.stop_loss, dec!(99.5));
        assert_eq!(t.target, dec!(101.00));
        assert_eq!(t.risk_reward, dec!(2));

        // A deeper swing low pulls the stop below the percent fallback.
        let t = compute_targets(
            dec!(100),
            Signal::Buy,
            Some(dec!(99)),
            None,
            dec!(0.5),
            dec!(1),
        )
        .unwrap();
        assert_eq!(t.stop_loss, dec!(99) * dec!(0.995));
    }

    #[test]
    fn strong_signal_doubles_the_risk_multiple() {
        let t = compute_targets(dec!(100), Signal::StrongBuy, None, None, dec!(2), dec!(1)).unwrap();
        // risk = 2.00, rr = 2 -> 104; pct floor 101 is lower.
        assert_eq!(t.stop_loss, dec!(98));
        assert_eq!(t.target, dec!(104));
    }

    #[test]
    fn short_levels_mirror_longs() {
        let t = compute_targets(
            dec!(50),
            Signal::Sell,
            None,
            Some(dec!(50)),
            dec!(0.5),
            dec!(1),
        )
        .unwrap();
        assert_eq!(t.stop_loss, dec!(50.25));
        assert_eq!(t.target, dec!(49.50));
        assert!(t.stop_loss > dec!(50) && t.target < dec!(50));
    }

    #[test]
    fn zero_risk_yields_none() {
        // Swing low far above entry plus a zero percent stop distance.
        assert_eq!(
            compute_targets(dec!(100), Signal::Buy, Some(dec!(120)), None, dec!(0), dec!(1)),
            None
        );
    }
}
