use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::indicators::IndicatorSet;
use crate::types::{Signal, SignalReason};

use super::TradeSignal;

const CONFIDENCE_FLOOR: Decimal = dec!(40);
const CONFIDENCE_CEIL: Decimal = dec!(95);

/// Derive a graded signal from the indicator set and the current price.
///
/// The ladder is evaluated top to bottom and the first matching tier wins
/// regardless of what a lower tier would have scored. Any indicator a tier
/// needs that is undefined simply fails that tier; when nothing matches the
/// result is HOLD at confidence 50.
pub fn synthesize(indicators: &IndicatorSet, price: Decimal) -> TradeSignal {
    let Some(rsi) = indicators.rsi else {
        return TradeSignal::hold();
    };
    let volume_ratio = indicators.volume_ratio();

    // 1/2. Scalping setups: fast EMA alignment with volume behind it.
    if let (Some(ema9), Some(ema21), Some(vr)) = (indicators.ema9, indicators.ema21, volume_ratio) {
        if vr >= dec!(1) {
            if ema9 > ema21 && in_band(rsi, dec!(25), dec!(55)) {
                return graded(Signal::StrongBuy, dec!(80) + volume_bonus(vr), SignalReason::EmaCross);
            }
            if ema9 < ema21 && in_band(rsi, dec!(45), dec!(75)) {
                return graded(Signal::StrongSell, dec!(80) + volume_bonus(vr), SignalReason::EmaCross);
            }
        }
    }

    let uptrend = matches!(
        (indicators.ema50, indicators.ema200),
        (Some(e50), Some(e200)) if price > e50 && e50 > e200
    );
    let downtrend = matches!(
        (indicators.ema50, indicators.ema200),
        (Some(e50), Some(e200)) if price < e50 && e50 < e200
    );

    // 3/4. Pullbacks to the 50 EMA inside an established trend.
    if let Some(ema50) = indicators.ema50 {
        if !ema50.is_zero() {
            let deviation_pct = ((price - ema50).abs() / ema50) * dec!(100);
            if deviation_pct <= dec!(0.5) {
                if uptrend && in_band(rsi, dec!(40), dec!(65)) {
                    return graded(
                        Signal::Buy,
                        dec!(70) + pullback_bonus(deviation_pct),
                        SignalReason::PullbackLong,
                    );
                }
                if downtrend && in_band(rsi, dec!(35), dec!(60)) {
                    return graded(
                        Signal::Sell,
                        dec!(70) + pullback_bonus(deviation_pct),
                        SignalReason::PullbackShort,
                    );
                }
            }
        }
    }

    // 5/6. Momentum continuation above/below VWAP.
    if let Some(vwap) = indicators.vwap {
        if !vwap.is_zero() {
            let deviation_pct = ((price - vwap).abs() / vwap) * dec!(100);
            if uptrend && price > vwap && in_band(rsi, dec!(55), dec!(70)) {
                return graded(
                    Signal::Buy,
                    dec!(55) + vwap_bonus(deviation_pct),
                    SignalReason::Momentum,
                );
            }
            if downtrend && price < vwap && in_band(rsi, dec!(30), dec!(45)) {
                return graded(
                    Signal::Sell,
                    dec!(55) + vwap_bonus(deviation_pct),
                    SignalReason::Momentum,
                );
            }
        }
    }

    // 7/8. Plain trend following.
    if uptrend && in_band(rsi, dec!(45), dec!(60)) {
        return graded(Signal::Buy, dec!(45), SignalReason::TrendFollow);
    }
    if downtrend && in_band(rsi, dec!(40), dec!(55)) {
        return graded(Signal::Sell, dec!(45), SignalReason::TrendFollow);
    }

    // 9. Exhaustion reversion with volume confirmation.
    if let Some(vr) = volume_ratio {
        if rsi < dec!(30) && vr > dec!(1) {
            return graded(Signal::Buy, dec!(60) + volume_bonus(vr), SignalReason::OversoldBounce);
        }
        if rsi > dec!(70) && vr > dec!(1.5) {
            return graded(Signal::Sell, dec!(60) + volume_bonus(vr), SignalReason::OverboughtFade);
        }
    }

    // 10. Ultra-fallback: lean on the side of VWAP when nothing else fires.
    if let (Some(vwap), Some(vr)) = (indicators.vwap, volume_ratio) {
        if !vwap.is_zero() && in_band(rsi, dec!(30), dec!(70)) && vr >= dec!(0.5) && price != vwap {
            let deviation_pct = ((price - vwap).abs() / vwap) * dec!(100);
            let confidence = dec!(35) + (deviation_pct * dec!(10)).min(dec!(5));
            let signal = if price > vwap { Signal::Buy } else { Signal::Sell };
            return graded(signal, confidence, SignalReason::VwapDrift);
        }
    }

    TradeSignal::hold()
}

fn in_band(value: Decimal, lo: Decimal, hi: Decimal) -> bool {
    value >= lo && value <= hi
}

fn volume_bonus(volume_ratio: Decimal) -> Decimal {
    (volume_ratio * dec!(5)).min(dec!(10))
}

/// Closer to the EMA means a cleaner pullback; scales 0..5 across the
/// admissible 0.5% band.
fn pullback_bonus(deviation_pct: Decimal) -> Decimal {
    let half = dec!(0.5);
    (((half - deviation_pct) / half) * dec!(5)).clamp(Decimal::ZERO, dec!(5))
}

fn vwap_bonus(deviation_pct: Decimal) -> Decimal {
    (deviation_pct * dec!(2)).min(dec!(5))
}

fn graded(signal: Signal, confidence: Decimal, reason: SignalReason) -> TradeSignal {
    TradeSignal {
        signal,
        confidence: confidence.clamp(CONFIDENCE_FLOOR, CONFIDENCE_CEIL),
        reason,
    }
}
