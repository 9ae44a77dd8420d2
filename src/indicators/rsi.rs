use rust_decimal::Decimal;

/// Relative Strength Index with Wilder's smoothing.
///
/// Undefined until `period + 1` closes exist. A series with gains and no
/// losses reads 100 (divide-by-zero rule); a perfectly flat series reads 50.
pub fn rsi(closes: &[Decimal], period: usize) -> Option<Decimal> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let mut avg_gain = Decimal::ZERO;
    let mut avg_loss = Decimal::ZERO;
    let period_dec = Decimal::from(period as u64);

    // Seed averages from the first `period` changes.
    for w in closes.windows(2).take(period) {
        let change = w[1] - w[0];
        if change > Decimal::ZERO {
            avg_gain += change;
        } else {
            avg_loss += -change;
        }
    }
    avg_gain /= period_dec;
    avg_loss /= period_dec;

    // Wilder smoothing over the remainder.
    for w in closes.windows(2).skip(period) {
        let change = w[1] - w[0];
        let (gain, loss) = if change > Decimal::ZERO {
            (change, Decimal::ZERO)
        } else {
            (Decimal::ZERO, -change)
        };
        avg_gain = (avg_gain * (period_dec - Decimal::ONE) + gain) / period_dec;
        avg_loss = (avg_loss * (period_dec - Decimal::ONE) + loss) / period_dec;
    }

    if avg_gain.is_zero() && avg_loss.is_zero() {
        // Flat input: neutral by convention.
        return Some(Decimal::from(50));
    }
    if avg_loss.is_zero() {
        return Some(Decimal::from(100));
    }

    let rs = avg_gain / avg_loss;
    Some(Decimal::from(100) - Decimal::from(100) / (Decimal::ONE + rs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn undefined_below_fifteen_closes() {
        let closes: Vec<Decimal> = (1..=14).map(Decimal::from).collect();
        assert_eq!(rsi(&closes, 14), None);
    }

    #[test]
    fn flat_series_reads_fifty() {
        let closes = vec![dec!(100); 30];
        assert_eq!(rsi(&closes, 14), Some(dec!(50)));
    }

    #[test]
    fn monotonic_gains_read_one_hundred() {
        let closes: Vec<Decimal> = (1..=30).map(Decimal::from).collect();
        assert_eq!(rsi(&closes, 14), Some(dec!(100)));
    }

    #[test]
    fn monotonic_losses_read_zero() {
        let closes: Vec<Decimal> = (1..=30).rev().map(Decimal::from).collect();
        assert_eq!(rsi(&closes, 14), Some(Decimal::ZERO));
    }

    #[test]
    fn value_stays_in_band() {
        let closes: Vec<Decimal> = (0..40)
            .map(|i| dec!(100) + Decimal::from(i % 7) - Decimal::from(i % 3))
            .collect();
        let v = rsi(&closes, 14).unwrap();
        assert!(v >= Decimal::ZERO && v <= dec!(100));
    }
}
