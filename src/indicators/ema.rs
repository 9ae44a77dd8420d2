use rust_decimal::Decimal;

/// Exponential moving average over a close series.
///
/// Seeded with the first close, then `ema = c·k + ema·(1-k)` with
/// `k = 2/(N+1)`. Defined for any non-empty input; accuracy grows with the
/// amount of history behind it.
pub fn ema(closes: &[Decimal], period: usize) -> Option<Decimal> {
    if closes.is_empty() || period == 0 {
        return None;
    }
    let k = Decimal::from(2) / Decimal::from(period as u64 + 1);
    let one_minus_k = Decimal::ONE - k;
    let mut value = closes[0];
    for close in &closes[1..] {
        value = *close * k + value * one_minus_k;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn single_close_seeds_the_ema() {
        assert_eq!(ema(&[dec!(42)], 9), Some(dec!(42)));
    }

    #[test]
    fn empty_input_is_undefined() {
        assert_eq!(ema(&[], 9), None);
    }

    #[test]
    fn constant_series_stays_constant() {
        let closes = vec![dec!(100); 50];
        assert_eq!(ema(&closes, 21), Some(dec!(100)));
    }

    #[test]
    fn rising_series_pulls_ema_up() {
        let closes: Vec<Decimal> = (1..=30).map(Decimal::from).collect();
        let fast = ema(&closes, 9).unwrap();
        let slow = ema(&closes, 21).unwrap();
        assert!(fast > slow);
        assert!(fast < dec!(30));
    }
}
