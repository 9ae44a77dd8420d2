use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

/// Annualized standard deviation of log-returns over the last `period`
/// closes. Used only to size targets, so the f64 round-trip through `ln` is
/// acceptable here.
pub fn volatility(closes: &[Decimal], period: usize) -> Option<Decimal> {
    if period < 2 || closes.len() < period {
        return None;
    }
    let tail = &closes[closes.len() - period..];

    let mut returns = Vec::with_capacity(period - 1);
    for w in tail.windows(2) {
        let prev = w[0].to_f64()?;
        let cur = w[1].to_f64()?;
        if prev <= 0.0 || cur <= 0.0 {
            return None;
        }
        returns.push((cur / prev).ln());
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let annualized = variance.sqrt() * 252f64.sqrt();

    Decimal::from_f64(annualized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn constant_series_has_zero_volatility() {
        let closes = vec![dec!(100); 25];
        assert_eq!(volatility(&closes, 20), Some(Decimal::ZERO));
    }

    #[test]
    fn undefined_with_too_little_history() {
        let closes = vec![dec!(100); 19];
        assert_eq!(volatility(&closes, 20), None);
    }

    #[test]
    fn choppier_series_is_more_volatile() {
        let calm: Vec<Decimal> = (0..30)
            .map(|i| dec!(100) + Decimal::from(i % 2))
            .collect();
        let wild: Vec<Decimal> = (0..30)
            .map(|i| dec!(100) + Decimal::from((i % 2) * 20))
            .collect();
        let calm_vol = volatility(&calm, 20).unwrap();
        let wild_vol = volatility(&wild, 20).unwrap();
        assert!(wild_vol > calm_vol);
    }

    #[test]
    fn nonpositive_price_is_undefined() {
        let mut closes = vec![dec!(100); 25];
        closes[24] = Decimal::ZERO;
        assert_eq!(volatility(&closes, 20), None);
    }
}
