use rust_decimal::Decimal;

use crate::types::Candle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwingLevels {
    pub low: Decimal,
    pub high: Decimal,
}

/// Highest swing high and lowest swing low in the lookback window.
///
/// A bar is a swing high when its high exceeds both neighbours; swing lows
/// are symmetric. When the window holds no fractal turning points, the plain
/// max/min of the window stands in.
pub fn swing_levels(candles: &[Candle], lookback: usize) -> Option<SwingLevels> {
    if candles.is_empty() || lookback == 0 {
        return None;
    }
    let start = candles.len().saturating_sub(lookback);
    let window = &candles[start..];

    let mut swing_high: Option<Decimal> = None;
    let mut swing_low: Option<Decimal> = None;

    for i in 1..window.len().saturating_sub(1) {
        let (prev, cur, next) = (&window[i - 1], &window[i], &window[i + 1]);
        if cur.high > prev.high && cur.high > next.high {
            swing_high = Some(swing_high.map_or(cur.high, |h| h.max(cur.high)));
        }
        if cur.low < prev.low && cur.low < next.low {
            swing_low = Some(swing_low.map_or(cur.low, |l| l.min(cur.low)));
        }
    }

    let max_high = window
        .iter()
        .map(|c| c.high)
        .max()
        .expect("window is non-empty");
    let min_low = window
        .iter()
        .map(|c| c.low)
        .min()
        .expect("window is non-empty");

    let high = swing_high.unwrap_or(max_high);
    let low = swing_low.unwrap_or(min_low);

    // Fractals found on only one side can cross; fall back to the window
    // extremes, which always order correctly.
    if low > high {
        Some(SwingLevels {
            low: min_low,
            high: max_high,
        })
    } else {
        Some(SwingLevels { low, high })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Symbol;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn candle(high: Decimal, low: Decimal) -> Candle {
        Candle {
            symbol: Symbol::new("X"),
            open_time: Utc::now(),
            open: (high + low) / dec!(2),
            high,
            low,
            close: (high + low) / dec!(2),
            volume: dec!(1),
        }
    }

    #[test]
    fn fractal_peak_and_trough_are_found() {
        // Peak at 110, trough at 90, window edges flat at 100.
        let candles = vec![
            candle(dec!(100), dec!(99)),
            candle(dec!(110), dec!(100)),
            candle(dec!(101), dec!(90)),
            candle(dec!(102), dec!(95)),
            candle(dec!(100), dec!(96)),
        ];
        let levels = swing_levels(&candles, 20).unwrap();
        assert_eq!(levels.high, dec!(110));
        assert_eq!(levels.low, dec!(90));
    }

    #[test]
    fn flat_window_falls_back_to_extremes() {
        let candles = vec![candle(dec!(100), dec!(98)); 10];
        let levels = swing_levels(&candles, 20).unwrap();
        assert_eq!(levels.high, dec!(100));
        assert_eq!(levels.low, dec!(98));
    }

    #[test]
    fn lookback_trims_older_bars() {
        let mut candles = vec![candle(dec!(500), dec!(1))];
        candles.extend(std::iter::repeat(candle(dec!(100), dec!(98))).take(20));
        let levels = swing_levels(&candles, 20).unwrap();
        assert_eq!(levels.high, dec!(100));
    }

    #[test]
    fn empty_input_is_undefined() {
        assert_eq!(swing_levels(&[], 20), None);
    }
}
