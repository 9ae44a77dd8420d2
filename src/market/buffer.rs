use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};

use crate::types::{Candle, Symbol};

/// Default per-symbol retention.
pub const BUFFER_MAX: usize = 500;

/// Ring of candles for one symbol, ordered by open time ascending.
#[derive(Debug, Clone, Default)]
pub struct CandleSeries {
    candles: VecDeque<Candle>,
    cap: usize,
}

impl CandleSeries {
    pub fn new(cap: usize) -> Self {
        Self {
            candles: VecDeque::with_capacity(cap.min(64)),
            cap,
        }
    }

    /// Append a candle. A candle whose open time does not advance past the
    /// last one replaces the last slot, so polling inside the same bucket
    /// refreshes the current bar instead of growing the ring.
    pub fn push(&mut self, candle: Candle) {
        if let Some(last) = self.candles.back() {
            if candle.open_time <= last.open_time {
                self.candles.pop_back();
            }
        }
        self.candles.push_back(candle);
        while self.candles.len() > self.cap {
            self.candles.pop_front();
        }
    }

    /// The last `n` candles (or all, if fewer), oldest first.
    pub fn snapshot(&self, n: usize) -> Vec<Candle> {
        let skip = self.candles.len().saturating_sub(n);
        self.candles.iter().skip(skip).cloned().collect()
    }

    pub fn latest_close(&self) -> Option<Decimal> {
        self.candles.back().map(|c| c.close)
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }
}

/// Per-symbol candle rings. Owned exclusively by the ingestor task; every
/// reader works from cloned snapshots.
#[derive(Debug, Default)]
pub struct CandleStore {
    series: HashMap<Symbol, CandleSeries>,
    cap: usize,
}

impl CandleStore {
    pub fn new(cap: usize) -> Self {
        Self {
            series: HashMap::new(),
            cap,
        }
    }

    pub fn push(&mut self, candle: Candle) {
        let cap = self.cap;
        self.series
            .entry(candle.symbol.clone())
            .or_insert_with(|| CandleSeries::new(cap))
            .push(candle);
    }

    pub fn snapshot(&self, symbol: &Symbol, n: usize) -> Vec<Candle> {
        self.series
            .get(symbol)
            .map(|s| s.snapshot(n))
            .unwrap_or_default()
    }

    pub fn latest_close(&self, symbol: &Symbol) -> Option<Decimal> {
        self.series.get(symbol).and_then(|s| s.latest_close())
    }

    pub fn len(&self, symbol: &Symbol) -> usize {
        self.series.get(symbol).map_or(0, |s| s.len())
    }

    pub fn remove(&mut self, symbol: &Symbol) {
        self.series.remove(symbol);
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        self.series.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn candle(minute: i64, close: Decimal) -> Candle {
        let t = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap() + Duration::minutes(minute);
        Candle::synthetic(Symbol::new("BTCUSDT"), t, close, dec!(1))
    }

    #[test]
    fn ring_trims_oldest_past_cap() {
        let mut series = CandleSeries::new(3);
        for i in 0..5 {
            series.push(candle(i, dec!(100) + Decimal::from(i)));
        }
        assert_eq!(series.len(), 3);
        let closes: Vec<Decimal> = series.snapshot(10).iter().map(|c| c.close).collect();
        assert_eq!(closes, vec![dec!(102), dec!(103), dec!(104)]);
    }

    #[test]
    fn same_bucket_replaces_last_slot() {
        let mut series = CandleSeries::new(10);
        series.push(candle(0, dec!(100)));
        series.push(candle(0, dec!(101)));
        series.push(candle(0, dec!(102)));
        assert_eq!(series.len(), 1);
        assert_eq!(series.latest_close(), Some(dec!(102)));
    }

    #[test]
    fn older_open_time_also_replaces() {
        let mut series = CandleSeries::new(10);
        series.push(candle(5, dec!(100)));
        series.push(candle(3, dec!(99)));
        assert_eq!(series.len(), 1);
        assert_eq!(series.latest_close(), Some(dec!(99)));
    }

    #[test]
    fn snapshot_returns_tail_in_order() {
        let mut series = CandleSeries::new(10);
        for i in 0..6 {
            series.push(candle(i, dec!(100) + Decimal::from(i)));
        }
        let tail = series.snapshot(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].close, dec!(104));
        assert_eq!(tail[1].close, dec!(105));
    }

    #[test]
    fn snapshot_is_detached_from_the_ring() {
        let mut series = CandleSeries::new(10);
        series.push(candle(0, dec!(100)));
        let snap = series.snapshot(10);
        series.push(candle(1, dec!(200)));
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].close, dec!(100));
    }

    #[test]
    fn store_tracks_symbols_independently() {
        let mut store = CandleStore::new(10);
        store.push(candle(0, dec!(100)));
        let mut eth = candle(0, dec!(2000));
        eth.symbol = Symbol::new("ETHUSDT");
        store.push(eth);

        assert_eq!(store.latest_close(&Symbol::new("BTCUSDT")), Some(dec!(100)));
        assert_eq!(store.latest_close(&Symbol::new("ETHUSDT")), Some(dec!(2000)));
        assert_eq!(store.latest_close(&Symbol::new("SOLUSDT")), None);

        store.remove(&Symbol::new("ETHUSDT"));
        assert_eq!(store.len(&Symbol::new("ETHUSDT")), 0);
    }
}
