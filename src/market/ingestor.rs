use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::engine::EngineState;
use crate::exchange::{MarketDataSource, Quote, SourceError};
use crate::indicators::{IndicatorSet, RSI_PERIOD};
use crate::types::{Candle, Interval, Symbol};

use super::{CandleStore, MarketHub, BUFFER_MAX};

/// Candles required before a symbol leaves the warming state.
pub const WARMUP_CANDLES: usize = if RSI_PERIOD + 1 > 21 { RSI_PERIOD + 1 } else { 21 };

/// Deadline applied to every upstream call.
pub const SOURCE_CALL_DEADLINE: Duration = Duration::from_secs(5);

/// Historical candles requested when a symbol first appears.
pub const HISTORY_SEED_LIMIT: u32 = 200;

const BACKOFF_CAP_SECS: u64 = 30;

/// Polls the market data source on a cadence, owns the candle buffers, and
/// publishes fresh quotes and indicator sets to the hub. Per symbol the
/// pipeline is strictly ordered: ingest, recompute, then publish, so a
/// decision never observes a candle without its indicators.
pub struct Ingestor {
    source: Arc<dyn MarketDataSource>,
    hub: Arc<MarketHub>,
    store: CandleStore,
    seeded: HashSet<Symbol>,
    interval: Interval,
    consecutive_failures: u32,
}

impl Ingestor {
    pub fn new(source: Arc<dyn MarketDataSource>, hub: Arc<MarketHub>, interval: Interval) -> Self {
        Self {
            source,
            hub,
            store: CandleStore::new(BUFFER_MAX),
            seeded: HashSet::new(),
            interval,
            consecutive_failures: 0,
        }
    }

    /// One polling pass over the watchlist. Returns an override delay when
    /// the source asked us to back off, `None` for the normal cadence.
    pub async fn poll(&mut self, watchlist: &[Symbol], now: DateTime<Utc>) -> Option<Duration> {
        self.prune(watchlist).await;

        for symbol in watchlist {
            self.hub.ensure(symbol).await;
            if !self.seeded.contains(symbol) && !self.hub.is_quarantined(symbol).await {
                self.seed(symbol).await;
            }
        }

        let mut active = Vec::with_capacity(watchlist.len());
        for symbol in watchlist {
            if !self.hub.is_quarantined(symbol).await {
                active.push(symbol.clone());
            }
        }
        if active.is_empty() {
            return None;
        }

        match timeout(SOURCE_CALL_DEADLINE, self.source.latest(&active)).await {
            Ok(Ok(quotes)) => {
                self.consecutive_failures = 0;
                self.apply_quotes(&active, &quotes, now).await;
                None
            }
            Ok(Err(SourceError::RateLimited { retry_after })) => {
                debug!("source rate limited, backing off {:?}", retry_after);
                Some(retry_after)
            }
            Ok(Err(SourceError::NotFound(symbol))) => {
                warn!("{} unknown upstream, quarantining", symbol);
                self.hub.quarantine(&symbol).await;
                None
            }
            Ok(Err(SourceError::Unauthorized)) => {
                warn!("source rejected credentials, quarantining watchlist");
                for symbol in &active {
                    self.hub.quarantine(symbol).await;
                }
                None
            }
            Ok(Err(SourceError::Transient(msg))) => {
                debug!("transient source failure: {}", msg);
                Some(self.record_failure())
            }
            Err(_) => {
                debug!("latest() exceeded {}s deadline", SOURCE_CALL_DEADLINE.as_secs());
                Some(self.record_failure())
            }
        }
    }

    async fn apply_quotes(
        &mut self,
        active: &[Symbol],
        quotes: &HashMap<Symbol, Quote>,
        now: DateTime<Utc>,
    ) {
        for symbol in active {
            let Some(quote) = quotes.get(symbol) else {
                // Partial response: keep the last known state and move on.
                debug!("no quote returned for {}", symbol);
                continue;
            };

            let bucket = bucket_open(quote.timestamp, self.interval);
            self.store.push(Candle::synthetic(
                symbol.clone(),
                bucket,
                quote.price,
                quote.volume,
            ));
            self.hub.update_quote(symbol, quote.clone()).await;

            let candles = self.store.snapshot(symbol, BUFFER_MAX);
            self.hub
                .publish_indicators(symbol, IndicatorSet::compute(&candles, now))
                .await;

            if self.store.len(symbol) >= WARMUP_CANDLES {
                self.hub.set_warming(symbol, false).await;
            }
        }
    }

    async fn seed(&mut self, symbol: &Symbol) {
        match timeout(
            SOURCE_CALL_DEADLINE,
            self.source.history(symbol, self.interval, HISTORY_SEED_LIMIT),
        )
        .await
        {
            Ok(Ok(candles)) => {
                let count = candles.len();
                for candle in candles {
                    self.store.push(candle);
                }
                if self.store.len(symbol) >= WARMUP_CANDLES {
                    self.hub.set_warming(symbol, false).await;
                }
                info!("seeded {} historical candles for {}", count, symbol);
                self.seeded.insert(symbol.clone());
            }
            Ok(Err(e)) if e.is_permanent() => {
                warn!("{} rejected upstream ({}), quarantining", symbol, e);
                self.hub.quarantine(symbol).await;
                self.seeded.insert(symbol.clone());
            }
            Ok(Err(e)) => {
                info!("history unavailable for {} ({}), operating live-only", symbol, e);
                self.seeded.insert(symbol.clone());
            }
            Err(_) => {
                info!("history fetch timed out for {}, operating live-only", symbol);
                self.seeded.insert(symbol.clone());
            }
        }
    }

    async fn prune(&mut self, watchlist: &[Symbol]) {
        for symbol in self.store.symbols() {
            if !watchlist.contains(&symbol) {
                self.store.remove(&symbol);
                self.hub.remove(&symbol).await;
                self.seeded.remove(&symbol);
                info!("dropped market data for {}", symbol);
            }
        }
    }

    fn record_failure(&mut self) -> Duration {
        self.consecutive_failures += 1;
        backoff_delay(self.consecutive_failures)
    }
}

/// Exponential backoff starting at 1 s, capped at 30 s.
pub fn backoff_delay(consecutive_failures: u32) -> Duration {
    let exp = consecutive_failures.saturating_sub(1).min(5);
    Duration::from_secs((1u64 << exp).min(BACKOFF_CAP_SECS))
}

/// Truncate a timestamp to the open time of its candle bucket.
pub fn bucket_open(ts: DateTime<Utc>, interval: Interval) -> DateTime<Utc> {
    let secs = ts.timestamp();
    let bucket = secs - secs.rem_euclid(interval.secs());
    Utc.timestamp_opt(bucket, 0).single().unwrap_or(ts)
}

/// Divide the base cadence by the scaling factor, never dropping below 50 ms.
pub fn scaled_interval(base: Duration, scaling_factor: Decimal) -> Duration {
    let factor = scaling_factor.to_f64().unwrap_or(1.0);
    if factor <= 0.0 {
        return base;
    }
    Duration::from_secs_f64((base.as_secs_f64() / factor).max(0.05))
}

/// Ingestor worker loop; runs until shutdown flips.
pub async fn run_ingestor(
    mut ingestor: Ingestor,
    state_rx: watch::Receiver<Arc<EngineState>>,
    mut shutdown: watch::Receiver<bool>,
    base_poll: Duration,
) {
    info!("market data ingestor started");
    loop {
        let (watchlist, scaling) = {
            let state = state_rx.borrow();
            (
                state.watchlist.iter().cloned().collect::<Vec<_>>(),
                state.settings.scaling_factor,
            )
        };

        let override_delay = ingestor.poll(&watchlist, Utc::now()).await;
        let delay = override_delay.unwrap_or_else(|| scaled_interval(base_poll, scaling));

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    info!("market data ingestor stopped");
}
