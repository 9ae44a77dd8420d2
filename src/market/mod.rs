pub mod buffer;
pub mod ingestor;

pub use buffer::*;
pub use ingestor::*;

use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::exchange::Quote;
use crate::indicators::IndicatorSet;
use crate::types::Symbol;

/// Latest per-symbol market picture published by the ingestor and read by
/// the orchestrator, the exit monitor and the projection surface.
#[derive(Debug, Clone)]
pub struct MarketView {
    pub quote: Option<Quote>,
    pub indicators: Option<IndicatorSet>,
    pub warming: bool,
    pub quarantined: bool,
}

#[derive(Debug, Clone)]
struct SymbolState {
    quote: Option<Quote>,
    indicators: Option<IndicatorSet>,
    warming: bool,
    quarantined: bool,
}

impl Default for SymbolState {
    fn default() -> Self {
        Self {
            quote: None,
            indicators: None,
            warming: true,
            quarantined: false,
        }
    }
}

/// Shared read slot for the freshest quote and indicator set per symbol.
/// Writers are the ingestor task only; everyone else reads.
#[derive(Debug, Default)]
pub struct MarketHub {
    inner: RwLock<HashMap<Symbol, SymbolState>>,
}

impl MarketHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn ensure(&self, symbol: &Symbol) {
        self.inner
            .write()
            .await
            .entry(symbol.clone())
            .or_default();
    }

    pub async fn update_quote(&self, symbol: &Symbol, quote: Quote) {
        self.inner
            .write()
            .await
            .entry(symbol.clone())
            .or_default()
            .quote = Some(quote);
    }

    pub async fn publish_indicators(&self, symbol: &Symbol, set: IndicatorSet) {
        self.inner
            .write()
            .await
            .entry(symbol.clone())
            .or_default()
            .indicators = Some(set);
    }

    pub async fn set_warming(&self, symbol: &Symbol, warming: bool) {
        if let Some(state) = self.inner.write().await.get_mut(symbol) {
            state.warming = warming;
        }
    }

    pub async fn quarantine(&self, symbol: &Symbol) {
        let mut inner = self.inner.write().await;
        let state = inner.entry(symbol.clone()).or_default();
        state.warming = false;
        state.quarantined = true;
    }

    pub async fn is_quarantined(&self, symbol: &Symbol) -> bool {
        self.inner
            .read()
            .await
            .get(symbol)
            .map_or(false, |s| s.quarantined)
    }

    pub async fn view(&self, symbol: &Symbol) -> Option<MarketView> {
        self.inner.read().await.get(symbol).map(|s| MarketView {
            quote: s.quote.clone(),
            indicators: s.indicators.clone(),
            warming: s.warming,
            quarantined: s.quarantined,
        })
    }

    pub async fn latest_price(&self, symbol: &Symbol) -> Option<Decimal> {
        self.inner
            .read()
            .await
            .get(symbol)
            .and_then(|s| s.quote.as_ref())
            .map(|q| q.price)
    }

    pub async fn remove(&self, symbol: &Symbol) {
        self.inner.write().await.remove(symbol);
    }
}
