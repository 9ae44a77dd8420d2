pub mod binance;

pub use binance::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

use crate::types::{Candle, Interval, Symbol};

/// Latest traded state for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub price: Decimal,
    pub volume: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("symbol not found: {0}")]
    NotFound(Symbol),
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },
    #[error("transient upstream failure: {0}")]
    Transient(String),
    #[error("unauthorized")]
    Unauthorized,
}

impl SourceError {
    /// Permanent errors quarantine a symbol; transient ones are retried.
    pub fn is_permanent(&self) -> bool {
        matches!(self, SourceError::NotFound(_) | SourceError::Unauthorized)
    }
}

/// Upstream market-data feed. The engine only ever talks to this trait;
/// the Binance implementation below is the reference deployment.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Up to `limit` most recent closed candles, oldest first. May return
    /// fewer than requested.
    async fn history(
        &self,
        symbol: &Symbol,
        interval: Interval,
        limit: u32,
    ) -> Result<Vec<Candle>, SourceError>;

    /// Batched latest prices. Symbols the venue does not know are simply
    /// absent from the result; callers proceed with the subset.
    async fn latest(&self, symbols: &[Symbol]) -> Result<HashMap<Symbol, Quote>, SourceError>;
}
