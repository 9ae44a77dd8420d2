use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::market::MarketHub;
use crate::types::{PositionSide, Symbol};

#[derive(Debug, Clone)]
pub struct Fill {
    pub order_id: String,
    pub fill_price: Decimal,
    pub fill_time: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum VenueError {
    #[error("no mark available for {0}")]
    NoMark(Symbol),
    #[error("venue rejected order: {0}")]
    Rejected(String),
}

/// Order routing boundary. The default paper venue fills synchronously; a
/// real broker adapter would satisfy the same contract.
#[async_trait]
pub trait ExecutionVenue: Send + Sync {
    async fn place_market_order(
        &self,
        symbol: &Symbol,
        side: PositionSide,
        quantity: Decimal,
    ) -> Result<Fill, VenueError>;

    async fn close_position(
        &self,
        symbol: &Symbol,
        side: PositionSide,
        quantity: Decimal,
    ) -> Result<Fill, VenueError>;
}

/// Simulated venue: every order fills immediately at the latest known mark,
/// with no slippage or partial fills.
pub struct PaperVenue {
    hub: Arc<MarketHub>,
}

impl PaperVenue {
    pub fn new(hub: Arc<MarketHub>) -> Self {
        Self { hub }
    }

    async fn fill_at_mark(&self, symbol: &Symbol) -> Result<Fill, VenueError> {
        let price = self
            .hub
            .latest_price(symbol)
            .await
            .ok_or_else(|| VenueError::NoMark(symbol.clone()))?;
        Ok(Fill {
            order_id: Uuid::new_v4().to_string(),
            fill_price: price,
            fill_time: Utc::now(),
        })
    }
}

#[async_trait]
impl ExecutionVenue for PaperVenue {
    async fn place_market_order(
        &self,
        symbol: &Symbol,
        side: PositionSide,
        quantity: Decimal,
    ) -> Result<Fill, VenueError> {
        let fill = self.fill_at_mark(symbol).await?;
        info!(
            "paper fill: {} {} {} @ {}",
            side, quantity, symbol, fill.fill_price
        );
        Ok(fill)
    }

    async fn close_position(
        &self,
        symbol: &Symbol,
        side: PositionSide,
        quantity: Decimal,
    ) -> Result<Fill, VenueError> {
        let fill = self.fill_at_mark(symbol).await?;
        info!(
            "paper close fill: {} {} {} @ {}",
            side.opposite(),
            quantity,
            symbol,
            fill.fill_price
        );
        Ok(fill)
    }
}
