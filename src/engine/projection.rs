use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

use crate::config::Settings;
use crate::indicators::IndicatorSet;
use crate::market::MarketHub;
use crate::types::{CloseReason, Position, Symbol, Trade};

use super::{Command, DecisionRecord, EngineError, EngineState};

/// One watchlist row as the projection surface sees it.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolView {
    pub symbol: Symbol,
    pub price: Option<Decimal>,
    pub indicators: Option<IndicatorSet>,
    pub warming: bool,
    pub quarantined: bool,
}

/// Read-only projection of the whole engine, safe to hand to any consumer.
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub settings: Settings,
    pub enabled: bool,
    pub watchlist: Vec<SymbolView>,
    pub positions: Vec<Position>,
    pub recent_trades: Vec<Trade>,
    pub recent_rejections: Vec<DecisionRecord>,
    pub trading_balance: Decimal,
    pub available_balance: Decimal,
    pub total_pnl: Decimal,
    pub day_pnl: Decimal,
    pub uptime_seconds: u64,
    pub trades_count: u64,
}

/// Thin projection handle: commands go into the writer queue, reads come
/// from the snapshot channel. A reader never blocks the writer.
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<Command>,
    state_rx: watch::Receiver<Arc<EngineState>>,
    hub: Arc<MarketHub>,
}

impl EngineHandle {
    pub fn new(
        commands: mpsc::Sender<Command>,
        state_rx: watch::Receiver<Arc<EngineState>>,
        hub: Arc<MarketHub>,
    ) -> Self {
        Self {
            commands,
            state_rx,
            hub,
        }
    }

    /// Compose a consistent snapshot from the latest committed state and
    /// the live market hub.
    pub async fn snapshot(&self) -> EngineSnapshot {
        let state = Arc::clone(&self.state_rx.borrow());

        let mut watchlist = Vec::with_capacity(state.watchlist.len());
        for symbol in &state.watchlist {
            let view = self.hub.view(symbol).await;
            let (price, indicators, warming, quarantined) = match view {
                Some(v) => (
                    v.quote.map(|q| q.price),
                    v.indicators,
                    v.warming,
                    v.quarantined,
                ),
                None => (None, None, true, false),
            };
            watchlist.push(SymbolView {
                symbol: symbol.clone(),
                price,
                indicators,
                warming,
                quarantined,
            });
        }

        EngineSnapshot {
            settings: state.settings.clone(),
            enabled: state.settings.is_enabled,
            watchlist,
            positions: state.positions.values().cloned().collect(),
            recent_trades: state.recent_trades.iter().cloned().collect(),
            recent_rejections: state.recent_rejections.iter().cloned().collect(),
            trading_balance: state.trading_balance,
            available_balance: state.available_balance,
            total_pnl: state.total_pnl,
            day_pnl: state.day_pnl,
            uptime_seconds: (Utc::now() - state.started_at).num_seconds().max(0) as u64,
            trades_count: state.trades_count,
        }
    }

    pub async fn enable(&self) -> Result<(), EngineError> {
        self.send(Command::Enable).await
    }

    pub async fn disable(&self) -> Result<(), EngineError> {
        self.send(Command::Disable).await
    }

    pub async fn update_settings(&self, settings: Settings) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::UpdateSettings {
            settings,
            reply: tx,
        })
        .await?;
        rx.await
            .map_err(|_| EngineError::ChannelClosed)?
            .map_err(EngineError::from)
    }

    /// Manual close, injected into the exit pipeline.
    pub async fn close_position(&self, symbol: Symbol) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::ClosePosition {
            symbol,
            reason: CloseReason::Manual,
            reply: Some(tx),
        })
        .await?;
        rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    pub async fn add_symbol(&self, symbol: Symbol) -> Result<(), EngineError> {
        self.send(Command::AddSymbol { symbol }).await
    }

    pub async fn remove_symbol(&self, symbol: Symbol) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::RemoveSymbol {
            symbol,
            reply: Some(tx),
        })
        .await?;
        rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    pub async fn shutdown(&self) -> Result<(), EngineError> {
        self.send(Command::Shutdown).await
    }

    pub fn state_receiver(&self) -> watch::Receiver<Arc<EngineState>> {
        self.state_rx.clone()
    }

    async fn send(&self, command: Command) -> Result<(), EngineError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| EngineError::ChannelClosed)
    }
}
