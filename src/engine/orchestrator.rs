use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::{Settings, SettingsError};
use crate::indicators::IndicatorSet;
use crate::journal::{JournalEntry, JournalEvent, JournalWriter};
use crate::market::{scaled_interval, MarketHub};
use crate::risk::{admit, position_size};
use crate::strategy::{compute_targets, synthesize, TradeSignal};
use crate::types::{CloseReason, OrderIntent, Position, PositionSide, Symbol};

use super::{EngineError, EngineState, ExecutionVenue};

/// Deadline for any call into the execution venue.
const VENUE_CALL_DEADLINE: Duration = Duration::from_secs(5);

/// Commands accepted by the single-writer loop. Everything that mutates
/// engine state arrives here; ordering is FIFO.
pub enum Command {
    Enable,
    Disable,
    UpdateSettings {
        settings: Settings,
        reply: oneshot::Sender<Result<(), SettingsError>>,
    },
    ClosePosition {
        symbol: Symbol,
        reason: CloseReason,
        reply: Option<oneshot::Sender<Result<(), EngineError>>>,
    },
    AddSymbol {
        symbol: Symbol,
    },
    RemoveSymbol {
        symbol: Symbol,
        reply: Option<oneshot::Sender<Result<(), EngineError>>>,
    },
    /// Latest marks from the exit monitor; refreshes unrealized P&L.
    UpdateMarks {
        marks: Vec<(Symbol, Decimal)>,
    },
    Shutdown,
}

/// Owns `EngineState` and the journal sequence. All mutation funnels
/// through `commit`, which validates invariants and publishes a fresh
/// snapshot after every change.
pub struct Orchestrator {
    state: EngineState,
    hub: Arc<MarketHub>,
    venue: Arc<dyn ExecutionVenue>,
    journal: JournalWriter,
    state_tx: watch::Sender<Arc<EngineState>>,
    quantity_precision: u32,
    crash_file: PathBuf,
    halted: bool,
}

impl Orchestrator {
    pub fn new(
        state: EngineState,
        hub: Arc<MarketHub>,
        venue: Arc<dyn ExecutionVenue>,
        journal: JournalWriter,
        state_tx: watch::Sender<Arc<EngineState>>,
        quantity_precision: u32,
        crash_file: PathBuf,
    ) -> Self {
        Self {
            state,
            hub,
            venue,
            journal,
            state_tx,
            quantity_precision,
            crash_file,
            halted: false,
        }
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Apply a mutation against a working copy, validate invariants, then
    /// commit, journal and publish. A failed invariant check keeps the last
    /// good state, writes the crash file and halts the engine.
    fn commit<R>(
        &mut self,
        now: DateTime<Utc>,
        f: impl FnOnce(&mut EngineState, &mut Vec<JournalEvent>) -> Result<R, EngineError>,
    ) -> Result<R, EngineError> {
        if self.halted {
            return Err(EngineError::Halted);
        }

        let mut next = self.state.clone();
        let mut events = Vec::new();
        if let Some(rollover) = next.roll_day_if_needed(now) {
            info!("daily rollover at {}", now);
            events.push(rollover);
        }

        let result = f(&mut next, &mut events)?;

        if let Err(violation) = next.check_invariants() {
            self.halt(&violation);
            return Err(EngineError::InvariantViolation(violation));
        }
        let drift = next.balance_drift();
        if !drift.is_zero() {
            warn!("balance drift detected: {}", drift);
        }

        self.state = next;
        for event in events {
            let seq = self.state.advance_seq();
            self.journal.record(JournalEntry {
                seq,
                at: now,
                event,
            });
        }
        let _ = self.state_tx.send(Arc::new(self.state.clone()));
        Ok(result)
    }

    fn halt(&mut self, violation: &str) {
        error!("invariant violation, halting engine: {}", violation);
        self.halted = true;
        let positions: Vec<&Position> = self.state.positions.values().collect();
        match serde_json::to_string_pretty(&positions) {
            Ok(snapshot) => {
                if let Err(e) = std::fs::write(&self.crash_file, snapshot) {
                    error!("failed to write crash file {:?}: {}", self.crash_file, e);
                } else {
                    error!("open positions serialized to {:?}", self.crash_file);
                }
            }
            Err(e) => error!("failed to serialize crash snapshot: {}", e),
        }
    }

    /// One decision pass over the watchlist.
    pub async fn decide_all(&mut self, now: DateTime<Utc>) {
        if self.halted || !self.state.settings.is_enabled {
            return;
        }
        let watchlist: Vec<Symbol> = self.state.watchlist.iter().cloned().collect();
        for symbol in watchlist {
            self.decide_symbol(&symbol, now).await;
        }
    }

    async fn decide_symbol(&mut self, symbol: &Symbol, now: DateTime<Utc>) {
        let Some(view) = self.hub.view(symbol).await else {
            return;
        };
        if view.warming || view.quarantined {
            return;
        }
        let (Some(indicators), Some(quote)) = (view.indicators, view.quote) else {
            return;
        };
        let price = quote.price;

        let trade_signal = synthesize(&indicators, price);
        if !trade_signal.is_actionable() {
            return;
        }
        let side = trade_signal
            .signal
            .side()
            .expect("actionable signal has a side");

        let open_side = self.state.positions.get(symbol).map(|p| p.side);
        match open_side {
            // Same-side signal on an open position: never average in.
            Some(existing) if existing == side => {}
            // Opposite signal: close and let the cooldown block an
            // immediate reverse entry.
            Some(_) => {
                info!("{} opposite signal, closing position", symbol);
                if let Err(e) = self
                    .execute_close(symbol, CloseReason::OppositeSignal, now)
                    .await
                {
                    warn!("failed to close {} on opposite signal: {}", symbol, e);
                }
            }
            None => {
                self.try_open(symbol, &trade_signal, price, &indicators, now)
                    .await;
            }
        }
    }

    async fn try_open(
        &mut self,
        symbol: &Symbol,
        trade_signal: &TradeSignal,
        price: Decimal,
        indicators: &IndicatorSet,
        now: DateTime<Utc>,
    ) {
        let settings = &self.state.settings;
        let Some(targets) = compute_targets(
            price,
            trade_signal.signal,
            indicators.swing_low,
            indicators.swing_high,
            settings.stop_loss_percent,
            settings.take_profit_percent,
        ) else {
            debug!("{} no usable targets at {}", symbol, price);
            return;
        };

        let equity = self.state.trading_balance + self.state.total_pnl;
        let quantity = position_size(
            price,
            targets.stop_loss,
            settings,
            self.state.available_balance,
            equity,
            self.quantity_precision,
        );

        let side = trade_signal.signal.side().expect("actionable signal");
        let intent = OrderIntent {
            symbol: symbol.clone(),
            side,
            quantity,
            entry_price: price,
            stop_loss: targets.stop_loss,
            target: targets.target,
            signal: trade_signal.signal,
            confidence: trade_signal.confidence,
            reason: trade_signal.reason,
        };

        if let Err(rejection) = admit(&intent, &self.state, now) {
            debug!(
                "{} entry rejected: {} ({} @ {:.0}%)",
                symbol, rejection, intent.signal, intent.confidence
            );
            let confidence = intent.confidence;
            let _ = self.commit(now, |state, _| {
                state.record_rejection(symbol, rejection.to_string(), confidence, now);
                Ok(())
            });
            return;
        }

        let fill = match timeout(
            VENUE_CALL_DEADLINE,
            self.venue
                .place_market_order(&intent.symbol, intent.side, intent.quantity),
        )
        .await
        {
            Ok(Ok(fill)) => fill,
            Ok(Err(e)) => {
                warn!("venue rejected open for {}: {}", symbol, e);
                return;
            }
            Err(_) => {
                warn!("venue open call timed out for {}", symbol);
                return;
            }
        };

        // A gapped fill past its own levels would be born inconsistent.
        let fill_ok = match side {
            PositionSide::Long => {
                fill.fill_price > intent.stop_loss && fill.fill_price < intent.target
            }
            PositionSide::Short => {
                fill.fill_price < intent.stop_loss && fill.fill_price > intent.target
            }
        };
        if !fill_ok {
            warn!(
                "{} fill at {} gapped past levels (stop {}, target {}), skipping entry",
                symbol, fill.fill_price, intent.stop_loss, intent.target
            );
            return;
        }

        info!(
            "opening {} {} {} @ {} | target {} stop {} | {} {:.0}%",
            intent.side,
            intent.quantity,
            symbol,
            fill.fill_price,
            intent.target,
            intent.stop_loss,
            intent.reason,
            intent.confidence
        );

        let result = self.commit(now, |state, events| {
            let trade = state.open_position(&intent, fill.fill_price, now);
            events.push(JournalEvent::TradeOpen { trade });
            Ok(())
        });
        if let Err(e) = result {
            error!("failed to commit open for {}: {}", symbol, e);
        }
    }

    /// Close an open position through the venue and commit the result.
    pub async fn execute_close(
        &mut self,
        symbol: &Symbol,
        reason: CloseReason,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let position = self
            .state
            .positions
            .get(symbol)
            .cloned()
            .ok_or_else(|| EngineError::NotOpen(symbol.clone()))?;

        let fill = match timeout(
            VENUE_CALL_DEADLINE,
            self.venue
                .close_position(symbol, position.side, position.quantity),
        )
        .await
        {
            Ok(Ok(fill)) => fill,
            Ok(Err(e)) => {
                warn!("venue close failed for {}: {}", symbol, e);
                return Err(EngineError::Venue(e.to_string()));
            }
            Err(_) => {
                warn!("venue close call timed out for {}", symbol);
                return Err(EngineError::Venue("close call timed out".to_string()));
            }
        };

        self.commit(now, |state, events| {
            let trade = state.close_position(symbol, fill.fill_price, reason, now)?;
            info!(
                "closed {} {} @ {} ({}) pnl {}",
                symbol,
                trade.quantity,
                fill.fill_price,
                reason,
                trade.realized_pnl.unwrap_or_default()
            );
            events.push(JournalEvent::TradeClose { trade });
            Ok(())
        })
    }

    pub async fn handle_command(&mut self, command: Command, now: DateTime<Utc>) {
        match command {
            Command::Enable => {
                let _ = self.commit(now, |state, events| {
                    if !state.settings.is_enabled {
                        state.settings.is_enabled = true;
                        events.push(JournalEvent::SettingsUpdate {
                            settings: state.settings.clone(),
                        });
                        info!("automated execution enabled");
                    }
                    Ok(())
                });
            }
            Command::Disable => {
                let _ = self.commit(now, |state, events| {
                    if state.settings.is_enabled {
                        state.settings.is_enabled = false;
                        events.push(JournalEvent::SettingsUpdate {
                            settings: state.settings.clone(),
                        });
                        info!("automated execution disabled");
                    }
                    Ok(())
                });
            }
            Command::UpdateSettings { settings, reply } => {
                let outcome = match settings.validate() {
                    Err(e) => Err(e),
                    Ok(()) => {
                        let result = self.commit(now, |state, events| {
                            state.settings = settings.clone();
                            events.push(JournalEvent::SettingsUpdate { settings });
                            Ok(())
                        });
                        match result {
                            Ok(()) => {
                                info!("settings updated");
                                Ok(())
                            }
                            Err(e) => Err(SettingsError {
                                fields: vec![e.to_string()],
                            }),
                        }
                    }
                };
                let _ = reply.send(outcome);
            }
            Command::ClosePosition {
                symbol,
                reason,
                reply,
            } => {
                let outcome = self.execute_close(&symbol, reason, now).await;
                if let Some(reply) = reply {
                    let _ = reply.send(outcome);
                } else if let Err(e) = outcome {
                    debug!("close command for {} failed: {}", symbol, e);
                }
            }
            Command::AddSymbol { symbol } => {
                let _ = self.commit(now, |state, _| {
                    if state.watchlist.insert(symbol.clone()) {
                        info!("{} added to watchlist", symbol);
                    }
                    Ok(())
                });
            }
            Command::RemoveSymbol { symbol, reply } => {
                let outcome = self.remove_symbol(&symbol, now).await;
                if let Some(reply) = reply {
                    let _ = reply.send(outcome);
                }
            }
            Command::UpdateMarks { marks } => {
                let _ = self.commit(now, |state, _| {
                    for (symbol, price) in marks {
                        if let Some(position) = state.positions.get_mut(&symbol) {
                            position.mark_to(price);
                        }
                    }
                    Ok(())
                });
            }
            Command::Shutdown => {
                // Handled by the run loop; nothing to do here.
            }
        }
    }

    async fn remove_symbol(
        &mut self,
        symbol: &Symbol,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        if !self.state.watchlist.contains(symbol) {
            return Err(EngineError::UnknownSymbol(symbol.clone()));
        }
        // A position must not outlive its market data feed.
        if self.state.positions.contains_key(symbol) {
            self.execute_close(symbol, CloseReason::Manual, now).await?;
        }
        self.commit(now, |state, _| {
            state.watchlist.remove(symbol);
            state.last_trade_at.remove(symbol);
            info!("{} removed from watchlist", symbol);
            Ok(())
        })
    }

    /// Force-close everything at the last known mark and journal the final
    /// snapshot. Venue calls are skipped: the simulated book is already
    /// gone by shutdown.
    pub async fn shutdown(&mut self, now: DateTime<Utc>) {
        let symbols: Vec<Symbol> = self.state.positions.keys().cloned().collect();
        let closed = symbols.len();
        for symbol in symbols {
            let mark = self.state.positions[&symbol].current_mark;
            let result = self.commit(now, |state, events| {
                let trade = state.close_position(&symbol, mark, CloseReason::Shutdown, now)?;
                events.push(JournalEvent::TradeClose { trade });
                Ok(())
            });
            if let Err(e) = result {
                error!("failed to close {} during shutdown: {}", symbol, e);
            }
        }
        let _ = self.commit(now, |state, events| {
            events.push(JournalEvent::Shutdown {
                total_pnl: state.total_pnl,
                positions_closed: closed,
            });
            Ok(())
        });
        info!(
            "engine shut down: {} positions closed, total pnl {}",
            closed, self.state.total_pnl
        );
    }
}

/// Writer loop: FIFO commands interleaved with decision ticks. On shutdown
/// the remaining queue is drained before positions are force-closed.
pub async fn run_orchestrator(
    mut orchestrator: Orchestrator,
    mut commands: mpsc::Receiver<Command>,
    shutdown_tx: watch::Sender<bool>,
    base_decision: Duration,
) {
    info!("execution orchestrator started");
    loop {
        let delay = scaled_interval(base_decision, orchestrator.state.settings.scaling_factor);
        tokio::select! {
            maybe_command = commands.recv() => {
                match maybe_command {
                    Some(Command::Shutdown) | None => {
                        while let Ok(command) = commands.try_recv() {
                            if !matches!(command, Command::Shutdown) {
                                orchestrator.handle_command(command, Utc::now()).await;
                            }
                        }
                        orchestrator.shutdown(Utc::now()).await;
                        break;
                    }
                    Some(command) => orchestrator.handle_command(command, Utc::now()).await,
                }
            }
            _ = tokio::time::sleep(delay) => {
                orchestrator.decide_all(Utc::now()).await;
            }
        }
        if orchestrator.is_halted() {
            error!("orchestrator halted; shutting the engine down");
            break;
        }
    }
    let _ = shutdown_tx.send(true);
    info!("execution orchestrator stopped");
}
