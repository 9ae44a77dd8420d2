pub mod store;

pub use store::*;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::config::Settings;
use crate::types::Trade;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JournalEvent {
    TradeOpen {
        trade: Trade,
    },
    TradeClose {
        trade: Trade,
    },
    SettingsUpdate {
        settings: Settings,
    },
    DayRollover {
        day: NaiveDate,
        realized: Decimal,
    },
    Shutdown {
        total_pnl: Decimal,
        positions_closed: usize,
    },
}

/// One durable record. Sequence numbers are assigned by the engine writer
/// and are strictly monotonic; the sink never reorders them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub event: JournalEvent,
}

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal io: {0}")]
    Io(String),
    #[error("journal serialization: {0}")]
    Serde(String),
}

/// Append-only sink. Implementations must tolerate replays of the same
/// sequence number (delivery is at-least-once).
#[async_trait]
pub trait Journal: Send + Sync {
    async fn append(&self, entry: &JournalEntry) -> Result<(), JournalError>;
}

/// Default sink: everything stays in memory. Used by tests and by runs
/// without a journal path configured.
#[derive(Debug, Default)]
pub struct MemoryJournal {
    entries: Mutex<Vec<JournalEntry>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.lock().expect("journal mutex").clone()
    }
}

#[async_trait]
impl Journal for MemoryJournal {
    async fn append(&self, entry: &JournalEntry) -> Result<(), JournalError> {
        self.entries.lock().expect("journal mutex").push(entry.clone());
        Ok(())
    }
}

/// Hot-path handle: `record` enqueues and returns immediately. A background
/// task flushes entries in order, retrying failed appends with backoff so a
/// sink hiccup never stalls trading.
#[derive(Clone)]
pub struct JournalWriter {
    tx: mpsc::UnboundedSender<JournalEntry>,
}

impl JournalWriter {
    pub fn spawn(journal: Arc<dyn Journal>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(flush_loop(journal, rx));
        (Self { tx }, handle)
    }

    pub fn record(&self, entry: JournalEntry) {
        if self.tx.send(entry).is_err() {
            error!("journal flusher gone; entry dropped");
        }
    }
}

async fn flush_loop(journal: Arc<dyn Journal>, mut rx: mpsc::UnboundedReceiver<JournalEntry>) {
    while let Some(entry) = rx.recv().await {
        let mut attempt = 0u32;
        loop {
            match journal.append(&entry).await {
                Ok(()) => break,
                Err(e) => {
                    attempt += 1;
                    warn!("journal append failed (attempt {}): {}", attempt, e);
                    let backoff = Duration::from_millis(250 * (1 << attempt.min(5)) as u64);
                    tokio::time::sleep(backoff.min(Duration::from_secs(5))).await;
                }
            }
        }
    }
}
