pub mod monitor;
pub mod orchestrator;
pub mod projection;
pub mod state;
pub mod venue;

pub use monitor::*;
pub use orchestrator::*;
pub use projection::*;
pub use state::*;
pub use venue::*;

use thiserror::Error;

use crate::config::SettingsError;
use crate::types::Symbol;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no open position for {0}")]
    NotOpen(Symbol),
    #[error(transparent)]
    InvalidSettings(#[from] SettingsError),
    #[error("unknown symbol {0}")]
    UnknownSymbol(Symbol),
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    #[error("engine halted")]
    Halted,
    #[error("venue failure: {0}")]
    Venue(String),
    #[error("engine unavailable")]
    ChannelClosed,
}
