use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Runtime-tunable trading settings. Updated atomically through the
/// orchestrator; every update is validated and journaled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Reject signals below this confidence (0-100).
    pub min_confidence: Decimal,
    /// Cap on the notional of any single entry, in account currency.
    pub max_position_size: Decimal,
    /// Percent of equity risked per trade; caps quantity via the stop distance.
    pub risk_per_trade: Decimal,
    /// Halt new entries once |day P&L| reaches this.
    pub max_daily_loss: Decimal,
    /// Cap on simultaneously open positions.
    pub max_positions: usize,
    /// Fallback stop distance in percent when no swing level is usable.
    pub stop_loss_percent: Decimal,
    /// Fallback target distance in percent.
    pub take_profit_percent: Decimal,
    /// Force-close positions older than this.
    pub max_hold_seconds: u64,
    /// Multiplier on loop cadences; higher means faster ticks.
    pub scaling_factor: Decimal,
    /// Master switch for automated entries.
    pub is_enabled: bool,
    /// Minimum gap between entries on the same symbol.
    pub cooldown_seconds: u64,
    /// Fraction of notional reserved as margin when opening a short.
    pub short_margin_percent: Decimal,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            min_confidence: dec!(60),
            max_position_size: dec!(10000),
            risk_per_trade: dec!(2),
            max_daily_loss: dec!(500),
            max_positions: 3,
            stop_loss_percent: dec!(0.5),
            take_profit_percent: dec!(1),
            max_hold_seconds: 300,
            scaling_factor: dec!(1),
            is_enabled: true,
            cooldown_seconds: 30,
            short_margin_percent: dec!(20),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("invalid settings: {}", fields.join(", "))]
pub struct SettingsError {
    pub fields: Vec<String>,
}

impl Settings {
    /// Validate all fields, reporting every offending one at once.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let mut fields = Vec::new();

        if self.min_confidence < Decimal::ZERO || self.min_confidence > dec!(100) {
            fields.push("min_confidence must be within [0, 100]".to_string());
        }
        if self.max_position_size <= Decimal::ZERO {
            fields.push("max_position_size must be > 0".to_string());
        }
        if self.risk_per_trade <= Decimal::ZERO || self.risk_per_trade > dec!(10) {
            fields.push("risk_per_trade must be within (0, 10]".to_string());
        }
        if self.max_daily_loss <= Decimal::ZERO {
            fields.push("max_daily_loss must be > 0".to_string());
        }
        if self.max_positions == 0 {
            fields.push("max_positions must be > 0".to_string());
        }
        if self.stop_loss_percent <= Decimal::ZERO || self.stop_loss_percent > dec!(10) {
            fields.push("stop_loss_percent must be within (0, 10]".to_string());
        }
        if self.take_profit_percent <= self.stop_loss_percent * dec!(0.5) {
            fields.push("take_profit_percent must exceed half of stop_loss_percent".to_string());
        }
        if self.max_hold_seconds < 5 {
            fields.push("max_hold_seconds must be >= 5".to_string());
        }
        if self.scaling_factor <= Decimal::ZERO {
            fields.push("scaling_factor must be > 0".to_string());
        }
        if self.short_margin_percent <= Decimal::ZERO || self.short_margin_percent > dec!(100) {
            fields.push("short_margin_percent must be within (0, 100]".to_string());
        }

        if fields.is_empty() {
            Ok(())
        } else {
            Err(SettingsError { fields })
        }
    }
}
