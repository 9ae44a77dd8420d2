pub mod settings;

pub use settings::*;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::types::Interval;

/// Boot-time engine configuration: watchlist, balance, cadences, and the
/// initial runtime settings. Loaded from a TOML file with `SCALPER_*`
/// environment overrides layered on top.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub watchlist: Vec<String>,
    pub initial_balance: Decimal,
    /// Candle bucket width ("1m", "5m", "15m").
    pub interval: String,
    /// Base market-data polling cadence, divided by the scaling factor.
    pub poll_interval_secs: u64,
    /// Base decision cadence, divided by the scaling factor.
    pub decision_interval_ms: u64,
    /// Exit monitor cadence; not scaled.
    pub exit_interval_secs: u64,
    /// Decimal places kept on computed quantities (0 = whole units).
    pub quantity_precision: u32,
    /// Sled journal directory; in-memory journal when unset.
    pub journal_path: Option<String>,
    /// Where open positions are serialized if an invariant violation halts
    /// the engine.
    pub crash_file: String,
    pub settings: Settings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            watchlist: vec![
                "BTCUSDT".to_string(),
                "ETHUSDT".to_string(),
                "SOLUSDT".to_string(),
            ],
            initial_balance: dec!(10000),
            interval: "1m".to_string(),
            poll_interval_secs: 10,
            decision_interval_ms: 1500,
            exit_interval_secs: 1,
            quantity_precision: 0,
            journal_path: Some("./journal".to_string()),
            crash_file: "crash_positions.json".to_string(),
            settings: Settings::default(),
        }
    }
}

impl EngineConfig {
    pub fn interval(&self) -> Interval {
        Interval::parse(&self.interval).unwrap_or(Interval::M1)
    }

    pub fn validate(&self) -> Result<()> {
        if self.initial_balance <= Decimal::ZERO {
            anyhow::bail!("initial_balance must be > 0");
        }
        if self.watchlist.is_empty() {
            anyhow::bail!("watchlist must not be empty");
        }
        if Interval::parse(&self.interval).is_none() {
            anyhow::bail!("interval must be one of 1m, 5m, 15m");
        }
        self.settings
            .validate()
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        Ok(())
    }

    /// Load from a TOML file (optional) plus environment overrides.
    pub fn load(path: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("SCALPER").separator("__"))
            .build()
            .context("building configuration")?;
        let engine: EngineConfig = cfg
            .try_deserialize()
            .context("deserializing configuration")?;
        engine.validate()?;
        Ok(engine)
    }

    /// Write the default configuration to disk for `scalper init`.
    pub fn write_default(path: &Path) -> Result<()> {
        let rendered =
            toml::to_string_pretty(&EngineConfig::default()).context("rendering default config")?;
        std::fs::write(path, rendered).with_context(|| format!("writing {}", path.display()))?;
        info!("wrote default configuration to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn toml_round_trip() {
        let cfg = EngineConfig::default();
        let rendered = toml::to_string_pretty(&cfg).unwrap();
        let parsed: EngineConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.initial_balance, cfg.initial_balance);
        assert_eq!(parsed.watchlist, cfg.watchlist);
        assert_eq!(parsed.settings, cfg.settings);
    }

    #[test]
    fn bad_interval_is_rejected() {
        let cfg = EngineConfig {
            interval: "2h".to_string(),
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let parsed: EngineConfig = toml::from_str("initial_balance = \"2500\"").unwrap();
        assert_eq!(parsed.initial_balance, dec!(2500));
        assert_eq!(parsed.poll_interval_secs, 10);
    }
}
