use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::types::{Candle, Interval, Symbol};

use super::{MarketDataSource, Quote, SourceError};

const BINANCE_API: &str = "https://api.binance.com";
const REQUESTS_PER_SECOND: u32 = 10;
const REQUEST_TIMEOUT_SECS: u64 = 5;

/// Public-data Binance REST client. No signed endpoints are used, so no API
/// keys are needed.
pub struct BinanceSource {
    client: Client,
    base_url: String,
    limiter: DefaultDirectRateLimiter,
}

impl BinanceSource {
    pub fn new() -> Self {
        Self::with_base_url(BINANCE_API.to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(REQUESTS_PER_SECOND).expect("nonzero"));
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("reqwest client"),
            base_url,
            limiter: RateLimiter::direct(quota),
        }
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, SourceError> {
        self.limiter.until_ready().await;
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::Transient(e.to_string()))?;
        match resp.status() {
            s if s.is_success() => Ok(resp),
            StatusCode::TOO_MANY_REQUESTS => Err(SourceError::RateLimited {
                retry_after: retry_after(&resp),
            }),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SourceError::Unauthorized),
            s => Err(SourceError::Transient(format!("http status {}", s))),
        }
    }
}

impl Default for BinanceSource {
    fn default() -> Self {
        Self::new()
    }
}

fn retry_after(resp: &reqwest::Response) -> Duration {
    resp.headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(1))
}

#[async_trait]
impl MarketDataSource for BinanceSource {
    async fn history(
        &self,
        symbol: &Symbol,
        interval: Interval,
        limit: u32,
    ) -> Result<Vec<Candle>, SourceError> {
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url,
            symbol.as_str(),
            interval.as_str(),
            limit
        );

        let resp = match self.get(&url).await {
            // Binance answers 400 (code -1121) for unknown symbols.
            Err(SourceError::Transient(msg)) if msg.contains("400") => {
                return Err(SourceError::NotFound(symbol.clone()));
            }
            other => other?,
        };

        let rows: Vec<Vec<serde_json::Value>> = resp
            .json()
            .await
            .map_err(|e| SourceError::Transient(e.to_string()))?;

        let candles: Result<Vec<Candle>, SourceError> = rows
            .into_iter()
            .map(|row| parse_kline_row(symbol, &row))
            .collect();
        let candles = candles?;
        debug!("fetched {} candles for {}", candles.len(), symbol);
        Ok(candles)
    }

    async fn latest(&self, symbols: &[Symbol]) -> Result<HashMap<Symbol, Quote>, SourceError> {
        if symbols.is_empty() {
            return Ok(HashMap::new());
        }
        let url = format!(
            "{}/api/v3/ticker/24hr?symbols={}",
            self.base_url,
            symbols_param(symbols)
        );
        let resp = self.get(&url).await?;
        let tickers: Vec<Ticker24h> = resp
            .json()
            .await
            .map_err(|e| SourceError::Transient(e.to_string()))?;

        let mut quotes = HashMap::with_capacity(tickers.len());
        for t in tickers {
            let price = Decimal::from_str(&t.last_price)
                .map_err(|e| SourceError::Transient(e.to_string()))?;
            let volume = Decimal::from_str(&t.volume)
                .map_err(|e| SourceError::Transient(e.to_string()))?;
            let timestamp = Utc
                .timestamp_millis_opt(t.close_time)
                .single()
                .unwrap_or_else(Utc::now);
            quotes.insert(
                Symbol::new(t.symbol),
                Quote {
                    price,
                    volume,
                    timestamp,
                },
            );
        }
        Ok(quotes)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    symbol: String,
    last_price: String,
    volume: String,
    close_time: i64,
}

/// Binance wants the batch as a JSON array literal in the query string.
fn symbols_param(symbols: &[Symbol]) -> String {
    let quoted: Vec<String> = symbols
        .iter()
        .map(|s| format!("%22{}%22", s.as_str()))
        .collect();
    format!("%5B{}%5D", quoted.join(","))
}

fn parse_kline_row(symbol: &Symbol, row: &[serde_json::Value]) -> Result<Candle, SourceError> {
    let open_time = row
        .first()
        .and_then(|v| v.as_i64())
        .ok_or_else(|| SourceError::Transient("kline row missing open time".to_string()))?;

    let field = |idx: usize| -> Result<Decimal, SourceError> {
        let s = row
            .get(idx)
            .and_then(|v| v.as_str())
            .ok_or_else(|| SourceError::Transient(format!("kline row missing field {}", idx)))?;
        Decimal::from_str(s).map_err(|e| SourceError::Transient(e.to_string()))
    };

    Ok(Candle {
        symbol: symbol.clone(),
        open_time: Utc
            .timestamp_millis_opt(open_time)
            .single()
            .ok_or_else(|| SourceError::Transient("invalid kline timestamp".to_string()))?,
        open: field(1)?,
        high: field(2)?,
        low: field(3)?,
        close: field(4)?,
        volume: field(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn kline_row_parses() {
        let symbol = Symbol::new("BTCUSDT");
        let row = vec![
            json!(1700000000000i64),
            json!("37000.00"),
            json!("37050.00"),
            json!("36990.00"),
            json!("37020.00"),
            json!("123.456"),
        ];
        let candle = parse_kline_row(&symbol, &row).unwrap();
        assert_eq!(candle.close, dec!(37020.00));
        assert_eq!(candle.volume, dec!(123.456));
        assert!(candle.is_well_formed());
    }

    #[test]
    fn malformed_kline_row_is_transient() {
        let symbol = Symbol::new("BTCUSDT");
        let row = vec![json!(1700000000000i64), json!("not-a-number")];
        assert!(matches!(
            parse_kline_row(&symbol, &row),
            Err(SourceError::Transient(_))
        ));
    }

    #[test]
    fn symbols_param_is_url_encoded_json() {
        let symbols = vec![Symbol::new("BTCUSDT"), Symbol::new("ETHUSDT")];
        assert_eq!(
            symbols_param(&symbols),
            "%5B%22BTCUSDT%22,%22ETHUSDT%22%5D"
        );
    }

    #[test]
    fn ticker_deserializes_from_binance_shape() {
        let raw = r#"{"symbol":"BTCUSDT","lastPrice":"37000.12","volume":"1000.5","closeTime":1700000000000}"#;
        let t: Ticker24h = serde_json::from_str(raw).unwrap();
        assert_eq!(t.symbol, "BTCUSDT");
        assert_eq!(t.last_price, "37000.12");
    }
}
