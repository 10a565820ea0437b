//! Spot price feed adapter

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::errors::{Result, SimulatorError};

/// Default ETH price when neither the user nor the feed has supplied one
pub const DEFAULT_ETH_PRICE: f64 = 3500.0;

#[derive(Debug, Deserialize)]
struct SimplePriceQuote {
    usd: f64,
}

/// Reject prices the engine must never be invoked with
pub fn validate_price(price: f64) -> Result<f64> {
    if price.is_finite() && price > 0.0 {
        Ok(price)
    } else {
        Err(SimulatorError::InvalidPrice(price))
    }
}

/// Parse a `simple/price` response (`{"ethereum":{"usd":3500.12}}`) for `coin_id`
pub fn parse_simple_price(payload: &str, coin_id: &str) -> Result<f64> {
    let quotes: HashMap<String, SimplePriceQuote> = serde_json::from_str(payload)?;
    let quote = quotes
        .get(coin_id)
        .ok_or_else(|| SimulatorError::AssetNotFound(coin_id.to_string()))?;
    validate_price(quote.usd)
}

/// Last known spot price plus the most recent refresh error
#[derive(Debug, Clone)]
pub struct PriceFeed {
    coin_id: String,
    last_good: Option<(f64, DateTime<Utc>)>,
    last_error: Option<String>,
}

impl PriceFeed {
    pub fn new(coin_id: &str) -> Self {
        Self {
            coin_id: coin_id.to_string(),
            last_good: None,
            last_error: None,
        }
    }

    pub fn ethereum() -> Self {
        Self::new("ethereum")
    }

    pub fn ingest(&mut self, payload: &str, now: DateTime<Utc>) -> Result<f64> {
        match parse_simple_price(payload, &self.coin_id) {
            Ok(price) => {
                self.last_good = Some((price, now));
                self.last_error = None;
                Ok(price)
            }
            Err(e) => {
                log::warn!("price feed refresh failed, keeping last good value: {}", e);
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Last good price, or `user_price` if the feed never produced one
    pub fn current_or(&self, user_price: f64) -> f64 {
        self.last_good.map(|(p, _)| p).unwrap_or(user_price)
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_good.map(|(_, at)| at)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_price() {
        let price = parse_simple_price(r#"{"ethereum":{"usd":3512.45}}"#, "ethereum").unwrap();
        assert_eq!(price, 3512.45);
    }

    #[test]
    fn test_invalid_prices_rejected() {
        assert!(parse_simple_price(r#"{"ethereum":{"usd":0}}"#, "ethereum").is_err());
        assert!(parse_simple_price(r#"{"ethereum":{"usd":-5.0}}"#, "ethereum").is_err());
        assert!(parse_simple_price(r#"{"bitcoin":{"usd":90000}}"#, "ethereum").is_err());
        assert!(validate_price(f64::NAN).is_err());
    }

    #[test]
    fn test_feed_retains_last_good_price() {
        let mut feed = PriceFeed::ethereum();
        assert_eq!(feed.current_or(DEFAULT_ETH_PRICE), DEFAULT_ETH_PRICE);

        let now = Utc::now();
        feed.ingest(r#"{"ethereum":{"usd":4000.0}}"#, now).unwrap();
        assert!(feed.ingest("{}", now).is_err());

        assert_eq!(feed.current_or(DEFAULT_ETH_PRICE), 4000.0);
        assert!(feed.last_error().is_some());
        assert_eq!(feed.last_updated(), Some(now));
    }
}
