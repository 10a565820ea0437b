//! Market inputs consumed by the engine as plain numbers, and the feed
//! adapters that turn raw payloads into them

mod funding;
mod price;
mod apy;

pub use funding::{
    FundingFeed, FundingSnapshot, annualize_hourly_rate, parse_meta_and_asset_ctxs,
    FALLBACK_FUNDING_RATE, FALLBACK_MAX_LEVERAGE, FUNDING_CACHE_TTL_SECS,
};
pub use price::{PriceFeed, parse_simple_price, validate_price, DEFAULT_ETH_PRICE};
pub use apy::parse_pool_apys;

use serde::{Deserialize, Serialize};

/// Snapshot of the two external feeds for one projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketInputs {
    /// Spot ETH price override. When `None`, the portfolio's own ETH price is used.
    #[serde(default)]
    pub eth_price: Option<f64>,

    #[serde(default)]
    pub funding: FundingSnapshot,
}

impl MarketInputs {
    pub fn new(eth_price: Option<f64>, funding: FundingSnapshot) -> Self {
        Self { eth_price, funding }
    }

    /// No price override and the fallback funding constants
    pub fn fallback() -> Self {
        Self {
            eth_price: None,
            funding: FundingSnapshot::fallback(),
        }
    }

    /// Current view of both cached feeds
    pub fn from_feeds(price: &PriceFeed, funding: &FundingFeed) -> Self {
        Self {
            eth_price: price.last_updated().map(|_| price.current_or(DEFAULT_ETH_PRICE)),
            funding: funding.current(),
        }
    }

    pub fn with_funding_rate(mut self, funding_rate_annualized: f64) -> Self {
        self.funding.funding_rate_annualized = funding_rate_annualized;
        self
    }

    pub fn with_eth_price(mut self, eth_price: f64) -> Self {
        self.eth_price = Some(eth_price);
        self
    }

    /// ETH price the engine should use: the override if set, else `config_price`
    pub fn resolve_eth_price(&self, config_price: f64) -> f64 {
        self.eth_price.unwrap_or(config_price)
    }
}

impl Default for MarketInputs {
    fn default() -> Self {
        Self::fallback()
    }
}
