//! Lending market reference data: borrow rates and collateral risk parameters

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::product::ProductId;

/// Borrow APR used when an asset is not listed in the market
pub const DEFAULT_BORROW_RATE: f64 = 5.0;

/// Liquidation threshold assumed for a leveraged product with no collateral entry
pub const DEFAULT_LIQUIDATION_THRESHOLD: f64 = 80.0;

/// Borrow APRs (percent) keyed by asset symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorrowMarket {
    rates: BTreeMap<String, f64>,
    fallback_rate: f64,
}

fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}

impl BorrowMarket {
    pub fn new(rates: impl IntoIterator<Item = (String, f64)>) -> Self {
        Self {
            rates: rates
                .into_iter()
                .map(|(symbol, rate)| (normalize_symbol(&symbol), rate))
                .collect(),
            fallback_rate: DEFAULT_BORROW_RATE,
        }
    }

    /// Built-in Aave V3 borrow rates
    pub fn default_rates() -> Self {
        Self::new(vec![
            ("USDC".to_string(), 4.7),
            ("USDT".to_string(), 5.2),
            ("USDS".to_string(), 4.0),
        ])
    }

    /// Borrow APR for `symbol`; unlisted assets get the fallback rate
    pub fn rate(&self, symbol: &str) -> f64 {
        self.rates
            .get(&normalize_symbol(symbol))
            .copied()
            .unwrap_or(self.fallback_rate)
    }

    pub fn is_listed(&self, symbol: &str) -> bool {
        self.rates.contains_key(&normalize_symbol(symbol))
    }

    pub fn assets(&self) -> impl Iterator<Item = (&str, f64)> {
        self.rates.iter().map(|(s, r)| (s.as_str(), *r))
    }

    /// Return a copy with live rates merged in (new assets are added)
    pub fn with_rates(&self, live: &HashMap<String, f64>) -> Self {
        let mut refreshed = self.clone();
        for (symbol, &rate) in live {
            if rate.is_finite() {
                refreshed.rates.insert(normalize_symbol(symbol), rate);
            } else {
                log::warn!("ignoring non-finite borrow rate for {}", symbol);
            }
        }
        refreshed
    }
}

impl Default for BorrowMarket {
    fn default() -> Self {
        Self::default_rates()
    }
}

/// Collateral risk parameters for one eligible product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollateralParams {
    pub product_id: ProductId,

    /// Maximum loan-to-value allowed when opening a borrow, in percent
    pub max_ltv: f64,

    /// LTV at which the position becomes liquidatable, in percent
    pub liquidation_threshold: f64,
}

/// Collateral parameters by product
#[derive(Debug, Clone, Default)]
pub struct CollateralTable {
    params: HashMap<ProductId, CollateralParams>,
}

impl CollateralTable {
    pub fn new(params: impl IntoIterator<Item = CollateralParams>) -> Self {
        Self {
            params: params
                .into_iter()
                .map(|p| (p.product_id.clone(), p))
                .collect(),
        }
    }

    /// Built-in Aave V3 parameters for the liquid staking tokens
    pub fn default_params() -> Self {
        Self::new(vec![
            CollateralParams {
                product_id: ProductId::from("wsteth"),
                max_ltv: 80.0,
                liquidation_threshold: 82.5,
            },
            CollateralParams {
                product_id: ProductId::from("weeth"),
                max_ltv: 75.0,
                liquidation_threshold: 78.0,
            },
        ])
    }

    pub fn get(&self, id: &ProductId) -> Option<&CollateralParams> {
        self.params.get(id)
    }

    pub fn is_eligible(&self, id: &ProductId) -> bool {
        self.params.contains_key(id)
    }

    pub fn liquidation_threshold(&self, id: &ProductId) -> f64 {
        self.get(id)
            .map(|p| p.liquidation_threshold)
            .unwrap_or(DEFAULT_LIQUIDATION_THRESHOLD)
    }

    /// Max LTV for `id`; without an entry, the liquidation threshold fallback is used
    pub fn max_ltv(&self, id: &ProductId) -> f64 {
        self.get(id)
            .map(|p| p.max_ltv)
            .unwrap_or(DEFAULT_LIQUIDATION_THRESHOLD)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}
