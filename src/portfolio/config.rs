//! Portfolio configuration: investment split, product weights, leverage and hedge settings
//!
//! A `PortfolioConfig` is an immutable value. Every `with_*` mutation returns a
//! new config, so a host can keep earlier values for undo or comparison.

use serde::{Deserialize, Serialize};

use crate::catalog::{Product, ProductCatalog, ProductId};
use crate::market::{DEFAULT_ETH_PRICE, FALLBACK_MAX_LEVERAGE};

/// Default share of the hedge allocation deployed as margin
pub const DEFAULT_FUND_ALLOCATION: f64 = 80.0;

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

fn clamp_non_negative(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.max(0.0)
    }
}

/// Which allocation bucket an entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Eth,
    Stablecoin,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Eth => "ETH",
            Bucket::Stablecoin => "Stablecoin",
        }
    }
}

/// On-chain leverage loop attached to an ETH allocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeverageConfig {
    pub enabled: bool,

    /// Share of the position posted as collateral, in percent
    pub collateral_percent: f64,

    /// Borrowed amount as a share of collateral value, in percent
    pub ltv: f64,

    /// Asset borrowed (e.g. "USDC")
    pub borrow_asset: String,

    /// Product the borrowed funds are deployed into
    pub deploy_target_id: ProductId,
}

impl LeverageConfig {
    pub fn new(collateral_percent: f64, ltv: f64, borrow_asset: &str, deploy_target: &str) -> Self {
        Self {
            enabled: true,
            collateral_percent,
            ltv,
            borrow_asset: borrow_asset.to_string(),
            deploy_target_id: ProductId::from(deploy_target),
        }
    }
}

/// Weight of one product within a bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationEntry {
    pub product_id: ProductId,
    pub selected: bool,

    /// Share of the bucket, in percent
    pub weight: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leverage: Option<LeverageConfig>,
}

impl AllocationEntry {
    pub fn new(product_id: &str, selected: bool, weight: f64) -> Self {
        Self {
            product_id: ProductId::from(product_id),
            selected,
            weight,
            leverage: None,
        }
    }

    pub fn with_leverage(mut self, leverage: LeverageConfig) -> Self {
        self.leverage = Some(leverage);
        self
    }

    /// Entry contributes a position (selected with a positive weight)
    pub fn is_active(&self) -> bool {
        self.selected && self.weight > 0.0
    }

    /// Leverage settings if the loop is switched on
    pub fn active_leverage(&self) -> Option<&LeverageConfig> {
        self.leverage.as_ref().filter(|l| l.enabled)
    }
}

/// Short perpetual hedge settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HedgeConfig {
    pub enabled: bool,

    /// Share of the total investment set aside for the hedge, in percent
    pub allocation_percent: f64,

    /// Share of the hedge allocation deployed as margin, in percent
    #[serde(default = "default_fund_allocation")]
    pub fund_allocation: f64,

    /// Position leverage multiplier
    pub leverage: f64,
}

fn default_fund_allocation() -> f64 {
    DEFAULT_FUND_ALLOCATION
}

impl HedgeConfig {
    /// Hedge is on and has funds assigned
    pub fn is_active(&self) -> bool {
        self.enabled && self.allocation_percent > 0.0
    }
}

impl Default for HedgeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allocation_percent: 0.0,
            fund_allocation: DEFAULT_FUND_ALLOCATION,
            leverage: 1.0,
        }
    }
}

/// Complete user configuration for one projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioConfig {
    /// Total investment, in USD
    pub investment_amount: f64,

    /// Simulation horizon, in years
    pub investment_period: f64,

    /// Share of the investment in the ETH-yield bucket, in percent
    pub eth_ratio: f64,

    /// ETH spot price, in USD
    pub eth_price: f64,

    /// Hypothetical ETH price change over the horizon, in percent
    pub price_change_scenario: f64,

    #[serde(default)]
    pub hedge_config: HedgeConfig,

    #[serde(default)]
    pub eth_allocations: Vec<AllocationEntry>,

    #[serde(default)]
    pub stablecoin_allocations: Vec<AllocationEntry>,
}

impl PortfolioConfig {
    /// Default configuration with one entry per catalog product
    pub fn for_catalog(catalog: &ProductCatalog) -> Self {
        let entries = |products: Vec<&Product>, selected_id: &str| {
            products
                .into_iter()
                .map(|p| {
                    let selected = p.id.as_str() == selected_id;
                    AllocationEntry::new(p.id.as_str(), selected, if selected { 100.0 } else { 0.0 })
                })
                .collect::<Vec<_>>()
        };

        Self {
            investment_amount: 1_000_000.0,
            investment_period: 1.0,
            eth_ratio: 70.0,
            eth_price: DEFAULT_ETH_PRICE,
            price_change_scenario: 0.0,
            hedge_config: HedgeConfig::default(),
            eth_allocations: entries(catalog.eth_products().collect(), "wsteth"),
            stablecoin_allocations: entries(catalog.stablecoin_products().collect(), "susde"),
        }
    }

    /// Stablecoin share derived from the other two buckets. May be negative.
    pub fn stablecoin_ratio(&self) -> f64 {
        100.0 - self.eth_ratio - self.hedge_config.allocation_percent
    }

    pub fn allocations(&self, bucket: Bucket) -> &[AllocationEntry] {
        match bucket {
            Bucket::Eth => &self.eth_allocations,
            Bucket::Stablecoin => &self.stablecoin_allocations,
        }
    }

    fn allocations_mut(&mut self, bucket: Bucket) -> &mut Vec<AllocationEntry> {
        match bucket {
            Bucket::Eth => &mut self.eth_allocations,
            Bucket::Stablecoin => &mut self.stablecoin_allocations,
        }
    }

    /// Sum of weights over selected entries
    pub fn selected_weight(&self, bucket: Bucket) -> f64 {
        self.allocations(bucket)
            .iter()
            .filter(|a| a.selected)
            .map(|a| a.weight)
            .sum()
    }

    pub fn with_investment_amount(&self, amount: f64) -> Self {
        Self {
            investment_amount: clamp_non_negative(amount),
            ..self.clone()
        }
    }

    pub fn with_investment_period(&self, years: f64) -> Self {
        Self {
            investment_period: clamp_non_negative(years),
            ..self.clone()
        }
    }

    pub fn with_eth_ratio(&self, ratio: f64) -> Self {
        Self {
            eth_ratio: clamp_percent(ratio),
            ..self.clone()
        }
    }

    pub fn with_eth_price(&self, price: f64) -> Self {
        Self {
            eth_price: clamp_non_negative(price),
            ..self.clone()
        }
    }

    /// Scenario in percent; at least -100 (price cannot go below zero)
    pub fn with_price_change(&self, percent: f64) -> Self {
        let percent = if percent.is_nan() { 0.0 } else { percent.max(-100.0) };
        Self {
            price_change_scenario: percent,
            ..self.clone()
        }
    }

    /// Set the hedge allocation; the hedge is enabled exactly when it is non-zero
    pub fn with_hedge_allocation(&self, percent: f64) -> Self {
        let percent = clamp_percent(percent);
        let mut next = self.clone();
        next.hedge_config.allocation_percent = percent;
        next.hedge_config.enabled = percent > 0.0;
        next
    }

    pub fn with_hedge_fund_allocation(&self, percent: f64) -> Self {
        let mut next = self.clone();
        next.hedge_config.fund_allocation = clamp_percent(percent);
        next
    }

    /// Set hedge leverage clamped to `[1, max_leverage]`
    pub fn with_hedge_leverage(&self, leverage: f64, max_leverage: f64) -> Self {
        let max_leverage = if max_leverage.is_finite() && max_leverage >= 1.0 {
            max_leverage
        } else {
            FALLBACK_MAX_LEVERAGE
        };
        let leverage = if leverage.is_nan() { 1.0 } else { leverage.clamp(1.0, max_leverage) };
        let mut next = self.clone();
        next.hedge_config.leverage = leverage;
        next
    }

    /// Set the weight of `id` in `bucket`, appending an entry if absent.
    /// A positive weight selects the entry.
    pub fn with_weight(&self, bucket: Bucket, id: &ProductId, weight: f64) -> Self {
        let weight = clamp_percent(weight);
        let mut next = self.clone();
        let entries = next.allocations_mut(bucket);
        match entries.iter_mut().find(|a| &a.product_id == id) {
            Some(entry) => {
                entry.weight = weight;
                if weight > 0.0 {
                    entry.selected = true;
                }
            }
            None => entries.push(AllocationEntry {
                product_id: id.clone(),
                selected: weight > 0.0,
                weight,
                leverage: None,
            }),
        }
        next
    }

    pub fn with_selected(&self, bucket: Bucket, id: &ProductId, selected: bool) -> Self {
        let mut next = self.clone();
        if let Some(entry) = next
            .allocations_mut(bucket)
            .iter_mut()
            .find(|a| &a.product_id == id)
        {
            entry.selected = selected;
        }
        next
    }

    /// Attach or remove a leverage loop on an ETH allocation
    pub fn with_leverage(&self, id: &ProductId, leverage: Option<LeverageConfig>) -> Self {
        let mut next = self.clone();
        if let Some(entry) = next.eth_allocations.iter_mut().find(|a| &a.product_id == id) {
            entry.leverage = leverage.map(|mut l| {
                l.collateral_percent = clamp_percent(l.collateral_percent);
                l.ltv = clamp_percent(l.ltv);
                l
            });
        }
        next
    }
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self::for_catalog(&ProductCatalog::default_products())
    }
}
