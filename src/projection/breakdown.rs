//! Projection output types

use serde::{Deserialize, Serialize};

use super::risk::{HedgeRisk, LendingRisk};
use crate::catalog::{Denomination, ProductId};

/// Leverage loop attached to one ETH allocation, selected or not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeverageLine {
    /// ETH allocation posted as collateral
    pub collateral_id: ProductId,

    /// USD value of that allocation
    pub position_value: f64,

    pub borrow_asset: String,
    pub deploy_target_id: ProductId,

    /// `false` when the deploy target is not in the catalog
    pub deploy_target_found: bool,

    pub collateral_value: f64,
    pub borrowed: f64,
    pub borrow_rate: f64,
    pub borrow_cost: f64,
    pub deploy_apy: f64,
    pub deploy_yield: f64,
    pub net_yield: f64,

    /// Liquidation threshold used, in percent
    pub liquidation_threshold: f64,
    pub max_ltv: f64,

    pub health_factor: Option<f64>,
    pub liquidation_price: Option<f64>,
}

/// Position and yield of one selected product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductLine {
    pub product_id: ProductId,
    pub name: String,
    pub protocol: String,
    pub denomination: Denomination,
    pub apy: f64,

    /// Share of the bucket, in percent
    pub weight: f64,

    /// Share of the whole investment, in percent
    pub allocation_of_portfolio: f64,

    pub position_value: f64,
    pub yield_value: f64,

    /// ETH units, for ETH-denominated products only
    pub position_in_eth: Option<f64>,
    pub yield_in_eth: Option<f64>,
}

impl ProductLine {
    pub fn is_eth(&self) -> bool {
        self.denomination == Denomination::Eth
    }
}

/// Sums over all leverage loops
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeverageTotals {
    pub total_collateral: f64,
    pub total_borrowed: f64,
    pub total_deploy_yield: f64,
    pub total_borrow_cost: f64,
    pub total_net: f64,

    /// Σ collateral × liquidation threshold
    pub risk_adjusted_collateral: f64,

    /// Σ collateral × max LTV
    pub max_ltv_collateral: f64,
}

impl LeverageTotals {
    pub fn add(&mut self, line: &LeverageLine) {
        self.total_collateral += line.collateral_value;
        self.total_borrowed += line.borrowed;
        self.total_deploy_yield += line.deploy_yield;
        self.total_borrow_cost += line.borrow_cost;
        self.total_net = self.total_deploy_yield - self.total_borrow_cost;
        self.risk_adjusted_collateral += line.collateral_value * line.liquidation_threshold / 100.0;
        self.max_ltv_collateral += line.collateral_value * line.max_ltv / 100.0;
    }
}

/// USD effect of the ETH price scenario on the ETH bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceImpact {
    pub price_change_percent: f64,
    pub price_multiplier: f64,
    pub projected_eth_price: f64,
    pub principal_impact: f64,
    pub yield_impact: f64,
    pub total_price_impact: f64,
}

/// Short perpetual hedge outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HedgeProjection {
    pub allocation_usd: f64,
    pub deployed_margin: f64,
    pub leverage: f64,
    pub position_size: f64,
    pub funding_rate: f64,
    pub funding_income: f64,
    pub price_pnl: f64,
    pub net_return: f64,
    pub risk: HedgeRisk,
}

/// Portfolio-level aggregates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub eth_bucket_usd: f64,
    pub stable_bucket_usd: f64,
    pub hedge_bucket_usd: f64,
    pub stablecoin_ratio: f64,

    pub eth_position_in_eth: f64,
    pub total_eth_yield: f64,
    pub total_eth_yield_in_eth: f64,
    pub total_stablecoin_yield: f64,
    pub weighted_eth_apy: f64,
    pub weighted_stablecoin_apy: f64,

    pub total_leverage_net: f64,
    pub total_price_impact: f64,
    pub hedge_net_return: f64,

    pub total_return: f64,
    pub expected_balance_usd: f64,
    pub final_eth_in_eth: f64,
    pub final_eth_value_usd: f64,
    pub final_usd_value: f64,
    pub final_hedge_value_usd: f64,

    /// Return excluding every price-driven term
    pub yield_only_return: f64,
    pub portfolio_apy: f64,

    /// Share of the investment placed into products and hedge margin, in percent
    pub deployed_percent: f64,
}

/// Complete projection for one configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionResult {
    pub investment_amount: f64,
    pub investment_period: f64,
    pub eth_price: f64,

    pub eth_lines: Vec<ProductLine>,
    pub stablecoin_lines: Vec<ProductLine>,
    pub leverage_lines: Vec<LeverageLine>,
    pub leverage: LeverageTotals,
    pub price_impact: PriceImpact,

    /// `None` when no hedge is configured
    pub hedge: Option<HedgeProjection>,

    pub totals: Totals,

    /// `None` when nothing is borrowed
    pub lending_risk: Option<LendingRisk>,
}

impl ProjectionResult {
    pub fn lines(&self) -> impl Iterator<Item = &ProductLine> {
        self.eth_lines.iter().chain(self.stablecoin_lines.iter())
    }

    pub fn leverage_for(&self, collateral_id: &ProductId) -> Option<&LeverageLine> {
        self.leverage_lines.iter().find(|l| &l.collateral_id == collateral_id)
    }

    pub fn has_hedge(&self) -> bool {
        self.hedge.is_some()
    }

    /// Get summary statistics
    pub fn summary(&self) -> ProjectionSummary {
        let t = &self.totals;
        ProjectionSummary {
            price_change_percent: self.price_impact.price_change_percent,
            projected_eth_price: self.price_impact.projected_eth_price,
            total_eth_yield: t.total_eth_yield,
            total_stablecoin_yield: t.total_stablecoin_yield,
            total_leverage_net: t.total_leverage_net,
            total_price_impact: t.total_price_impact,
            hedge_net_return: t.hedge_net_return,
            total_return: t.total_return,
            expected_balance_usd: t.expected_balance_usd,
            portfolio_apy: t.portfolio_apy,
            lending_health_factor: self.lending_risk.as_ref().map(|r| r.health_factor),
            hedge_health_factor: self.hedge.as_ref().map(|h| h.risk.health_factor),
        }
    }
}

/// Flat row of headline numbers, one per projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionSummary {
    pub price_change_percent: f64,
    pub projected_eth_price: f64,
    pub total_eth_yield: f64,
    pub total_stablecoin_yield: f64,
    pub total_leverage_net: f64,
    pub total_price_impact: f64,
    pub hedge_net_return: f64,
    pub total_return: f64,
    pub expected_balance_usd: f64,
    pub portfolio_apy: f64,
    pub lending_health_factor: Option<f64>,
    pub hedge_health_factor: Option<f64>,
}
