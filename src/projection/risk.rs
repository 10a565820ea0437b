//! Health factors and liquidation prices for the two leverage mechanisms.
//!
//! Lending loops are over-collateralized and liquidate when the ETH price
//! falls. The short perpetual hedge is margined and liquidates when the ETH
//! price rises. Every metric that would need a zero or missing denominator
//! is reported as `None`.

use serde::{Deserialize, Serialize};

/// Maintenance margin as a fraction of hedge notional
pub const MAINTENANCE_MARGIN_RATE: f64 = 0.005;

/// Hedge health factor reported when nothing can erode the margin
pub const HEDGE_HF_SENTINEL: f64 = 99.0;

pub const SAFE_HEALTH_FACTOR: f64 = 1.5;
pub const MODERATE_HEALTH_FACTOR: f64 = 1.2;

/// Coarse health band used for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Safe,
    Moderate,
    Risky,
}

impl HealthStatus {
    pub fn from_health_factor(health_factor: f64) -> Self {
        if health_factor >= SAFE_HEALTH_FACTOR {
            HealthStatus::Safe
        } else if health_factor >= MODERATE_HEALTH_FACTOR {
            HealthStatus::Moderate
        } else {
            HealthStatus::Risky
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Safe => "Safe",
            HealthStatus::Moderate => "Moderate",
            HealthStatus::Risky => "Risky",
        }
    }
}

/// Risk-adjusted collateral over debt. `None` when nothing is borrowed.
pub fn lending_health_factor(risk_adjusted_collateral: f64, borrowed: f64) -> Option<f64> {
    if borrowed > 0.0 {
        Some(risk_adjusted_collateral / borrowed)
    } else {
        None
    }
}

/// Fraction the ETH price must fall for the health factor to reach 1
pub fn drop_fraction(health_factor: f64) -> f64 {
    1.0 - 1.0 / health_factor
}

/// ETH price at which a lending position reaches health factor 1
pub fn lending_liquidation_price(current_eth_price: f64, health_factor: Option<f64>) -> Option<f64> {
    let hf = health_factor.filter(|hf| *hf > 0.0 && hf.is_finite())?;
    Some(current_eth_price * (1.0 - drop_fraction(hf)))
}

/// Health factor after ETH moves from `current_eth_price` to `eth_price`.
///
/// Collateral is ETH-denominated and debt is in stablecoins, so the factor
/// scales with the price ratio.
pub fn health_factor_at_price(health_factor: f64, current_eth_price: f64, eth_price: f64) -> Option<f64> {
    if current_eth_price > 0.0 {
        Some(health_factor * eth_price / current_eth_price)
    } else {
        None
    }
}

/// ETH price at which a short of `position_size` backed by `margin` is liquidated
pub fn hedge_liquidation_price(eth_price: f64, margin: f64, position_size: f64) -> Option<f64> {
    if position_size <= 0.0 {
        return None;
    }
    let buffer = (margin - position_size * MAINTENANCE_MARGIN_RATE) / position_size;
    Some(eth_price * (1.0 + buffer))
}

/// Margin over scenario loss plus maintenance requirement.
///
/// A short only loses on a price rise. With no loss and no requirement the
/// position cannot be liquidated and the sentinel is returned.
pub fn hedge_health_factor(position_size: f64, margin: f64, price_change_percent: f64) -> f64 {
    let unrealized_loss = position_size * (price_change_percent / 100.0).max(0.0);
    let maintenance_required = position_size * MAINTENANCE_MARGIN_RATE;
    let exposure = unrealized_loss + maintenance_required;
    if exposure > 0.0 {
        margin / exposure
    } else {
        HEDGE_HF_SENTINEL
    }
}

/// Aggregate risk of all leveraged ETH positions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LendingRisk {
    pub total_collateral: f64,
    pub total_borrowed: f64,

    /// Σ collateral × liquidation threshold, in USD
    pub risk_adjusted_collateral: f64,

    /// Collateral-weighted liquidation threshold, in percent
    pub weighted_liquidation_threshold: f64,

    pub health_factor: f64,

    /// Same ratio using max LTV instead of liquidation threshold
    pub max_ltv_health_factor: f64,

    pub liquidatable: bool,
    pub above_max_ltv: bool,

    pub liquidation_price: Option<f64>,

    /// ETH price fall to liquidation, in percent (negative when already liquidatable)
    pub drop_to_liquidation_percent: f64,

    /// Health factor at the scenario's projected price
    pub scenario_health_factor: Option<f64>,

    pub status: HealthStatus,
}

impl LendingRisk {
    /// Build from aggregate collateral sums. `None` when nothing is borrowed.
    pub fn assess(
        total_collateral: f64,
        risk_adjusted_collateral: f64,
        max_ltv_collateral: f64,
        total_borrowed: f64,
        eth_price: f64,
        projected_eth_price: f64,
    ) -> Option<Self> {
        let health_factor = lending_health_factor(risk_adjusted_collateral, total_borrowed)?;
        let max_ltv_health_factor = max_ltv_collateral / total_borrowed;

        let weighted_liquidation_threshold = if total_collateral > 0.0 {
            risk_adjusted_collateral / total_collateral * 100.0
        } else {
            0.0
        };
        let drop_to_liquidation_percent = if health_factor > 0.0 {
            drop_fraction(health_factor) * 100.0
        } else {
            100.0
        };

        Some(Self {
            total_collateral,
            total_borrowed,
            risk_adjusted_collateral,
            weighted_liquidation_threshold,
            health_factor,
            max_ltv_health_factor,
            liquidatable: health_factor < 1.0,
            above_max_ltv: max_ltv_health_factor < 1.0,
            liquidation_price: lending_liquidation_price(eth_price, Some(health_factor)),
            drop_to_liquidation_percent,
            scenario_health_factor: health_factor_at_price(health_factor, eth_price, projected_eth_price),
            status: HealthStatus::from_health_factor(health_factor),
        })
    }
}

/// Liquidation metrics of the short hedge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HedgeRisk {
    /// `None` for a zero-size position
    pub liquidation_price: Option<f64>,

    /// ETH price rise to liquidation, in percent
    pub rise_to_liquidation_percent: Option<f64>,

    pub health_factor: f64,
    pub status: HealthStatus,
}

impl HedgeRisk {
    pub fn assess(eth_price: f64, margin: f64, position_size: f64, price_change_percent: f64) -> Self {
        let liquidation_price = hedge_liquidation_price(eth_price, margin, position_size);
        let rise_to_liquidation_percent = if position_size > 0.0 {
            Some((margin - position_size * MAINTENANCE_MARGIN_RATE) / position_size * 100.0)
        } else {
            None
        };
        let health_factor = hedge_health_factor(position_size, margin, price_change_percent);

        Self {
            liquidation_price,
            rise_to_liquidation_percent,
            health_factor,
            status: HealthStatus::from_health_factor(health_factor),
        }
    }
}
