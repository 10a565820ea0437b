//! Host-side configuration checks.
//!
//! The engine honors any config literally; these warnings exist so a UI or
//! CLI can tell the user when a config is unusual.

use std::fmt;

use super::{Bucket, PortfolioConfig};
use crate::catalog::{Catalog, ProductId};

const WEIGHT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarning {
    /// Selected weights in a bucket do not add to 100
    BucketWeightTotal { bucket: Bucket, total: f64 },

    /// Leverage LTV exceeds the collateral's max LTV
    LtvAboveMax { product_id: ProductId, ltv: f64, max_ltv: f64 },

    /// ETH ratio plus hedge allocation exceed 100
    NegativeStablecoinRatio(f64),

    HedgeLeverageAboveMax { leverage: f64, max_leverage: f64 },

    /// Allocation or deploy target not present in the catalog
    UnknownProduct(ProductId),
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::BucketWeightTotal { bucket, total } => {
                write!(f, "{} weights total {:.2}% instead of 100%", bucket.as_str(), total)
            }
            ConfigWarning::LtvAboveMax { product_id, ltv, max_ltv } => write!(
                f,
                "{} leverage LTV {:.1}% exceeds max LTV {:.1}%",
                product_id, ltv, max_ltv
            ),
            ConfigWarning::NegativeStablecoinRatio(ratio) => {
                write!(f, "stablecoin ratio is negative ({:.1}%)", ratio)
            }
            ConfigWarning::HedgeLeverageAboveMax { leverage, max_leverage } => write!(
                f,
                "hedge leverage {:.1}x exceeds venue max {:.1}x",
                leverage, max_leverage
            ),
            ConfigWarning::UnknownProduct(id) => write!(f, "unknown product id {}", id),
        }
    }
}

/// Check `config` against `catalog` and the venue's `max_leverage`
pub fn validate(config: &PortfolioConfig, catalog: &Catalog, max_leverage: f64) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();

    for bucket in [Bucket::Eth, Bucket::Stablecoin] {
        let has_selection = config.allocations(bucket).iter().any(|a| a.selected);
        let total = config.selected_weight(bucket);
        if has_selection && (total - 100.0).abs() > WEIGHT_TOLERANCE {
            warnings.push(ConfigWarning::BucketWeightTotal { bucket, total });
        }

        for entry in config.allocations(bucket).iter().filter(|a| a.selected) {
            if !catalog.products.contains(&entry.product_id) {
                warnings.push(ConfigWarning::UnknownProduct(entry.product_id.clone()));
            }
        }
    }

    for entry in &config.eth_allocations {
        let Some(leverage) = entry.active_leverage() else {
            continue;
        };
        let max_ltv = catalog.collateral.max_ltv(&entry.product_id);
        if leverage.ltv > max_ltv {
            warnings.push(ConfigWarning::LtvAboveMax {
                product_id: entry.product_id.clone(),
                ltv: leverage.ltv,
                max_ltv,
            });
        }
        if !catalog.products.contains(&leverage.deploy_target_id) {
            warnings.push(ConfigWarning::UnknownProduct(leverage.deploy_target_id.clone()));
        }
    }

    let stable_ratio = config.stablecoin_ratio();
    if stable_ratio < 0.0 {
        warnings.push(ConfigWarning::NegativeStablecoinRatio(stable_ratio));
    }

    if config.hedge_config.is_active() && config.hedge_config.leverage > max_leverage {
        warnings.push(ConfigWarning::HedgeLeverageAboveMax {
            leverage: config.hedge_config.leverage,
            max_leverage,
        });
    }

    warnings
}
