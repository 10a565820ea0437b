//! Position variants a projection can be expressed as
//!
//! Mirrors the wallet model: each kind of on-chain exposure is its own
//! variant, so consumers pattern-match instead of probing optional fields.

use serde::{Deserialize, Serialize};

use crate::catalog::{Denomination, ProductId};
use crate::projection::{ProductLine, ProjectionResult};

const PENDLE_PROTOCOL: &str = "Pendle";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerpDirection {
    Long,
    Short,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Position {
    /// Collateral posted against a stablecoin borrow
    Lending {
        collateral_id: ProductId,
        collateral_usd: f64,
        borrow_asset: String,
        borrowed_usd: f64,
        borrow_rate: f64,
        health_factor: Option<f64>,
    },

    /// Liquid staking token held in ETH units
    Stake {
        product_id: ProductId,
        protocol: String,
        amount_eth: f64,
        apy: f64,
    },

    /// Stablecoin yield vault
    Yield {
        product_id: ProductId,
        protocol: String,
        amount_usd: f64,
        apy: f64,
    },

    /// Principal token with a fixed implied yield
    Pendle {
        product_id: ProductId,
        denomination: Denomination,
        amount: f64,
        implied_apy: f64,
    },

    Perp {
        asset: String,
        direction: PerpDirection,
        margin_usd: f64,
        position_size_usd: f64,
        leverage: f64,
        entry_price: f64,
        funding_rate: f64,
    },
}

impl Position {
    pub fn kind(&self) -> &'static str {
        match self {
            Position::Lending { .. } => "lending",
            Position::Stake { .. } => "stake",
            Position::Yield { .. } => "yield",
            Position::Pendle { .. } => "pendle",
            Position::Perp { .. } => "perp",
        }
    }

    /// Current USD value of the position (net of debt for lending, margin for perps)
    pub fn value_usd(&self, eth_price: f64) -> f64 {
        match self {
            Position::Lending { collateral_usd, borrowed_usd, .. } => collateral_usd - borrowed_usd,
            Position::Stake { amount_eth, .. } => amount_eth * eth_price,
            Position::Yield { amount_usd, .. } => *amount_usd,
            Position::Pendle { denomination: Denomination::Eth, amount, .. } => amount * eth_price,
            Position::Pendle { amount, .. } => *amount,
            Position::Perp { margin_usd, .. } => *margin_usd,
        }
    }

    fn from_line(line: &ProductLine) -> Position {
        if line.protocol == PENDLE_PROTOCOL {
            let amount = line.position_in_eth.unwrap_or(line.position_value);
            return Position::Pendle {
                product_id: line.product_id.clone(),
                denomination: line.denomination,
                amount,
                implied_apy: line.apy,
            };
        }

        match line.position_in_eth {
            Some(amount_eth) => Position::Stake {
                product_id: line.product_id.clone(),
                protocol: line.protocol.clone(),
                amount_eth,
                apy: line.apy,
            },
            None => Position::Yield {
                product_id: line.product_id.clone(),
                protocol: line.protocol.clone(),
                amount_usd: line.position_value,
                apy: line.apy,
            },
        }
    }
}

impl ProjectionResult {
    /// Express the projected portfolio as wallet positions
    pub fn positions(&self) -> Vec<Position> {
        let mut positions: Vec<Position> = self.lines().map(Position::from_line).collect();

        for leverage in &self.leverage_lines {
            positions.push(Position::Lending {
                collateral_id: leverage.collateral_id.clone(),
                collateral_usd: leverage.collateral_value,
                borrow_asset: leverage.borrow_asset.clone(),
                borrowed_usd: leverage.borrowed,
                borrow_rate: leverage.borrow_rate,
                health_factor: leverage.health_factor,
            });
        }

        if let Some(hedge) = &self.hedge {
            positions.push(Position::Perp {
                asset: "ETH".to_string(),
                direction: PerpDirection::Short,
                margin_usd: hedge.deployed_margin,
                position_size_usd: hedge.position_size,
                leverage: hedge.leverage,
                entry_price: self.eth_price,
                funding_rate: hedge.funding_rate,
            });
        }

        positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::market::MarketInputs;
    use crate::portfolio::{Bucket, LeverageConfig, PortfolioConfig};
    use crate::projection::ProjectionEngine;
    use approx::assert_relative_eq;

    fn project(config: &PortfolioConfig) -> ProjectionResult {
        ProjectionEngine::new(Catalog::default()).project(config, &MarketInputs::fallback())
    }

    #[test]
    fn test_default_portfolio_positions() {
        let positions = project(&PortfolioConfig::default()).positions();
        let kinds: Vec<&str> = positions.iter().map(|p| p.kind()).collect();
        assert_eq!(kinds, vec!["stake", "yield"]);

        // 700k of wstETH at 3500
        assert_relative_eq!(positions[0].value_usd(3500.0), 700_000.0, epsilon = 1e-6);
        assert_relative_eq!(positions[0].value_usd(4000.0), 800_000.0, epsilon = 1e-6);
        assert_relative_eq!(positions[1].value_usd(4000.0), 300_000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_leveraged_and_hedged_positions() {
        let config = PortfolioConfig::default()
            .with_eth_ratio(60.0)
            .with_weight(Bucket::Eth, &ProductId::from("wsteth"), 50.0)
            .with_weight(Bucket::Eth, &ProductId::from("pt-weeth"), 50.0)
            .with_leverage(
                &ProductId::from("wsteth"),
                Some(LeverageConfig::new(100.0, 50.0, "USDC", "susde")),
            )
            .with_hedge_allocation(10.0)
            .with_hedge_leverage(3.0, 25.0);

        let positions = project(&config).positions();
        let kinds: Vec<&str> = positions.iter().map(|p| p.kind()).collect();
        assert_eq!(kinds, vec!["stake", "pendle", "yield", "lending", "perp"]);

        match &positions[3] {
            Position::Lending { collateral_usd, borrowed_usd, health_factor, .. } => {
                assert_relative_eq!(*collateral_usd, 300_000.0, epsilon = 1e-6);
                assert_relative_eq!(*borrowed_usd, 150_000.0, epsilon = 1e-6);
                assert_relative_eq!(health_factor.unwrap(), 1.65, epsilon = 1e-12);
                assert_relative_eq!(positions[3].value_usd(3500.0), 150_000.0, epsilon = 1e-6);
            }
            other => panic!("expected lending position, got {:?}", other),
        }

        match &positions[4] {
            Position::Perp { direction, position_size_usd, .. } => {
                assert_eq!(*direction, PerpDirection::Short);
                assert_relative_eq!(*position_size_usd, 240_000.0, epsilon = 1e-6);
            }
            other => panic!("expected perp position, got {:?}", other),
        }
    }

    #[test]
    fn test_position_serializes_with_type_tag() {
        let position = Position::Yield {
            product_id: ProductId::from("susde"),
            protocol: "Ethena".to_string(),
            amount_usd: 1000.0,
            apy: 4.9,
        };
        let json = serde_json::to_string(&position).unwrap();
        assert!(json.starts_with(r#"{"type":"yield""#));
    }
}
