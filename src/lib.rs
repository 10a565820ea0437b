//! Yield Simulator - What-if return projections for DeFi yield portfolios
//!
//! This library provides:
//! - Product catalog with borrow rates and collateral parameters
//! - Market feed adapters (ETH price, perp funding, pool APYs)
//! - Portfolio configuration with leverage loops and a short perp hedge
//! - Deterministic return projection with lending and hedge risk metrics
//! - Batch price-scenario runs

pub mod errors;
pub mod catalog;
pub mod market;
pub mod portfolio;
pub mod positions;
pub mod projection;
pub mod scenario;

// Re-export commonly used types
pub use errors::{Result, SimulatorError};
pub use catalog::{Catalog, Product, ProductId, ProductCatalog, Denomination};
pub use market::{MarketInputs, FundingSnapshot, FundingFeed, PriceFeed};
pub use portfolio::{PortfolioConfig, AllocationEntry, LeverageConfig, HedgeConfig, Bucket};
pub use positions::Position;
pub use projection::{ProjectionEngine, ProjectionResult, ProjectionSummary};
pub use scenario::ScenarioRunner;
