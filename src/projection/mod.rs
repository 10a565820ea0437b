//! Return projection engine and risk metrics

mod engine;
mod breakdown;
pub mod risk;

pub use engine::ProjectionEngine;
pub use breakdown::{
    HedgeProjection, LeverageLine, LeverageTotals, PriceImpact, ProductLine, ProjectionResult,
    ProjectionSummary, Totals,
};
pub use risk::{
    HealthStatus, HedgeRisk, LendingRisk, HEDGE_HF_SENTINEL, MAINTENANCE_MARGIN_RATE,
};
