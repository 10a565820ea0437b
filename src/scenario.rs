//! Scenario runner for batch projections
//!
//! Pre-loads the catalog and market inputs once, then runs many
//! projections (price scenarios or whole configs) without reloading.

use std::path::Path;

use rayon::prelude::*;

use crate::catalog::Catalog;
use crate::errors::{Result, SimulatorError};
use crate::market::MarketInputs;
use crate::portfolio::PortfolioConfig;
use crate::projection::{ProjectionEngine, ProjectionResult};

/// Pre-loaded scenario runner
///
/// # Example
/// ```ignore
/// let runner = ScenarioRunner::from_csv()?;
/// let results = runner.run_price_scenarios(&config, &[-30.0, -10.0, 0.0, 10.0, 30.0]);
/// ```
pub struct ScenarioRunner {
    engine: ProjectionEngine,
    market: MarketInputs,
}

impl ScenarioRunner {
    /// Runner over the built-in catalog and fallback market inputs
    pub fn new() -> Self {
        Self::with_catalog(Catalog::default_catalog(), MarketInputs::fallback())
    }

    /// Load the catalog from CSV files in the default location
    pub fn from_csv() -> Result<Self> {
        Ok(Self::with_catalog(Catalog::from_csv()?, MarketInputs::fallback()))
    }

    pub fn from_csv_path(path: &Path) -> Result<Self> {
        Ok(Self::with_catalog(Catalog::from_csv_path(path)?, MarketInputs::fallback()))
    }

    pub fn with_catalog(catalog: Catalog, market: MarketInputs) -> Self {
        Self {
            engine: ProjectionEngine::new(catalog),
            market,
        }
    }

    /// Replace the market inputs used by subsequent runs
    pub fn with_market(mut self, market: MarketInputs) -> Self {
        self.market = market;
        self
    }

    pub fn run(&self, config: &PortfolioConfig) -> ProjectionResult {
        self.engine.project(config, &self.market)
    }

    /// Project `config` under each price change (percent). Results keep input order.
    pub fn run_price_scenarios(&self, config: &PortfolioConfig, scenarios: &[f64]) -> Vec<ProjectionResult> {
        scenarios
            .par_iter()
            .map(|&pct| self.engine.project(&config.with_price_change(pct), &self.market))
            .collect()
    }

    /// Project several independent configs. Results keep input order.
    pub fn run_configs(&self, configs: &[PortfolioConfig]) -> Vec<ProjectionResult> {
        configs
            .par_iter()
            .map(|config| self.engine.project(config, &self.market))
            .collect()
    }

    pub fn catalog(&self) -> &Catalog {
        self.engine.catalog()
    }

    pub fn market(&self) -> &MarketInputs {
        &self.market
    }
}

impl Default for ScenarioRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Upper bound on the number of points `price_grid` will produce
pub const MAX_GRID_POINTS: usize = 10_000;

/// Evenly spaced price changes from `min` to `max` inclusive
///
/// Rejects non-finite bounds, a non-positive step, `max < min`, and ranges
/// that would need more than [`MAX_GRID_POINTS`] points.
pub fn price_grid(min: f64, max: f64, step: f64) -> Result<Vec<f64>> {
    if !(min.is_finite() && max.is_finite() && step.is_finite()) {
        return Err(SimulatorError::InvalidSweep(format!(
            "bounds must be finite (min {}, max {}, step {})",
            min, max, step
        )));
    }
    if step <= 0.0 {
        return Err(SimulatorError::InvalidSweep(format!("step must be positive, got {}", step)));
    }
    if max < min {
        return Err(SimulatorError::InvalidSweep(format!("max {} is below min {}", max, min)));
    }

    let intervals = ((max - min) / step + 1e-9).floor();
    if intervals + 1.0 > MAX_GRID_POINTS as f64 {
        return Err(SimulatorError::InvalidSweep(format!(
            "{} to {} by {} exceeds {} points",
            min, max, step, MAX_GRID_POINTS
        )));
    }
    let count = intervals as usize;
    Ok((0..=count).map(|i| min + step * i as f64).collect())
}
