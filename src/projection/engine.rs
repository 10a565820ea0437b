//! Core return projection engine
//!
//! Every projection is recomputed from scratch from a config snapshot,
//! the catalog and the market inputs. The engine never fails: missing
//! products contribute nothing and zero denominators yield zero or an
//! absent metric.

use crate::catalog::{Catalog, Product};
use crate::market::MarketInputs;
use crate::portfolio::{AllocationEntry, Bucket, LeverageConfig, PortfolioConfig};
use super::breakdown::{
    HedgeProjection, LeverageLine, LeverageTotals, PriceImpact, ProductLine, ProjectionResult, Totals,
};
use super::risk::{lending_health_factor, lending_liquidation_price, HedgeRisk, LendingRisk};

/// `numerator / denominator`, or 0 when the denominator is not positive
fn ratio_or_zero(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Bucket sizes in USD
#[derive(Debug, Clone, Copy)]
struct Sizing {
    eth_bucket_usd: f64,
    stable_bucket_usd: f64,
    hedge_bucket_usd: f64,
}

impl Sizing {
    fn from_config(config: &PortfolioConfig) -> Self {
        let amount = config.investment_amount;
        Self {
            eth_bucket_usd: amount * config.eth_ratio / 100.0,
            stable_bucket_usd: amount * config.stablecoin_ratio() / 100.0,
            hedge_bucket_usd: amount * config.hedge_config.allocation_percent / 100.0,
        }
    }

    fn bucket_usd(&self, bucket: Bucket) -> f64 {
        match bucket {
            Bucket::Eth => self.eth_bucket_usd,
            Bucket::Stablecoin => self.stable_bucket_usd,
        }
    }
}

/// Yield sums over the resolved product lines
#[derive(Debug, Clone, Copy)]
struct YieldSums {
    eth: f64,
    eth_in_eth: f64,
    stablecoin: f64,
}

impl YieldSums {
    fn from_lines(eth_lines: &[ProductLine], stablecoin_lines: &[ProductLine]) -> Self {
        Self {
            eth: eth_lines.iter().map(|l| l.yield_value).sum(),
            eth_in_eth: eth_lines.iter().filter_map(|l| l.yield_in_eth).sum(),
            stablecoin: stablecoin_lines.iter().map(|l| l.yield_value).sum(),
        }
    }
}

/// Main projection engine
pub struct ProjectionEngine {
    catalog: Catalog,
}

impl ProjectionEngine {
    /// Create a new projection engine over a catalog
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Run the full projection for one configuration
    pub fn project(&self, config: &PortfolioConfig, market: &MarketInputs) -> ProjectionResult {
        let eth_price = market.resolve_eth_price(config.eth_price);
        let sizing = Sizing::from_config(config);
        let period = config.investment_period;

        let eth_lines = self.bucket_lines(config, Bucket::Eth, &sizing, eth_price);
        let stablecoin_lines = self.bucket_lines(config, Bucket::Stablecoin, &sizing, eth_price);

        let leverage_lines = self.leverage_lines(config, &sizing, eth_price);
        let mut leverage = LeverageTotals::default();
        for line in &leverage_lines {
            leverage.add(line);
        }

        let yields = YieldSums::from_lines(&eth_lines, &stablecoin_lines);
        let price_impact = price_impact(config, eth_price, sizing.eth_bucket_usd, yields.eth);
        let hedge = self.project_hedge(config, market, &sizing, eth_price);

        let totals = totals(
            config,
            &sizing,
            eth_price,
            &eth_lines,
            &stablecoin_lines,
            &yields,
            &leverage,
            &price_impact,
            hedge.as_ref(),
        );

        let lending_risk = LendingRisk::assess(
            leverage.total_collateral,
            leverage.risk_adjusted_collateral,
            leverage.max_ltv_collateral,
            leverage.total_borrowed,
            eth_price,
            price_impact.projected_eth_price,
        );

        log::debug!(
            "projected {} ETH / {} stablecoin lines over {} years: total return {:.2}",
            eth_lines.len(),
            stablecoin_lines.len(),
            period,
            totals.total_return
        );

        ProjectionResult {
            investment_amount: config.investment_amount,
            investment_period: period,
            eth_price,
            eth_lines,
            stablecoin_lines,
            leverage_lines,
            leverage,
            price_impact,
            hedge,
            totals,
            lending_risk,
        }
    }

    /// Position and yield lines for the active entries of one bucket
    fn bucket_lines(
        &self,
        config: &PortfolioConfig,
        bucket: Bucket,
        sizing: &Sizing,
        eth_price: f64,
    ) -> Vec<ProductLine> {
        let bucket_usd = sizing.bucket_usd(bucket);

        config
            .allocations(bucket)
            .iter()
            .filter(|entry| entry.is_active())
            .filter_map(|entry| match self.catalog.product(&entry.product_id) {
                Some(product) => Some(self.product_line(config, entry, product, bucket_usd, eth_price)),
                None => {
                    log::warn!("{} allocation references unknown product {}", bucket.as_str(), entry.product_id);
                    None
                }
            })
            .collect()
    }

    fn product_line(
        &self,
        config: &PortfolioConfig,
        entry: &AllocationEntry,
        product: &Product,
        bucket_usd: f64,
        eth_price: f64,
    ) -> ProductLine {
        let position_value = bucket_usd * entry.weight / 100.0;
        let yield_value = product.simple_yield(position_value, config.investment_period);

        let (position_in_eth, yield_in_eth) = if product.is_eth() {
            (
                Some(ratio_or_zero(position_value, eth_price)),
                Some(ratio_or_zero(yield_value, eth_price)),
            )
        } else {
            (None, None)
        };

        ProductLine {
            product_id: product.id.clone(),
            name: product.name.clone(),
            protocol: product.protocol.clone(),
            denomination: product.denomination,
            apy: product.apy,
            weight: entry.weight,
            allocation_of_portfolio: ratio_or_zero(position_value, config.investment_amount) * 100.0,
            position_value,
            yield_value,
            position_in_eth,
            yield_in_eth,
        }
    }

    /// Loops on every ETH allocation with leverage switched on.
    ///
    /// Selection only governs the yield lines; a configured loop still
    /// borrows against its weighted share of the ETH bucket.
    fn leverage_lines(&self, config: &PortfolioConfig, sizing: &Sizing, eth_price: f64) -> Vec<LeverageLine> {
        config
            .eth_allocations
            .iter()
            .filter_map(|entry| {
                let leverage = entry.active_leverage()?;
                let position_value = sizing.eth_bucket_usd * entry.weight / 100.0;
                Some(self.leverage_line(config, entry, leverage, position_value, eth_price))
            })
            .collect()
    }

    /// Borrow against a share of the position and redeploy into the target product
    fn leverage_line(
        &self,
        config: &PortfolioConfig,
        entry: &AllocationEntry,
        leverage: &LeverageConfig,
        position_value: f64,
        eth_price: f64,
    ) -> LeverageLine {
        let period = config.investment_period;

        let collateral_value = position_value * leverage.collateral_percent / 100.0;
        let borrowed = collateral_value * leverage.ltv / 100.0;
        let borrow_rate = self.catalog.borrow.rate(&leverage.borrow_asset);
        let borrow_cost = borrowed * borrow_rate / 100.0 * period;

        let target = self.catalog.product(&leverage.deploy_target_id);
        if target.is_none() {
            log::warn!(
                "leverage on {} deploys into unknown product {}",
                entry.product_id,
                leverage.deploy_target_id
            );
        }
        let deploy_apy = target.map(|p| p.apy).unwrap_or(0.0);
        let deploy_yield = borrowed * deploy_apy / 100.0 * period;

        let liquidation_threshold = self.catalog.collateral.liquidation_threshold(&entry.product_id);
        let health_factor = lending_health_factor(collateral_value * liquidation_threshold / 100.0, borrowed);

        LeverageLine {
            collateral_id: entry.product_id.clone(),
            position_value,
            borrow_asset: leverage.borrow_asset.clone(),
            deploy_target_id: leverage.deploy_target_id.clone(),
            deploy_target_found: target.is_some(),
            collateral_value,
            borrowed,
            borrow_rate,
            borrow_cost,
            deploy_apy,
            deploy_yield,
            net_yield: deploy_yield - borrow_cost,
            liquidation_threshold,
            max_ltv: self.catalog.collateral.max_ltv(&entry.product_id),
            health_factor,
            liquidation_price: lending_liquidation_price(eth_price, health_factor),
        }
    }

    /// Short perpetual sized from the hedge bucket. `None` when no hedge is configured.
    fn project_hedge(
        &self,
        config: &PortfolioConfig,
        market: &MarketInputs,
        sizing: &Sizing,
        eth_price: f64,
    ) -> Option<HedgeProjection> {
        let hedge = &config.hedge_config;
        if !hedge.is_active() {
            return None;
        }

        let funding_rate = market.funding.funding_rate_annualized;
        let deployed_margin = sizing.hedge_bucket_usd * hedge.fund_allocation / 100.0;
        let position_size = deployed_margin * hedge.leverage;
        let funding_income = position_size * funding_rate / 100.0 * config.investment_period;
        let price_pnl = position_size * (-config.price_change_scenario / 100.0);

        Some(HedgeProjection {
            allocation_usd: sizing.hedge_bucket_usd,
            deployed_margin,
            leverage: hedge.leverage,
            position_size,
            funding_rate,
            funding_income,
            price_pnl,
            net_return: funding_income + price_pnl,
            risk: HedgeRisk::assess(eth_price, deployed_margin, position_size, config.price_change_scenario),
        })
    }
}

fn price_impact(config: &PortfolioConfig, eth_price: f64, eth_bucket_usd: f64, total_eth_yield: f64) -> PriceImpact {
    let change = config.price_change_scenario / 100.0;
    let price_multiplier = 1.0 + change;
    let principal_impact = eth_bucket_usd * change;
    let yield_impact = total_eth_yield * change;

    PriceImpact {
        price_change_percent: config.price_change_scenario,
        price_multiplier,
        projected_eth_price: eth_price * price_multiplier,
        principal_impact,
        yield_impact,
        total_price_impact: principal_impact + yield_impact,
    }
}

/// Weighted APY over resolved lines; 0 when no weight is selected
fn weighted_apy(lines: &[ProductLine]) -> f64 {
    let weight: f64 = lines.iter().map(|l| l.weight).sum();
    let weighted: f64 = lines.iter().map(|l| l.apy * l.weight).sum();
    ratio_or_zero(weighted, weight)
}

#[allow(clippy::too_many_arguments)]
fn totals(
    config: &PortfolioConfig,
    sizing: &Sizing,
    eth_price: f64,
    eth_lines: &[ProductLine],
    stablecoin_lines: &[ProductLine],
    yields: &YieldSums,
    leverage: &LeverageTotals,
    price_impact: &PriceImpact,
    hedge: Option<&HedgeProjection>,
) -> Totals {
    let amount = config.investment_amount;
    let period = config.investment_period;

    let total_eth_yield = yields.eth;
    let total_eth_yield_in_eth = yields.eth_in_eth;
    let total_stablecoin_yield = yields.stablecoin;

    let hedge_net_return = hedge.map(|h| h.net_return).unwrap_or(0.0);
    let hedge_funding_income = hedge.map(|h| h.funding_income).unwrap_or(0.0);
    let final_hedge_value_usd = hedge.map(|h| h.deployed_margin + h.net_return).unwrap_or(0.0);

    let total_return = total_eth_yield
        + price_impact.total_price_impact
        + total_stablecoin_yield
        + leverage.total_net
        + hedge_net_return;

    let eth_position_in_eth = ratio_or_zero(sizing.eth_bucket_usd, eth_price);
    let final_eth_in_eth = eth_position_in_eth + total_eth_yield_in_eth;

    let yield_only_return =
        total_eth_yield + total_stablecoin_yield + leverage.total_net + hedge_funding_income;
    let portfolio_apy = if period > 0.0 {
        ratio_or_zero(yield_only_return, amount) / period * 100.0
    } else {
        0.0
    };

    let placed: f64 = eth_lines
        .iter()
        .chain(stablecoin_lines.iter())
        .map(|l| l.position_value)
        .sum::<f64>()
        + hedge.map(|h| h.deployed_margin).unwrap_or(0.0);

    Totals {
        eth_bucket_usd: sizing.eth_bucket_usd,
        stable_bucket_usd: sizing.stable_bucket_usd,
        hedge_bucket_usd: sizing.hedge_bucket_usd,
        stablecoin_ratio: config.stablecoin_ratio(),
        eth_position_in_eth,
        total_eth_yield,
        total_eth_yield_in_eth,
        total_stablecoin_yield,
        weighted_eth_apy: weighted_apy(eth_lines),
        weighted_stablecoin_apy: weighted_apy(stablecoin_lines),
        total_leverage_net: leverage.total_net,
        total_price_impact: price_impact.total_price_impact,
        hedge_net_return,
        total_return,
        expected_balance_usd: amount + total_return,
        final_eth_in_eth,
        final_eth_value_usd: final_eth_in_eth * price_impact.projected_eth_price,
        final_usd_value: sizing.stable_bucket_usd
            + total_stablecoin_yield
            + leverage.total_borrowed
            + leverage.total_net,
        final_hedge_value_usd,
        yield_only_return,
        portfolio_apy,
        deployed_percent: ratio_or_zero(placed, amount) * 100.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Denomination, ProductCatalog, ProductId};
    use crate::portfolio::HedgeConfig;
    use crate::market::FundingSnapshot;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    /// Catalog with one 3% ETH product and one 5% stablecoin product
    fn simple_catalog() -> Catalog {
        Catalog {
            products: ProductCatalog::new(vec![
                Product::new("eth3", "ETH 3%", "Test", 3.0, Denomination::Eth),
                Product::new("usd5", "USD 5%", "Test", 5.0, Denomination::Usd),
            ]),
            ..Catalog::default_catalog()
        }
    }

    fn simple_config() -> PortfolioConfig {
        PortfolioConfig {
            investment_amount: 1_000_000.0,
            investment_period: 1.0,
            eth_ratio: 70.0,
            eth_price: 3500.0,
            price_change_scenario: 0.0,
            hedge_config: HedgeConfig::default(),
            eth_allocations: vec![AllocationEntry::new("eth3", true, 100.0)],
            stablecoin_allocations: vec![],
        }
    }

    fn engine() -> ProjectionEngine {
        ProjectionEngine::new(simple_catalog())
    }

    fn hedged_config() -> PortfolioConfig {
        let mut config = simple_config().with_hedge_allocation(10.0).with_hedge_leverage(5.0, 25.0);
        config.hedge_config.fund_allocation = 80.0;
        config
    }

    #[test]
    fn test_eth_only_scenario() {
        let result = engine().project(&simple_config(), &MarketInputs::fallback());
        let t = &result.totals;

        assert_relative_eq!(t.eth_bucket_usd, 700_000.0, epsilon = 1e-6);
        assert_relative_eq!(t.total_eth_yield, 21_000.0, epsilon = 1e-6);
        assert_relative_eq!(t.final_eth_in_eth, 206.0, epsilon = 1e-9);
        assert_eq!(t.total_price_impact, 0.0);
        assert_eq!(result.price_impact.principal_impact, 0.0);
        assert_eq!(result.price_impact.yield_impact, 0.0);

        let line = &result.eth_lines[0];
        assert_relative_eq!(line.position_in_eth.unwrap(), 200.0, epsilon = 1e-9);
        assert_relative_eq!(line.yield_in_eth.unwrap(), 6.0, epsilon = 1e-9);
        assert_relative_eq!(line.allocation_of_portfolio, 70.0, epsilon = 1e-9);
    }

    #[test]
    fn test_price_drop_scenario() {
        let config = simple_config().with_price_change(-10.0);
        let result = engine().project(&config, &MarketInputs::fallback());
        let impact = &result.price_impact;

        assert_relative_eq!(impact.principal_impact, -70_000.0, epsilon = 1e-6);
        assert_relative_eq!(impact.yield_impact, -2_100.0, epsilon = 1e-6);
        assert_relative_eq!(impact.total_price_impact, -72_100.0, epsilon = 1e-6);
        assert_eq!(impact.principal_impact + impact.yield_impact, impact.total_price_impact);
        assert_relative_eq!(impact.projected_eth_price, 3150.0, epsilon = 1e-9);
    }

    #[test]
    fn test_hedge_scenario() {
        let result = engine().project(&hedged_config(), &MarketInputs::fallback());
        let hedge = result.hedge.as_ref().unwrap();

        assert_relative_eq!(hedge.deployed_margin, 80_000.0, epsilon = 1e-6);
        assert_relative_eq!(hedge.position_size, 400_000.0, epsilon = 1e-6);
        assert_relative_eq!(hedge.funding_income, 32_000.0, epsilon = 1e-6);
        assert_abs_diff_eq!(hedge.price_pnl, 0.0, epsilon = 1e-9);
        assert_relative_eq!(hedge.net_return, 32_000.0, epsilon = 1e-6);
        assert_relative_eq!(result.totals.final_hedge_value_usd, 112_000.0, epsilon = 1e-6);
        assert_relative_eq!(hedge.risk.liquidation_price.unwrap(), 3500.0 * 1.195, epsilon = 1e-9);
    }

    #[test]
    fn test_hedge_gains_when_price_falls() {
        let config = hedged_config().with_price_change(-10.0);
        let result = engine().project(&config, &MarketInputs::fallback());
        let hedge = result.hedge.as_ref().unwrap();

        assert_relative_eq!(hedge.price_pnl, 40_000.0, epsilon = 1e-6);
        assert_relative_eq!(hedge.net_return, 72_000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_no_hedge_is_absent() {
        let base = engine().project(&simple_config(), &MarketInputs::fallback());
        assert!(base.hedge.is_none());
        assert_eq!(base.totals.hedge_net_return, 0.0);
        assert_eq!(base.totals.final_hedge_value_usd, 0.0);
        assert!(base.summary().hedge_health_factor.is_none());

        // Enabled but zero allocation is still absent
        let mut config = simple_config();
        config.hedge_config.enabled = true;
        let result = engine().project(&config, &MarketInputs::fallback());
        assert!(result.hedge.is_none());
        assert_eq!(result.totals.total_return, base.totals.total_return);
    }

    #[test]
    fn test_zero_size_hedge_is_present() {
        let mut config = hedged_config();
        config.hedge_config.fund_allocation = 0.0;
        let result = engine().project(&config, &MarketInputs::fallback());
        let hedge = result.hedge.as_ref().unwrap();

        assert_eq!(hedge.position_size, 0.0);
        assert_eq!(hedge.risk.liquidation_price, None);
        assert_eq!(hedge.risk.health_factor, crate::projection::HEDGE_HF_SENTINEL);
    }

    #[test]
    fn test_linearity_in_investment() {
        let config = hedged_config()
            .with_price_change(-20.0)
            .with_weight(Bucket::Stablecoin, &ProductId::from("usd5"), 100.0);
        let market = MarketInputs::fallback();

        let single = engine().project(&config, &market);
        let double = engine().project(&config.with_investment_amount(2_000_000.0), &market);

        let (a, b) = (&single.totals, &double.totals);
        assert_relative_eq!(b.total_return, 2.0 * a.total_return, max_relative = 1e-12);
        assert_relative_eq!(b.expected_balance_usd, 2.0 * a.expected_balance_usd, max_relative = 1e-12);
        assert_relative_eq!(b.final_usd_value, 2.0 * a.final_usd_value, max_relative = 1e-12);
        assert_relative_eq!(b.total_price_impact, 2.0 * a.total_price_impact, max_relative = 1e-12);
        assert_relative_eq!(b.portfolio_apy, a.portfolio_apy, max_relative = 1e-12);
    }

    #[test]
    fn test_zero_horizon() {
        let config = hedged_config()
            .with_investment_period(0.0)
            .with_price_change(-10.0)
            .with_leverage(&ProductId::from("eth3"), Some(LeverageConfig::new(50.0, 50.0, "USDC", "usd5")));
        let result = engine().project(&config, &MarketInputs::fallback());
        let t = &result.totals;

        assert_eq!(t.total_eth_yield, 0.0);
        assert_eq!(t.total_stablecoin_yield, 0.0);
        assert_eq!(result.leverage.total_borrow_cost, 0.0);
        assert_eq!(result.leverage.total_net, 0.0);
        assert_eq!(result.hedge.as_ref().unwrap().funding_income, 0.0);
        assert_eq!(t.portfolio_apy, 0.0);
        assert_relative_eq!(result.price_impact.total_price_impact, -70_000.0, epsilon = 1e-6);

        // Without a price move the balance is untouched
        let flat = engine().project(&config.with_price_change(0.0), &MarketInputs::fallback());
        assert_eq!(flat.totals.expected_balance_usd, flat.investment_amount);
    }

    #[test]
    fn test_simple_interest_over_horizon() {
        let mut catalog = simple_catalog();
        catalog.products = ProductCatalog::new(vec![Product::new("eth10", "ETH 10%", "Test", 10.0, Denomination::Eth)]);
        let mut config = simple_config().with_investment_period(2.0);
        config.eth_allocations = vec![AllocationEntry::new("eth10", true, 100.0)];

        let result = ProjectionEngine::new(catalog).project(&config, &MarketInputs::fallback());
        assert_relative_eq!(result.totals.total_eth_yield, 140_000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_leverage_loop() {
        let config = simple_config()
            .with_leverage(&ProductId::from("eth3"), Some(LeverageConfig::new(50.0, 60.0, "USDC", "usd5")));
        let result = engine().project(&config, &MarketInputs::fallback());
        let line = &result.leverage_lines[0];

        // 700k position, 350k collateral, 210k borrowed at 4.7%, deployed at 5%
        assert_relative_eq!(line.collateral_value, 350_000.0, epsilon = 1e-6);
        assert_relative_eq!(line.borrowed, 210_000.0, epsilon = 1e-6);
        assert_relative_eq!(line.borrow_cost, 9_870.0, epsilon = 1e-6);
        assert_relative_eq!(line.deploy_yield, 10_500.0, epsilon = 1e-6);
        assert_relative_eq!(line.net_yield, 630.0, epsilon = 1e-6);
        assert_relative_eq!(result.totals.total_leverage_net, 630.0, epsilon = 1e-6);

        // eth3 has no collateral params: default 80% threshold
        assert_eq!(line.liquidation_threshold, 80.0);
        let hf = line.health_factor.unwrap();
        assert_relative_eq!(hf, 350_000.0 * 0.8 / 210_000.0, epsilon = 1e-12);
        assert_relative_eq!(line.liquidation_price.unwrap(), 3500.0 / hf, epsilon = 1e-9);

        let risk = result.lending_risk.as_ref().unwrap();
        assert_relative_eq!(risk.health_factor, hf, epsilon = 1e-12);
        assert!(!risk.liquidatable);

        // Borrowed funds count toward the USD side
        assert_relative_eq!(result.totals.final_usd_value, 300_000.0 + 210_000.0 + 630.0, epsilon = 1e-6);
    }

    #[test]
    fn test_leverage_survives_deselection() {
        let eth3 = ProductId::from("eth3");
        let config = simple_config()
            .with_leverage(&eth3, Some(LeverageConfig::new(50.0, 60.0, "USDC", "usd5")))
            .with_selected(Bucket::Eth, &eth3, false);
        let result = engine().project(&config, &MarketInputs::fallback());

        // No yield line for the deselected product, but the loop still runs
        assert!(result.eth_lines.is_empty());
        assert_eq!(result.totals.total_eth_yield, 0.0);
        assert_eq!(result.leverage_lines.len(), 1);
        assert_relative_eq!(result.leverage.total_borrowed, 210_000.0, epsilon = 1e-6);
        assert_relative_eq!(result.totals.total_leverage_net, 630.0, epsilon = 1e-6);

        let risk = result.lending_risk.as_ref().unwrap();
        assert_relative_eq!(risk.health_factor, 280_000.0 / 210_000.0, epsilon = 1e-12);
        assert!(result.leverage_for(&eth3).is_some());
    }

    #[test]
    fn test_negative_stablecoin_ratio_flows_through() {
        let config = simple_config()
            .with_eth_ratio(80.0)
            .with_hedge_allocation(30.0)
            .with_weight(Bucket::Stablecoin, &ProductId::from("usd5"), 100.0);
        let result = engine().project(&config, &MarketInputs::fallback());
        let t = &result.totals;

        assert_eq!(t.stablecoin_ratio, -10.0);
        assert_relative_eq!(t.stable_bucket_usd, -100_000.0, epsilon = 1e-6);
        assert_relative_eq!(t.total_stablecoin_yield, -5_000.0, epsilon = 1e-6);
        assert_relative_eq!(t.final_usd_value, -105_000.0, epsilon = 1e-6);

        // 800k at 3% + (-100k at 5%) + 240k short at 8% funding
        assert_relative_eq!(t.total_return, 24_000.0 - 5_000.0 + 19_200.0, epsilon = 1e-6);
    }

    #[test]
    fn test_aggregate_health_over_two_loops() {
        let wsteth = ProductId::from("wsteth");
        let weeth = ProductId::from("weeth");
        let config = PortfolioConfig::default()
            .with_weight(Bucket::Eth, &wsteth, 50.0)
            .with_weight(Bucket::Eth, &weeth, 50.0)
            .with_leverage(&wsteth, Some(LeverageConfig::new(100.0, 60.0, "USDC", "susde")))
            .with_leverage(&weeth, Some(LeverageConfig::new(100.0, 50.0, "USDC", "susde")));
        let result = ProjectionEngine::new(Catalog::default()).project(&config, &MarketInputs::fallback());

        // 350k collateral each; 210k and 175k borrowed
        let risk = result.lending_risk.as_ref().unwrap();
        assert_relative_eq!(risk.total_collateral, 700_000.0, epsilon = 1e-6);
        assert_relative_eq!(risk.total_borrowed, 385_000.0, epsilon = 1e-6);
        assert_relative_eq!(risk.risk_adjusted_collateral, 288_750.0 + 273_000.0, epsilon = 1e-6);
        assert_relative_eq!(risk.weighted_liquidation_threshold, 80.25, epsilon = 1e-9);
        assert_relative_eq!(risk.health_factor, 561_750.0 / 385_000.0, epsilon = 1e-12);
        assert_relative_eq!(risk.max_ltv_health_factor, 542_500.0 / 385_000.0, epsilon = 1e-12);
        assert!(!risk.liquidatable);
        assert!(!risk.above_max_ltv);

        let wsteth_hf = result.leverage_for(&wsteth).unwrap().health_factor.unwrap();
        let weeth_hf = result.leverage_for(&weeth).unwrap().health_factor.unwrap();
        assert_relative_eq!(wsteth_hf, 1.375, epsilon = 1e-12);
        assert_relative_eq!(weeth_hf, 1.56, epsilon = 1e-12);
        assert!(wsteth_hf < risk.health_factor && risk.health_factor < weeth_hf);
    }

    #[test]
    fn test_health_factor_decreases_with_ltv() {
        let id = ProductId::from("eth3");
        let mut last = f64::INFINITY;
        for ltv in [20.0, 40.0, 60.0, 75.0, 90.0] {
            let config = simple_config().with_leverage(&id, Some(LeverageConfig::new(100.0, ltv, "USDC", "usd5")));
            let hf = engine().project(&config, &MarketInputs::fallback()).lending_risk.unwrap().health_factor;
            assert!(hf < last);
            last = hf;
        }
        // 90% LTV against an 80% threshold is already under water
        assert!(last < 1.0);
    }

    #[test]
    fn test_no_leverage_means_no_lending_risk() {
        let result = engine().project(&simple_config(), &MarketInputs::fallback());
        assert!(result.lending_risk.is_none());
        assert!(result.summary().lending_health_factor.is_none());
    }

    #[test]
    fn test_dangling_ids_contribute_nothing() {
        let mut config = simple_config()
            .with_leverage(&ProductId::from("eth3"), Some(LeverageConfig::new(50.0, 50.0, "DAI", "gone")));
        config.stablecoin_allocations = vec![AllocationEntry::new("missing", true, 100.0)];

        let result = engine().project(&config, &MarketInputs::fallback());
        assert!(result.stablecoin_lines.is_empty());
        assert_eq!(result.totals.total_stablecoin_yield, 0.0);
        assert_eq!(result.totals.weighted_stablecoin_apy, 0.0);

        let line = &result.leverage_lines[0];
        assert!(!line.deploy_target_found);
        assert_eq!(line.deploy_yield, 0.0);
        // Unknown borrow asset uses the fallback rate
        assert_eq!(line.borrow_rate, 5.0);
        assert!(line.net_yield < 0.0);
    }

    #[test]
    fn test_partial_weights_are_honored() {
        let mut config = simple_config();
        config.eth_allocations = vec![AllocationEntry::new("eth3", true, 50.0)];

        let result = engine().project(&config, &MarketInputs::fallback());
        assert_relative_eq!(result.totals.total_eth_yield, 10_500.0, epsilon = 1e-6);
        assert_relative_eq!(result.totals.weighted_eth_apy, 3.0, epsilon = 1e-12);
        assert_relative_eq!(result.totals.deployed_percent, 35.0, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_eth_price_guard() {
        let config = simple_config().with_eth_price(0.0);
        let result = engine().project(&config, &MarketInputs::fallback());

        assert_eq!(result.totals.final_eth_in_eth, 0.0);
        assert_eq!(result.eth_lines[0].position_in_eth, Some(0.0));
        assert!(result.totals.total_return.is_finite());
    }

    #[test]
    fn test_market_price_override() {
        let market = MarketInputs::new(Some(2800.0), FundingSnapshot::with_rate(10.0));
        let result = engine().project(&hedged_config(), &market);

        assert_eq!(result.eth_price, 2800.0);
        assert_relative_eq!(result.totals.eth_position_in_eth, 250.0, epsilon = 1e-9);
        assert_relative_eq!(result.hedge.unwrap().funding_income, 40_000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_portfolio_apy_excludes_price_effects() {
        let config = hedged_config()
            .with_weight(Bucket::Stablecoin, &ProductId::from("usd5"), 100.0);
        let flat = engine().project(&config, &MarketInputs::fallback());
        let moved = engine().project(&config.with_price_change(-25.0), &MarketInputs::fallback());

        assert_relative_eq!(flat.totals.portfolio_apy, moved.totals.portfolio_apy, epsilon = 1e-12);
        // 21k ETH yield + 10k stable yield (200k bucket at 5%) + 32k funding on 1M
        assert_relative_eq!(flat.totals.portfolio_apy, 6.3, epsilon = 1e-9);
    }
}
