//! Sweep the ETH price scenario across a range and write one summary row per step
//!
//! Environment variables:
//! - SWEEP_MIN / SWEEP_MAX / SWEEP_STEP: price change range in percent (default -50..50 by 10)
//! - CONFIG_PATH: portfolio config JSON (default: built-in portfolio)
//! - CATALOG_PATH: catalog directory (default: built-in catalog)
//! - FUNDING_RATE: annualized funding rate override, in percent
//! - OUTPUT_PATH: CSV output file (default: scenario_sweep.csv)

use std::env;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};

use yield_simulator::{
    portfolio::{load_config, PortfolioConfig},
    scenario::{price_grid, ScenarioRunner},
    Catalog, MarketInputs,
};

fn env_f64(name: &str, default: f64) -> f64 {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn main() -> Result<()> {
    env_logger::init();

    let sweep_min = env_f64("SWEEP_MIN", -50.0);
    let sweep_max = env_f64("SWEEP_MAX", 50.0);
    let sweep_step = env_f64("SWEEP_STEP", 10.0);
    let output_path = env::var("OUTPUT_PATH").unwrap_or_else(|_| "scenario_sweep.csv".to_string());

    let catalog = match env::var("CATALOG_PATH") {
        Ok(dir) => Catalog::from_csv_path(Path::new(&dir))
            .with_context(|| format!("loading catalog from {}", dir))?,
        Err(_) => Catalog::default_catalog(),
    };

    let config = match env::var("CONFIG_PATH") {
        Ok(path) => load_config(Path::new(&path)).with_context(|| format!("loading config from {}", path))?,
        Err(_) => PortfolioConfig::for_catalog(&catalog.products),
    };

    let mut market = MarketInputs::fallback();
    if let Ok(rate) = env::var("FUNDING_RATE") {
        let rate: f64 = rate.parse().with_context(|| format!("FUNDING_RATE={}", rate))?;
        market = market.with_funding_rate(rate);
    }

    let scenarios = price_grid(sweep_min, sweep_max, sweep_step).with_context(|| {
        format!("SWEEP_MIN={} SWEEP_MAX={} SWEEP_STEP={}", sweep_min, sweep_max, sweep_step)
    })?;
    println!("Sweeping {} scenarios from {:+.1}% to {:+.1}%...", scenarios.len(), sweep_min, sweep_max);

    let start = Instant::now();
    let runner = ScenarioRunner::with_catalog(catalog, market);
    let results = runner.run_price_scenarios(&config, &scenarios);
    println!("Projected in {:?}", start.elapsed());

    let mut file = File::create(&output_path).with_context(|| format!("creating {}", output_path))?;
    writeln!(file, "PriceChangePct,ProjectedEthPrice,EthYield,StableYield,LeverageNet,PriceImpact,HedgeNet,TotalReturn,ExpectedBalance,PortfolioApy,LendingHF,HedgeHF")?;

    println!("\n{:>8} {:>12} {:>14} {:>14} {:>8} {:>8}", "Change", "ETH", "Total Return", "Balance", "APY", "HF");
    println!("{}", "-".repeat(70));

    for result in &results {
        let s = result.summary();
        let fmt_opt = |v: Option<f64>| v.map(|x| format!("{:.6}", x)).unwrap_or_default();

        writeln!(file, "{:.4},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{:.6},{},{}",
            s.price_change_percent,
            s.projected_eth_price,
            s.total_eth_yield,
            s.total_stablecoin_yield,
            s.total_leverage_net,
            s.total_price_impact,
            s.hedge_net_return,
            s.total_return,
            s.expected_balance_usd,
            s.portfolio_apy,
            fmt_opt(s.lending_health_factor),
            fmt_opt(s.hedge_health_factor),
        )?;

        println!("{:>+7.1}% {:>12.2} {:>14.2} {:>14.2} {:>7.2}% {:>8}",
            s.price_change_percent,
            s.projected_eth_price,
            s.total_return,
            s.expected_balance_usd,
            s.portfolio_apy,
            s.lending_health_factor
                .or(s.hedge_health_factor)
                .map(|h| format!("{:.2}", h))
                .unwrap_or_else(|| "-".to_string()),
        );
    }

    println!("\nResults written to: {}", output_path);
    Ok(())
}
