//! Yield Simulator CLI
//!
//! Command-line interface for running a what-if projection of one portfolio

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use yield_simulator::{
    market::{FundingSnapshot, MarketInputs},
    portfolio::{self, PortfolioConfig},
    projection::{ProductLine, ProjectionResult},
    Catalog, ProjectionEngine,
};

#[derive(Parser, Debug)]
#[command(name = "yield_simulator", version, about = "What-if return projection for a DeFi yield portfolio")]
struct Args {
    /// Portfolio config JSON (defaults to the built-in portfolio)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory with products.csv, borrow_rates.csv and collateral.csv
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// ETH spot price override, in USD
    #[arg(long)]
    eth_price: Option<f64>,

    /// ETH price change scenario, in percent
    #[arg(long, allow_hyphen_values = true)]
    scenario: Option<f64>,

    /// Investment horizon, in years
    #[arg(long)]
    period: Option<f64>,

    /// Annualized perp funding rate, in percent
    #[arg(long, allow_hyphen_values = true)]
    funding_rate: Option<f64>,

    /// Write per-product lines to this CSV file
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Print the full result as JSON instead of tables
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let catalog = match &args.catalog {
        Some(dir) => Catalog::from_csv_path(dir)
            .with_context(|| format!("loading catalog from {}", dir.display()))?,
        None => Catalog::default_catalog(),
    };

    let mut config = match &args.config {
        Some(path) => portfolio::load_config(path)
            .with_context(|| format!("loading portfolio config from {}", path.display()))?,
        None => PortfolioConfig::for_catalog(&catalog.products),
    };
    if let Some(scenario) = args.scenario {
        config = config.with_price_change(scenario);
    }
    if let Some(period) = args.period {
        config = config.with_investment_period(period);
    }

    let mut market = MarketInputs::new(None, FundingSnapshot::fallback());
    if let Some(price) = args.eth_price {
        let price = yield_simulator::market::validate_price(price).context("--eth-price")?;
        market = market.with_eth_price(price);
    }
    if let Some(rate) = args.funding_rate {
        market = market.with_funding_rate(rate);
    }

    for warning in portfolio::validate(&config, &catalog, market.funding.max_leverage) {
        log::warn!("{}", warning);
    }

    let engine = ProjectionEngine::new(catalog);
    let result = engine.project(&config, &market);

    if args.json {
        let json = serde_json::to_string_pretty(&result).context("serializing projection")?;
        println!("{}", json);
    } else {
        print_report(&result);
    }

    if let Some(path) = &args.csv {
        write_lines_csv(&result, path).with_context(|| format!("writing {}", path.display()))?;
        println!("\nProduct lines written to: {}", path.display());
    }

    Ok(())
}

fn print_lines(title: &str, lines: &[ProductLine]) {
    println!("{}:", title);
    println!("{:<14} {:<16} {:>7} {:>7} {:>14} {:>12} {:>10}",
        "Product", "Protocol", "Weight", "APY", "Position", "Yield", "ETH");
    println!("{}", "-".repeat(86));
    for line in lines {
        println!("{:<14} {:<16} {:>6.1}% {:>6.2}% {:>14.2} {:>12.2} {:>10}",
            line.name,
            line.protocol,
            line.weight,
            line.apy,
            line.position_value,
            line.yield_value,
            line.position_in_eth.map(|e| format!("{:.4}", e)).unwrap_or_default(),
        );
    }
    println!();
}

fn print_report(result: &ProjectionResult) {
    let t = &result.totals;

    println!("Yield Simulator v{}", env!("CARGO_PKG_VERSION"));
    println!("======================\n");
    println!("Investment: ${:.2} over {} years at ETH ${:.2}", result.investment_amount, result.investment_period, result.eth_price);
    println!("Split: ETH ${:.2} / Stablecoin ${:.2} ({:.1}%) / Hedge ${:.2}\n",
        t.eth_bucket_usd, t.stable_bucket_usd, t.stablecoin_ratio, t.hedge_bucket_usd);

    print_lines("ETH products", &result.eth_lines);
    print_lines("Stablecoin products", &result.stablecoin_lines);

    for lev in &result.leverage_lines {
        println!("Leverage on {}: borrow ${:.2} {} at {:.2}% -> {} ({:.2}%), net ${:.2}, HF {}, liq ${}",
            lev.collateral_id,
            lev.borrowed,
            lev.borrow_asset,
            lev.borrow_rate,
            lev.deploy_target_id,
            lev.deploy_apy,
            lev.net_yield,
            lev.health_factor.map(|h| format!("{:.3}", h)).unwrap_or_else(|| "-".into()),
            lev.liquidation_price.map(|p| format!("{:.2}", p)).unwrap_or_else(|| "-".into()),
        );
    }

    let impact = &result.price_impact;
    println!("\nPrice scenario {:+.1}% -> ETH ${:.2}", impact.price_change_percent, impact.projected_eth_price);
    println!("  Principal impact: ${:.2}", impact.principal_impact);
    println!("  Yield impact: ${:.2}", impact.yield_impact);

    if let Some(hedge) = &result.hedge {
        println!("\nHedge: ${:.2} margin x{:.1} = ${:.2} short", hedge.deployed_margin, hedge.leverage, hedge.position_size);
        println!("  Funding ({:.2}%): ${:.2}", hedge.funding_rate, hedge.funding_income);
        println!("  Price P&L: ${:.2}", hedge.price_pnl);
        println!("  HF {:.2} ({})", hedge.risk.health_factor, hedge.risk.status.as_str());
        if let Some(liq) = hedge.risk.liquidation_price {
            println!("  Liquidation price: ${:.2}", liq);
        }
    }

    if let Some(risk) = &result.lending_risk {
        println!("\nLending risk: HF {:.3} ({}), max-LTV HF {:.3}, drop to liquidation {:.1}%",
            risk.health_factor, risk.status.as_str(), risk.max_ltv_health_factor, risk.drop_to_liquidation_percent);
    }

    println!("\nSummary:");
    println!("  ETH yield: ${:.2} ({:.4} ETH)", t.total_eth_yield, t.total_eth_yield_in_eth);
    println!("  Stablecoin yield: ${:.2}", t.total_stablecoin_yield);
    println!("  Leverage net: ${:.2}", t.total_leverage_net);
    println!("  Price impact: ${:.2}", t.total_price_impact);
    println!("  Hedge net: ${:.2}", t.hedge_net_return);
    println!("  Total return: ${:.2}", t.total_return);
    println!("  Expected balance: ${:.2}", t.expected_balance_usd);
    println!("  Final ETH: {:.4} ETH (${:.2})", t.final_eth_in_eth, t.final_eth_value_usd);
    println!("  Final USD: ${:.2}", t.final_usd_value);
    println!("  Portfolio APY (yield only): {:.2}%", t.portfolio_apy);
    println!("  Deployed: {:.1}%", t.deployed_percent);
}

fn write_lines_csv(result: &ProjectionResult, path: &Path) -> Result<()> {
    let mut file = File::create(path)?;
    writeln!(file, "Bucket,Product,Protocol,Weight,APY,Position,Yield,PositionEth,YieldEth,Borrowed,LeverageNet,HealthFactor")?;

    for line in result.lines() {
        let bucket = if line.is_eth() { "ETH" } else { "Stablecoin" };
        let lev = result.leverage_for(&line.product_id);
        writeln!(file, "{},{},{},{:.4},{:.4},{:.2},{:.2},{:.6},{:.6},{:.2},{:.2},{}",
            bucket,
            line.product_id,
            line.protocol,
            line.weight,
            line.apy,
            line.position_value,
            line.yield_value,
            line.position_in_eth.unwrap_or(0.0),
            line.yield_in_eth.unwrap_or(0.0),
            lev.map(|l| l.borrowed).unwrap_or(0.0),
            lev.map(|l| l.net_yield).unwrap_or(0.0),
            lev.and_then(|l| l.health_factor).map(|h| format!("{:.6}", h)).unwrap_or_default(),
        )?;
    }

    Ok(())
}
