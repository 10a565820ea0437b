//! AWS Lambda handler for running portfolio projections
//!
//! Accepts an optional portfolio config, market overrides and a list of
//! price scenarios as JSON, and returns one projection per scenario.
//!
//! Supports Lambda Function URLs for direct HTTP access.

use aws_lambda_events::event::lambda_function_urls::LambdaFunctionUrlRequest;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use yield_simulator::{
    market::validate_price,
    portfolio::{validate, PortfolioConfig},
    projection::{ProjectionResult, ProjectionSummary},
    Catalog, MarketInputs, ScenarioRunner,
};

/// Market overrides supplied by the caller
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketOverrides {
    #[serde(default)]
    pub eth_price: Option<f64>,

    /// Annualized funding rate, in percent
    #[serde(default)]
    pub funding_rate: Option<f64>,

    #[serde(default)]
    pub max_leverage: Option<f64>,
}

/// Input for the projection
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionRequest {
    /// Portfolio config (default: built-in portfolio)
    #[serde(default)]
    pub config: Option<PortfolioConfig>,

    #[serde(default)]
    pub market: MarketOverrides,

    /// Price changes in percent (default: the config's own scenario)
    #[serde(default)]
    pub scenarios: Option<Vec<f64>>,

    /// Include full per-product breakdowns in the response
    #[serde(default)]
    pub detailed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionResponse {
    pub summaries: Vec<ProjectionSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<ProjectionResult>>,
    pub warnings: Vec<String>,
    pub execution_time_ms: u64,
}

fn http_response(status: u16, body: &Value) -> Value {
    json!({
        "statusCode": status,
        "headers": {
            "Content-Type": "application/json",
            "Access-Control-Allow-Origin": "*",
        },
        "body": body.to_string(),
    })
}

fn error_response(status: u16, message: &str) -> Value {
    http_response(status, &json!({ "error": message }))
}

fn market_inputs(overrides: &MarketOverrides) -> Result<MarketInputs, String> {
    let mut market = MarketInputs::fallback();
    if let Some(price) = overrides.eth_price {
        let price = validate_price(price).map_err(|e| e.to_string())?;
        market = market.with_eth_price(price);
    }
    if let Some(rate) = overrides.funding_rate {
        market = market.with_funding_rate(rate);
    }
    if let Some(max_leverage) = overrides.max_leverage {
        market.funding.max_leverage = max_leverage;
    }
    Ok(market)
}

fn run_request(request: ProjectionRequest) -> Result<ProjectionResponse, String> {
    let start = std::time::Instant::now();
    let catalog = Catalog::default_catalog();
    let market = market_inputs(&request.market)?;

    let config = request
        .config
        .unwrap_or_else(|| PortfolioConfig::for_catalog(&catalog.products));
    let warnings = validate(&config, &catalog, market.funding.max_leverage)
        .iter()
        .map(|w| w.to_string())
        .collect();

    let runner = ScenarioRunner::with_catalog(catalog, market);
    let results = match &request.scenarios {
        Some(scenarios) => runner.run_price_scenarios(&config, scenarios),
        None => vec![runner.run(&config)],
    };

    Ok(ProjectionResponse {
        summaries: results.iter().map(|r| r.summary()).collect(),
        results: if request.detailed { Some(results) } else { None },
        warnings,
        execution_time_ms: start.elapsed().as_millis() as u64,
    })
}

/// Lambda handler function
async fn handler(event: LambdaEvent<LambdaFunctionUrlRequest>) -> Result<Value, Error> {
    let body = event.payload.body.unwrap_or_else(|| "{}".to_string());
    let body = if body.trim().is_empty() { "{}".to_string() } else { body };

    let request: ProjectionRequest = match serde_json::from_str(&body) {
        Ok(r) => r,
        Err(e) => return Ok(error_response(400, &format!("Invalid JSON: {}", e))),
    };

    match run_request(request) {
        Ok(response) => Ok(http_response(200, &serde_json::to_value(&response)?)),
        Err(message) => Ok(error_response(400, &message)),
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();
    run(service_fn(handler)).await
}
