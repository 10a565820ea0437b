//! Yield-pool feed adapter: maps live pool APYs onto catalog products

use std::collections::HashMap;

use serde::Deserialize;

use crate::catalog::{ProductCatalog, ProductId};
use crate::errors::Result;

#[derive(Debug, Deserialize)]
struct PoolsResponse {
    data: Vec<PoolEntry>,
}

#[derive(Debug, Deserialize)]
struct PoolEntry {
    pool: String,
    #[serde(default)]
    apy: Option<f64>,
}

/// Parse a pools response (`{"data":[{"pool":"<uuid>","apy":2.7}, ...]}`) into
/// APY overrides for the products of `catalog` that carry a matching pool id.
///
/// Pools without an APY, or not referenced by the catalog, are skipped.
pub fn parse_pool_apys(payload: &str, catalog: &ProductCatalog) -> Result<HashMap<ProductId, f64>> {
    let response: PoolsResponse = serde_json::from_str(payload)?;
    let pools = catalog.pool_index();

    let overrides: HashMap<ProductId, f64> = response
        .data
        .into_iter()
        .filter_map(|entry| {
            let product_id = pools.get(&entry.pool)?;
            let apy = entry.apy.filter(|a| a.is_finite())?;
            Some((product_id.clone(), apy))
        })
        .collect();

    log::debug!("matched {} of {} catalog pools", overrides.len(), pools.len());
    Ok(overrides)
}
