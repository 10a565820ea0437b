//! Yield-bearing products and the catalog that indexes them

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SimulatorError};

/// Identifier of a product in the catalog (e.g. `wsteth`, `susde`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProductId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Currency in which a position's principal and yield are measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Denomination {
    /// Principal tracks the ETH price (liquid staking tokens, ETH PTs)
    Eth,
    /// Principal is price-stable in USD (stablecoin vaults, stablecoin PTs)
    Usd,
}

impl Denomination {
    /// Parse the catalog file representation
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ETH" => Ok(Denomination::Eth),
            "USD" => Ok(Denomination::Usd),
            other => Err(SimulatorError::UnknownDenomination(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Denomination::Eth => "ETH",
            Denomination::Usd => "USD",
        }
    }
}

/// A yield-bearing product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,

    /// Display name (e.g. "wstETH")
    pub name: String,

    /// Protocol offering the product (e.g. "Lido")
    pub protocol: String,

    /// Annual percentage yield, in percent (simple, non-compounding)
    pub apy: f64,

    pub denomination: Denomination,

    /// Identifier in the external yield feed, used to refresh `apy`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_id: Option<String>,
}

impl Product {
    pub fn new(
        id: &str,
        name: &str,
        protocol: &str,
        apy: f64,
        denomination: Denomination,
    ) -> Self {
        Self {
            id: ProductId::from(id),
            name: name.to_string(),
            protocol: protocol.to_string(),
            apy,
            denomination,
            pool_id: None,
        }
    }

    pub fn with_pool_id(mut self, pool_id: &str) -> Self {
        self.pool_id = Some(pool_id.to_string());
        self
    }

    pub fn is_eth(&self) -> bool {
        self.denomination == Denomination::Eth
    }

    /// Simple (linear) yield on `principal` over `years`
    pub fn simple_yield(&self, principal: f64, years: f64) -> f64 {
        principal * (self.apy / 100.0) * years
    }
}

/// Ordered product catalog with id lookup
#[derive(Debug, Clone, Default)]
pub struct ProductCatalog {
    products: Vec<Product>,
    index: HashMap<ProductId, usize>,
}

impl ProductCatalog {
    /// Build a catalog. A later product with a duplicate id replaces the earlier one.
    pub fn new(products: Vec<Product>) -> Self {
        let mut catalog = Self::default();
        for product in products {
            catalog.insert(product);
        }
        catalog
    }

    fn insert(&mut self, product: Product) {
        match self.index.get(&product.id) {
            Some(&idx) => self.products[idx] = product,
            None => {
                self.index.insert(product.id.clone(), self.products.len());
                self.products.push(product);
            }
        }
    }

    /// Built-in products with fallback APYs
    pub fn default_products() -> Self {
        Self::new(vec![
            // ETH-denominated
            Product::new("wsteth", "wstETH", "Lido", 2.65, Denomination::Eth)
                .with_pool_id("747c1d2a-c668-4682-b9f9-296708a3dd90"),
            Product::new("weeth", "weETH", "Ether.fi", 3.17, Denomination::Eth)
                .with_pool_id("46bd2bdf-6d92-4066-b482-e885ee172264"),
            Product::new("pt-wsteth", "PT-wstETH", "Pendle", 2.9, Denomination::Eth),
            Product::new("pt-weeth", "PT-weETH", "Pendle", 2.7, Denomination::Eth),
            // Stablecoin-denominated
            Product::new("steakusdc", "steakUSDC", "Morpho Vaults", 4.0, Denomination::Usd),
            Product::new("gtusdc", "GTUSDC", "Morpho Vaults", 4.4, Denomination::Usd),
            Product::new("bbqusdc", "BBQUSDC", "Morpho Vaults", 7.2, Denomination::Usd),
            Product::new("susde", "sUSDe", "Ethena", 4.9, Denomination::Usd)
                .with_pool_id("66985a81-9c51-46ca-9977-42b4fe7bc6df"),
            Product::new("syrupusdc", "Syrup USDC", "Maple Finance", 6.8, Denomination::Usd)
                .with_pool_id("43641cf5-a92e-416b-bce9-27113d3c0db6"),
            Product::new("pt-susde", "PT-sUSDe", "Pendle", 5.9, Denomination::Usd),
            Product::new("pt-syrupusdc", "PT-syrupUSDC", "Pendle", 6.5, Denomination::Usd),
        ])
    }

    pub fn get(&self, id: &ProductId) -> Option<&Product> {
        self.index.get(id).map(|&idx| &self.products[idx])
    }

    pub fn contains(&self, id: &ProductId) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Product> {
        self.products.iter()
    }

    pub fn by_denomination(&self, denomination: Denomination) -> impl Iterator<Item = &Product> {
        self.products.iter().filter(move |p| p.denomination == denomination)
    }

    pub fn eth_products(&self) -> impl Iterator<Item = &Product> {
        self.by_denomination(Denomination::Eth)
    }

    pub fn stablecoin_products(&self) -> impl Iterator<Item = &Product> {
        self.by_denomination(Denomination::Usd)
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Map of external pool id -> product id, for products that have one
    pub fn pool_index(&self) -> HashMap<String, ProductId> {
        self.products
            .iter()
            .filter_map(|p| p.pool_id.as_ref().map(|pool| (pool.clone(), p.id.clone())))
            .collect()
    }

    /// Return a copy with live APYs applied.
    ///
    /// Unknown ids and non-finite values are skipped, leaving the built-in APY in place.
    pub fn with_apy_overrides(&self, overrides: &HashMap<ProductId, f64>) -> Self {
        let mut refreshed = self.clone();
        for (id, &apy) in overrides {
            if !apy.is_finite() {
                log::warn!("ignoring non-finite APY for {}", id);
                continue;
            }
            match refreshed.index.get(id) {
                Some(&idx) => refreshed.products[idx].apy = apy,
                None => log::debug!("APY override for unknown product {}", id),
            }
        }
        refreshed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_products_split_by_denomination() {
        let catalog = ProductCatalog::default_products();

        assert_eq!(catalog.len(), 11);
        assert_eq!(catalog.eth_products().count(), 4);
        assert_eq!(catalog.stablecoin_products().count(), 7);

        let wsteth = catalog.get(&ProductId::from("wsteth")).unwrap();
        assert_eq!(wsteth.protocol, "Lido");
        assert_eq!(wsteth.apy, 2.65);
        assert!(wsteth.is_eth());
    }

    #[test]
    fn test_missing_product_is_none() {
        let catalog = ProductCatalog::default_products();
        assert!(catalog.get(&ProductId::from("does-not-exist")).is_none());
    }

    #[test]
    fn test_simple_yield_is_linear_in_years() {
        let product = Product::new("x", "X", "P", 10.0, Denomination::Usd);
        // 2 years at 10% is 20% of principal, not 21%
        assert!((product.simple_yield(1000.0, 2.0) - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_apy_overrides() {
        let catalog = ProductCatalog::default_products();
        let mut overrides = HashMap::new();
        overrides.insert(ProductId::from("susde"), 9.5);
        overrides.insert(ProductId::from("unknown"), 50.0);
        overrides.insert(ProductId::from("weeth"), f64::NAN);

        let refreshed = catalog.with_apy_overrides(&overrides);

        assert_eq!(refreshed.get(&ProductId::from("susde")).unwrap().apy, 9.5);
        assert_eq!(refreshed.get(&ProductId::from("weeth")).unwrap().apy, 3.17);
        assert_eq!(refreshed.len(), catalog.len());
        // Original untouched
        assert_eq!(catalog.get(&ProductId::from("susde")).unwrap().apy, 4.9);
    }

    #[test]
    fn test_duplicate_id_replaces() {
        let catalog = ProductCatalog::new(vec![
            Product::new("a", "A", "P", 1.0, Denomination::Eth),
            Product::new("a", "A2", "P", 2.0, Denomination::Eth),
        ]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get(&ProductId::from("a")).unwrap().apy, 2.0);
    }

    #[test]
    fn test_denomination_parse() {
        assert_eq!(Denomination::parse("eth").unwrap(), Denomination::Eth);
        assert_eq!(Denomination::parse(" USD ").unwrap(), Denomination::Usd);
        assert!(Denomination::parse("BTC").is_err());
    }
}
