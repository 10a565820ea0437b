//! CSV-based catalog loader
//!
//! Loads products, borrow rates and collateral parameters from CSV files in data/catalog/

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::Reader;
use serde::Deserialize;

use super::lending::{BorrowMarket, CollateralParams, CollateralTable};
use super::product::{Denomination, Product, ProductCatalog, ProductId};
use crate::errors::{Result, SimulatorError};

/// Default path to catalog directory
pub const DEFAULT_CATALOG_PATH: &str = "data/catalog";

/// Raw CSV row matching products.csv columns
#[derive(Debug, Deserialize)]
struct ProductRow {
    id: String,
    name: String,
    protocol: String,
    apy: f64,
    denomination: String,
    #[serde(default)]
    pool_id: Option<String>,
}

impl ProductRow {
    fn to_product(self) -> Result<Product> {
        let denomination = Denomination::parse(&self.denomination)?;
        Ok(Product {
            id: ProductId::new(self.id),
            name: self.name,
            protocol: self.protocol,
            apy: self.apy,
            denomination,
            pool_id: self.pool_id.filter(|p| !p.trim().is_empty()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct BorrowRateRow {
    asset: String,
    rate: f64,
}

#[derive(Debug, Deserialize)]
struct CollateralRow {
    product_id: String,
    max_ltv: f64,
    liquidation_threshold: f64,
}

/// Load products from any reader
pub fn load_products_from_reader<R: Read>(reader: R) -> Result<Vec<Product>> {
    let mut csv_reader = Reader::from_reader(reader);
    let mut products = Vec::new();

    for result in csv_reader.deserialize() {
        let row: ProductRow = result?;
        products.push(row.to_product()?);
    }

    Ok(products)
}

/// Load products from products.csv
pub fn load_products(path: &Path) -> Result<Vec<Product>> {
    let file = File::open(path.join("products.csv"))?;
    load_products_from_reader(file)
}

/// Load borrow rates from any reader
/// Returns Vec<(asset, rate)>
pub fn load_borrow_rates_from_reader<R: Read>(reader: R) -> Result<Vec<(String, f64)>> {
    let mut csv_reader = Reader::from_reader(reader);
    let mut rates = Vec::new();

    for result in csv_reader.deserialize() {
        let row: BorrowRateRow = result?;
        rates.push((row.asset, row.rate));
    }

    Ok(rates)
}

/// Load borrow rates from borrow_rates.csv
pub fn load_borrow_rates(path: &Path) -> Result<Vec<(String, f64)>> {
    let file = File::open(path.join("borrow_rates.csv"))?;
    load_borrow_rates_from_reader(file)
}

/// Load collateral parameters from any reader
pub fn load_collateral_from_reader<R: Read>(reader: R) -> Result<Vec<CollateralParams>> {
    let mut csv_reader = Reader::from_reader(reader);
    let mut params = Vec::new();

    for result in csv_reader.deserialize() {
        let row: CollateralRow = result?;
        params.push(CollateralParams {
            product_id: ProductId::new(row.product_id),
            max_ltv: row.max_ltv,
            liquidation_threshold: row.liquidation_threshold,
        });
    }

    Ok(params)
}

/// Load collateral parameters from collateral.csv
pub fn load_collateral(path: &Path) -> Result<Vec<CollateralParams>> {
    let file = File::open(path.join("collateral.csv"))?;
    load_collateral_from_reader(file)
}

/// Load APY overrides (product id -> apy) from a two-column CSV
pub fn load_apy_overrides<R: Read>(reader: R) -> Result<HashMap<ProductId, f64>> {
    let mut csv_reader = Reader::from_reader(reader);
    let mut overrides = HashMap::new();

    for result in csv_reader.records() {
        let record = result?;
        let (id, raw_apy) = match (record.get(0), record.get(1)) {
            (Some(id), Some(apy)) => (id.trim(), apy.trim()),
            _ => {
                return Err(SimulatorError::MalformedPayload(format!(
                    "expected product_id,apy but got {:?}",
                    record
                )))
            }
        };
        let apy: f64 = raw_apy.parse().map_err(|_| SimulatorError::InvalidNumber {
            field: format!("apy for {}", id),
            value: raw_apy.to_string(),
        })?;
        overrides.insert(ProductId::new(id), apy);
    }

    Ok(overrides)
}

/// All catalog tables loaded from one directory
pub struct LoadedCatalog {
    pub products: Vec<Product>,
    pub borrow_rates: Vec<(String, f64)>,
    pub collateral: Vec<CollateralParams>,
}

impl LoadedCatalog {
    /// Load all tables from the default path
    pub fn load_default() -> Result<Self> {
        Self::load_from(Path::new(DEFAULT_CATALOG_PATH))
    }

    /// Load all tables from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        Ok(Self {
            products: load_products(path)?,
            borrow_rates: load_borrow_rates(path)?,
            collateral: load_collateral(path)?,
        })
    }

    pub fn product_catalog(&self) -> ProductCatalog {
        ProductCatalog::new(self.products.clone())
    }

    pub fn borrow_market(&self) -> BorrowMarket {
        BorrowMarket::new(self.borrow_rates.clone())
    }

    pub fn collateral_table(&self) -> CollateralTable {
        CollateralTable::new(self.collateral.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_default_catalog() {
        let result = LoadedCatalog::load_default();
        assert!(result.is_ok(), "Failed to load catalog: {:?}", result.err());

        let loaded = result.unwrap();
        assert_eq!(loaded.products.len(), 11);
        assert_eq!(loaded.borrow_rates.len(), 3);
        assert_eq!(loaded.collateral.len(), 2);

        // File data matches the built-in fallback catalog
        let builtin = ProductCatalog::default_products();
        for product in &loaded.products {
            let fallback = builtin.get(&product.id).expect("product missing from builtin");
            assert_eq!(product.apy, fallback.apy);
            assert_eq!(product.denomination, fallback.denomination);
        }
    }

    #[test]
    fn test_products_from_reader() {
        let data = "id,name,protocol,apy,denomination,pool_id\n\
                    wsteth,wstETH,Lido,2.65,ETH,abc\n\
                    susde,sUSDe,Ethena,4.9,USD,\n";
        let products = load_products_from_reader(data.as_bytes()).unwrap();

        assert_eq!(products.len(), 2);
        assert_eq!(products[0].pool_id.as_deref(), Some("abc"));
        assert_eq!(products[1].pool_id, None);
        assert_eq!(products[1].denomination, Denomination::Usd);
    }

    #[test]
    fn test_bad_denomination_is_error() {
        let data = "id,name,protocol,apy,denomination,pool_id\nwbtc,WBTC,X,1.0,BTC,\n";
        assert!(load_products_from_reader(data.as_bytes()).is_err());
    }

    #[test]
    fn test_apy_overrides_from_reader() {
        let data = "product_id,apy\nsusde,8.25\nweeth, 3.5\n";
        let overrides = load_apy_overrides(data.as_bytes()).unwrap();
        assert_eq!(overrides[&ProductId::from("susde")], 8.25);
        assert_eq!(overrides[&ProductId::from("weeth")], 3.5);

        let bad = "product_id,apy\nsusde,high\n";
        assert!(load_apy_overrides(bad.as_bytes()).is_err());
    }
}
