//! Product catalog: yield products, borrow market and collateral parameters

mod product;
mod lending;
pub mod loader;

pub use product::{Product, ProductId, ProductCatalog, Denomination};
pub use lending::{
    BorrowMarket, CollateralParams, CollateralTable,
    DEFAULT_BORROW_RATE, DEFAULT_LIQUIDATION_THRESHOLD,
};
pub use loader::LoadedCatalog;

use std::path::Path;

use crate::errors::Result;

/// Container for all reference data the engine reads
#[derive(Debug, Clone)]
pub struct Catalog {
    pub products: ProductCatalog,
    pub borrow: BorrowMarket,
    pub collateral: CollateralTable,
}

impl Catalog {
    /// Built-in catalog with fallback APYs and rates
    pub fn default_catalog() -> Self {
        Self {
            products: ProductCatalog::default_products(),
            borrow: BorrowMarket::default_rates(),
            collateral: CollateralTable::default_params(),
        }
    }

    /// Load catalog from CSV files in the default location (data/catalog/)
    pub fn from_csv() -> Result<Self> {
        Self::from_csv_path(Path::new(loader::DEFAULT_CATALOG_PATH))
    }

    /// Load catalog from CSV files in a specific directory
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let loaded = LoadedCatalog::load_from(path)?;
        log::info!(
            "loaded {} products, {} borrow rates, {} collateral entries from {}",
            loaded.products.len(),
            loaded.borrow_rates.len(),
            loaded.collateral.len(),
            path.display()
        );

        Ok(Self {
            products: loaded.product_catalog(),
            borrow: loaded.borrow_market(),
            collateral: loaded.collateral_table(),
        })
    }

    pub fn product(&self, id: &ProductId) -> Option<&Product> {
        self.products.get(id)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::default_catalog()
    }
}
