//! Allocation model: the user's portfolio configuration

mod config;
mod validate;
pub mod loader;

pub use config::{
    AllocationEntry, Bucket, HedgeConfig, LeverageConfig, PortfolioConfig,
    DEFAULT_FUND_ALLOCATION,
};
pub use validate::{validate, ConfigWarning};
pub use loader::{load_config, save_config};
