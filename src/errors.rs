//! Error types for the I/O boundary (catalog files, config files, feed payloads)
//!
//! The projection engine itself is total and never returns these.

use thiserror::Error;

/// Errors raised while loading reference data or ingesting external feeds
#[derive(Error, Debug)]
pub enum SimulatorError {
    #[error("unknown denomination: {0}")]
    UnknownDenomination(String),

    #[error("asset {0} not found in feed response")]
    AssetNotFound(String),

    #[error("invalid number for {field}: {value}")]
    InvalidNumber { field: String, value: String },

    #[error("invalid price {0}: must be finite and positive")]
    InvalidPrice(f64),

    #[error("invalid price sweep: {0}")]
    InvalidSweep(String),

    #[error("malformed feed payload: {0}")]
    MalformedPayload(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SimulatorError>;
