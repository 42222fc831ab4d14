//! Core error types for Chainfolio.
//!
//! Only fatal, cycle-level failures are represented here. Per-batch balance
//! failures are absorbed by the scheduler and surface as warnings on the
//! portfolio snapshot instead.

use thiserror::Error;

use chainfolio_chain_data::ChainDataError;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the portfolio pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// The token metadata fetch failed; the whole cycle is aborted.
    #[error("Token catalog unavailable: {0}")]
    Catalog(#[source] ChainDataError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Configuration errors, raised at startup before any fetch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing configuration key: {0}")]
    MissingKey(String),

    #[error("Invalid configuration value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
}
