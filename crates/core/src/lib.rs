//! Chainfolio Core - token consolidation and balance aggregation.
//!
//! This crate turns per-chain token listings into a canonical catalog, fetches
//! wallet balances for it in rate-limited batches, and folds the results into
//! USD positions that are published as live snapshots. Network access goes
//! through the provider traits of `chainfolio-chain-data`.

pub mod balances;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod errors;
pub mod utils;

pub use balances::{
    CycleStatus, CycleSummary, ListingMode, PortfolioService, PortfolioSnapshot, ProgressState,
    TokenBalance, TokenWithBalance,
};
pub use catalog::{consolidate_tokens, CatalogService, ConsolidatedToken, DedupPolicy, NetworkEntry};
pub use config::{AppConfig, FetchConfig};

// Re-export error types
pub use errors::Error;
pub use errors::Result;
