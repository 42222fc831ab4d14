//! Balance fetching and aggregation.
//!
//! - `scheduler` - Splits work into (wallet, chain, batch) units and runs them
//! - `retry` - Bounded retry with classified backoff
//! - `aggregation` - Folds resolved batches into per-token USD positions
//! - `progress` / `epoch` - Cycle progress and superseding of stale cycles
//! - `service` - `PortfolioService`, which wires the pieces together

pub mod aggregation;
pub mod epoch;
pub mod model;
pub mod progress;
pub mod retry;
pub mod scheduler;
pub mod service;

#[cfg(test)]
mod service_tests;

pub use aggregation::{group_by_symbol, sort_by_value, AggregationEngine, ListingMode};
pub use epoch::{Epoch, EpochManager};
pub use model::{TokenBalance, TokenWithBalance};
pub use progress::{ProgressPhase, ProgressState, ProgressTracker};
pub use retry::{classified_backoff, RetryExhausted, RetryPolicy};
pub use scheduler::{
    BalanceFetchScheduler, BatchOutcome, BatchUnit, BatchWarning, FetchPlan, FetchReport,
};
pub use service::{CycleStatus, CycleSummary, PortfolioService, PortfolioSnapshot};
