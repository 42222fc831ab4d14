//! Token catalog: canonical cross-chain tokens built from per-chain listings.

mod consolidate;
mod model;
mod service;

pub use consolidate::{consolidate_raw, consolidate_tokens, DedupPolicy};
pub use model::{ConsolidatedToken, NetworkEntry};
pub use service::{Catalog, CatalogService};
