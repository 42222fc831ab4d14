use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};

use chainfolio_chain_data::{ChainId, TokenMetadataProvider};

use super::consolidate::{consolidate_tokens, DedupPolicy};
use super::model::ConsolidatedToken;
use crate::cache::{Clock, SystemClock, TtlCache};
use crate::errors::{Error, Result};

pub type Catalog = Arc<Vec<ConsolidatedToken>>;

/// Loads, consolidates and caches the token catalog for a set of chains.
pub struct CatalogService {
    provider: Arc<dyn TokenMetadataProvider>,
    policy: DedupPolicy,
    cache: TtlCache<Vec<ChainId>, Catalog>,
}

impl CatalogService {
    pub fn new(
        provider: Arc<dyn TokenMetadataProvider>,
        policy: DedupPolicy,
        ttl: Duration,
    ) -> Self {
        Self::with_clock(provider, policy, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(
        provider: Arc<dyn TokenMetadataProvider>,
        policy: DedupPolicy,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            provider,
            policy,
            cache: TtlCache::with_clock(ttl, clock),
        }
    }

    /// Consolidated catalog for `chain_ids`, served from cache while fresh.
    ///
    /// The chain order does not matter. A provider failure is returned as
    /// [`Error::Catalog`].
    pub async fn get_catalog(&self, chain_ids: &[ChainId]) -> Result<Catalog> {
        let key = cache_key(chain_ids);
        if let Some(catalog) = self.cache.get(&key) {
            debug!("Token catalog cache hit for chains {:?}", key);
            return Ok(catalog);
        }

        let raw = self
            .provider
            .get_tokens_for_chains(&key)
            .await
            .map_err(Error::Catalog)?;

        let catalog: Catalog = Arc::new(consolidate_tokens(&raw, self.policy));
        info!(
            "Consolidated {} tokens across {} chains from {}",
            catalog.len(),
            key.len(),
            self.provider.id()
        );
        self.cache.set(key, catalog.clone());
        Ok(catalog)
    }

    /// Whether a catalog for `chain_ids` is cached and not yet expired.
    pub fn is_fresh(&self, chain_ids: &[ChainId]) -> bool {
        self.cache.get(&cache_key(chain_ids)).is_some()
    }

    /// Drop every cached catalog.
    pub fn invalidate(&self) {
        self.cache.clear();
    }
}

fn cache_key(chain_ids: &[ChainId]) -> Vec<ChainId> {
    let mut key = chain_ids.to_vec();
    key.sort_unstable();
    key.dedup();
    key
}
