//! Provider trait definitions.
//!
//! These are the three collaborator seams of the portfolio pipeline:
//! token metadata, chain registry and wallet balances. The core crate only
//! depends on these traits, so tests can swap in in-memory mocks.

use async_trait::async_trait;

use crate::errors::ChainDataError;
use crate::models::{BalancesByChain, Chain, ChainId, ChainType, TokensByChain};

/// Source of raw per-chain token listings.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use chainfolio_chain_data::provider::TokenMetadataProvider;
///
/// struct StaticTokens(TokensByChain);
///
/// #[async_trait]
/// impl TokenMetadataProvider for StaticTokens {
///     fn id(&self) -> &'static str {
///         "STATIC"
///     }
///
///     async fn get_tokens_for_chains(
///         &self,
///         chain_ids: &[ChainId],
///     ) -> Result<TokensByChain, ChainDataError> {
///         Ok(self.0.clone())
///     }
/// }
/// ```
#[async_trait]
pub trait TokenMetadataProvider: Send + Sync {
    /// Unique identifier for this provider, used for logging.
    fn id(&self) -> &'static str;

    /// Fetch token listings for the given chains.
    ///
    /// The returned map may contain invalid listings (missing symbol or
    /// address); filtering is the consolidator's job.
    async fn get_tokens_for_chains(
        &self,
        chain_ids: &[ChainId],
    ) -> Result<TokensByChain, ChainDataError>;
}

/// Source of wallet balances.
#[async_trait]
pub trait BalanceProvider: Send + Sync {
    fn id(&self) -> &'static str;

    /// Fetch balances of `wallet` for every listed token.
    ///
    /// The response is keyed by chain like the request. Tokens whose balance
    /// could not be read may be omitted or carry `amount: None`.
    async fn get_balances(
        &self,
        wallet: &str,
        tokens_by_chain: &TokensByChain,
    ) -> Result<BalancesByChain, ChainDataError>;
}

/// Source of supported chains per ecosystem.
#[async_trait]
pub trait ChainRegistry: Send + Sync {
    fn id(&self) -> &'static str;

    /// List the chains of one ecosystem.
    async fn list_chains(&self, chain_type: ChainType) -> Result<Vec<Chain>, ChainDataError>;
}
