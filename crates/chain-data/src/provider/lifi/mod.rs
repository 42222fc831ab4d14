//! LI.FI provider for token metadata and the chain registry.
//!
//! Endpoints used:
//! - `GET {base}/tokens?chains=1,10,...` - token listings keyed by chain id
//! - `GET {base}/chains?chainTypes=EVM` - supported chains of one ecosystem

mod models;

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::errors::ChainDataError;
use crate::models::{Chain, ChainId, ChainType, TokenDescriptor, TokensByChain};
use crate::provider::{ChainRegistry, TokenMetadataProvider};

use models::{LifiChainsResponse, LifiTokensResponse};

/// Provider ID constant
const PROVIDER_ID: &str = "LIFI";

/// Public LI.FI API
pub const DEFAULT_LIFI_API_URL: &str = "https://li.quest/v1";

/// Default HTTP request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// LI.FI REST client.
///
/// # Example
///
/// ```ignore
/// use chainfolio_chain_data::provider::lifi::LifiProvider;
///
/// let provider = LifiProvider::new("https://li.quest/v1");
/// let tokens = provider.get_tokens_for_chains(&[1, 10]).await?;
/// ```
pub struct LifiProvider {
    client: Client,
    base_url: String,
}

impl LifiProvider {
    /// Create a provider against the given API base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self::with_client(client, base_url)
    }

    /// Create a provider with a preconfigured HTTP client.
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn tokens_url(&self, chain_ids: &[ChainId]) -> String {
        let chains = chain_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        format!("{}/tokens?chains={}", self.base_url, chains)
    }

    fn chains_url(&self, chain_type: ChainType) -> String {
        format!("{}/chains?chainTypes={}", self.base_url, chain_type)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ChainDataError> {
        debug!("LI.FI request: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ChainDataError::from_reqwest(PROVIDER_ID, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("LI.FI returned {} for {}", status, url);
            return Err(ChainDataError::from_status(
                PROVIDER_ID,
                status.as_u16(),
                body,
            ));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ChainDataError::InvalidResponse {
                provider: PROVIDER_ID.to_string(),
                message: e.to_string(),
            })
    }
}

/// Convert the string-keyed token map into a chain-id map.
///
/// Keys that are not chain ids are dropped, as are listings that do not
/// decode into a [`TokenDescriptor`].
fn into_tokens_by_chain(response: LifiTokensResponse) -> TokensByChain {
    let mut tokens = TokensByChain::new();
    for (key, list) in response.tokens {
        let Ok(chain_id) = key.trim().parse::<ChainId>() else {
            debug!("Skipping non-numeric chain key '{}' in token list", key);
            continue;
        };
        let entries = tokens.entry(chain_id).or_default();
        for raw in list {
            match TokenDescriptor::deserialize(raw) {
                Ok(token) => entries.push(token),
                Err(e) => debug!("Skipping undecodable listing on chain {}: {}", chain_id, e),
            }
        }
    }
    tokens
}

#[async_trait]
impl TokenMetadataProvider for LifiProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn get_tokens_for_chains(
        &self,
        chain_ids: &[ChainId],
    ) -> Result<TokensByChain, ChainDataError> {
        if chain_ids.is_empty() {
            return Ok(TokensByChain::new());
        }

        let response: LifiTokensResponse = self.get_json(&self.tokens_url(chain_ids)).await?;
        let tokens = into_tokens_by_chain(response);

        debug!(
            "LI.FI returned {} listings across {} chains",
            tokens.values().map(Vec::len).sum::<usize>(),
            tokens.len()
        );
        Ok(tokens)
    }
}

#[async_trait]
impl ChainRegistry for LifiProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn list_chains(&self, chain_type: ChainType) -> Result<Vec<Chain>, ChainDataError> {
        let response: LifiChainsResponse = self.get_json(&self.chains_url(chain_type)).await?;
        Ok(response
            .chains
            .into_iter()
            .filter(|c| c.chain_type == chain_type)
            .collect())
    }
}
