//! EVM balance provider over JSON-RPC.
//!
//! One JSON-RPC 2.0 batch is sent per chain: `eth_getBalance` for the native
//! token and `eth_call balanceOf(wallet)` for each ERC-20. If an endpoint
//! fails at the transport or HTTP level, the next endpoint of the chain is
//! tried; the last error is returned when all fail.

mod endpoints;

pub use endpoints::{public_endpoints, shuffled_public_endpoints};

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use num_bigint::BigUint;
use num_traits::Zero;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::ChainDataError;
use crate::models::{BalancesByChain, ChainId, TokenAmount, TokenDescriptor, TokensByChain};
use crate::provider::BalanceProvider;

/// Provider ID constant
const PROVIDER_ID: &str = "EVM_RPC";

/// Default HTTP request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// `balanceOf(address)` selector
const BALANCE_OF_SELECTOR: &str = "70a08231";

/// Addresses used by token lists for the chain's native coin.
const NATIVE_ADDRESSES: [&str; 2] = [
    "0x0000000000000000000000000000000000000000",
    "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee",
];

#[derive(Debug, Serialize)]
struct RpcRequest {
    jsonrpc: &'static str,
    id: usize,
    method: &'static str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    id: usize,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// Balance provider for EVM chains backed by public JSON-RPC gateways.
pub struct EvmRpcBalanceProvider {
    client: Client,
    endpoints: HashMap<ChainId, Vec<String>>,
}

impl EvmRpcBalanceProvider {
    /// Create a provider with an explicit endpoint table.
    pub fn new(endpoints: HashMap<ChainId, Vec<String>>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, endpoints }
    }

    /// Create a provider using the built-in public gateways, shuffled.
    pub fn with_public_endpoints() -> Self {
        Self::new(shuffled_public_endpoints())
    }

    /// Replace the endpoints of one chain.
    pub fn set_endpoints(&mut self, chain_id: ChainId, urls: Vec<String>) {
        self.endpoints.insert(chain_id, urls);
    }

    pub fn supports_chain(&self, chain_id: ChainId) -> bool {
        self.endpoints
            .get(&chain_id)
            .is_some_and(|urls| !urls.is_empty())
    }

    async fn fetch_chain(
        &self,
        chain_id: ChainId,
        wallet: &str,
        tokens: &[TokenDescriptor],
    ) -> Result<Vec<TokenAmount>, ChainDataError> {
        let urls = match self.endpoints.get(&chain_id) {
            Some(urls) if !urls.is_empty() => urls,
            _ => {
                warn!(
                    "No RPC endpoint configured for chain {}, skipping {} tokens",
                    chain_id,
                    tokens.len()
                );
                return Ok(Vec::new());
            }
        };

        let batch = build_batch(wallet, tokens)?;
        let mut last_error = None;

        for url in urls {
            match self.post_batch(url, &batch).await {
                Ok(responses) => return Ok(collect_amounts(tokens, responses)),
                Err(e) => {
                    debug!("RPC endpoint {} failed for chain {}: {}", url, chain_id, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ChainDataError::ProviderError {
            provider: PROVIDER_ID.to_string(),
            message: format!("no endpoint answered for chain {}", chain_id),
        }))
    }

    async fn post_batch(
        &self,
        url: &str,
        batch: &[RpcRequest],
    ) -> Result<Vec<RpcResponse>, ChainDataError> {
        let response = self
            .client
            .post(url)
            .json(batch)
            .send()
            .await
            .map_err(|e| ChainDataError::from_reqwest(PROVIDER_ID, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChainDataError::from_status(
                PROVIDER_ID,
                status.as_u16(),
                body,
            ));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ChainDataError::InvalidResponse {
                provider: PROVIDER_ID.to_string(),
                message: e.to_string(),
            })?;

        parse_batch_body(body)
    }
}

impl Default for EvmRpcBalanceProvider {
    fn default() -> Self {
        Self::with_public_endpoints()
    }
}

#[async_trait]
impl BalanceProvider for EvmRpcBalanceProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn get_balances(
        &self,
        wallet: &str,
        tokens_by_chain: &TokensByChain,
    ) -> Result<BalancesByChain, ChainDataError> {
        let mut balances = BalancesByChain::new();
        for (chain_id, tokens) in tokens_by_chain {
            if tokens.is_empty() {
                balances.insert(*chain_id, Vec::new());
                continue;
            }
            let amounts = self.fetch_chain(*chain_id, wallet, tokens).await?;
            balances.insert(*chain_id, amounts);
        }
        Ok(balances)
    }
}

fn is_native(address: &str) -> bool {
    NATIVE_ADDRESSES
        .iter()
        .any(|native| native.eq_ignore_ascii_case(address))
}

/// Validate an EVM address and return its 40 lowercase hex digits.
fn address_digits(address: &str) -> Result<String, ChainDataError> {
    let digits = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .unwrap_or(address);
    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ChainDataError::ProviderError {
            provider: PROVIDER_ID.to_string(),
            message: format!("invalid EVM address '{}'", address),
        });
    }
    Ok(digits.to_ascii_lowercase())
}

fn build_batch(wallet: &str, tokens: &[TokenDescriptor]) -> Result<Vec<RpcRequest>, ChainDataError> {
    let wallet_digits = address_digits(wallet)?;
    let wallet = format!("0x{}", wallet_digits);
    let call_data = format!("0x{}{:0>64}", BALANCE_OF_SELECTOR, wallet_digits);

    Ok(tokens
        .iter()
        .enumerate()
        .map(|(id, token)| {
            if is_native(&token.address) {
                RpcRequest {
                    jsonrpc: "2.0",
                    id,
                    method: "eth_getBalance",
                    params: json!([wallet, "latest"]),
                }
            } else {
                RpcRequest {
                    jsonrpc: "2.0",
                    id,
                    method: "eth_call",
                    params: json!([{ "to": token.address, "data": call_data }, "latest"]),
                }
            }
        })
        .collect())
}

/// Gateways answer a batch with an array, but report gateway-level failures
/// (rate limits, bad requests) as a single error object.
fn parse_batch_body(body: Value) -> Result<Vec<RpcResponse>, ChainDataError> {
    if let Some(error) = body.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown RPC error")
            .to_string();
        return Err(ChainDataError::ProviderError {
            provider: PROVIDER_ID.to_string(),
            message,
        });
    }

    serde_json::from_value(body).map_err(|e| ChainDataError::InvalidResponse {
        provider: PROVIDER_ID.to_string(),
        message: e.to_string(),
    })
}

fn parse_quantity(hex: &str) -> Option<BigUint> {
    let digits = hex.trim().trim_start_matches("0x");
    if digits.is_empty() {
        return Some(BigUint::zero());
    }
    BigUint::parse_bytes(digits.as_bytes(), 16)
}

fn collect_amounts(tokens: &[TokenDescriptor], responses: Vec<RpcResponse>) -> Vec<TokenAmount> {
    let mut by_id: HashMap<usize, RpcResponse> =
        responses.into_iter().map(|r| (r.id, r)).collect();

    tokens
        .iter()
        .enumerate()
        .map(|(id, token)| {
            let amount = match by_id.remove(&id) {
                Some(RpcResponse {
                    error: Some(err), ..
                }) => {
                    debug!(
                        "balance read failed for {} ({}): [{}] {}",
                        token.symbol, token.address, err.code, err.message
                    );
                    None
                }
                Some(RpcResponse {
                    result: Some(hex), ..
                }) => parse_quantity(&hex),
                _ => None,
            };
            TokenAmount::new(token.clone(), amount)
        })
        .collect()
}
