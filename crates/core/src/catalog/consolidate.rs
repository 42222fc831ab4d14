//! Folding raw per-chain token listings into canonical cross-chain tokens.

use std::collections::HashMap;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use chainfolio_chain_data::{ChainId, TokenDescriptor, TokensByChain};

use super::model::{ConsolidatedToken, NetworkEntry};

/// How listings on different chains are recognized as the same asset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    /// One canonical token per symbol across all chains.
    #[default]
    Symbol,
    /// One canonical token per symbol and chain.
    SymbolPerChain,
}

impl DedupPolicy {
    pub fn key(&self, descriptor: &TokenDescriptor) -> String {
        match self {
            DedupPolicy::Symbol => descriptor.symbol.clone(),
            DedupPolicy::SymbolPerChain => {
                format!("{}-{}", descriptor.symbol, descriptor.chain_id)
            }
        }
    }
}

impl FromStr for DedupPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "symbol" => Ok(DedupPolicy::Symbol),
            "symbol_per_chain" | "symbol-chain" => Ok(DedupPolicy::SymbolPerChain),
            other => Err(format!("unknown dedup policy '{}'", other)),
        }
    }
}

/// Consolidate per-chain listings into canonical tokens.
///
/// Listings without a symbol or address are skipped. Output order follows
/// the first appearance of each dedup key, chains visited in ascending id.
pub fn consolidate_tokens(
    tokens_by_chain: &TokensByChain,
    policy: DedupPolicy,
) -> Vec<ConsolidatedToken> {
    let mut consolidator = Consolidator::new(policy);
    for (chain_id, tokens) in tokens_by_chain {
        for token in tokens {
            consolidator.push(*chain_id, token);
        }
    }
    consolidator.finish()
}

/// Consolidate an untyped `{chainId: [listing, ...]}` body.
///
/// Anything that is not an object yields no tokens. Chain keys that are not
/// numeric, values that are not arrays, and listings that do not decode are
/// skipped.
pub fn consolidate_raw(raw: &Value, policy: DedupPolicy) -> Vec<ConsolidatedToken> {
    let Some(map) = raw.as_object() else {
        return Vec::new();
    };

    let mut chains: Vec<(ChainId, &Vec<Value>)> = map
        .iter()
        .filter_map(|(key, value)| {
            let chain_id = key.trim().parse::<ChainId>().ok()?;
            Some((chain_id, value.as_array()?))
        })
        .collect();
    chains.sort_by_key(|(chain_id, _)| *chain_id);

    let mut consolidator = Consolidator::new(policy);
    for (chain_id, entries) in chains {
        for entry in entries {
            match TokenDescriptor::deserialize(entry) {
                Ok(token) => consolidator.push(chain_id, &token),
                Err(e) => debug!("Skipping undecodable listing on chain {}: {}", chain_id, e),
            }
        }
    }
    consolidator.finish()
}

struct Consolidator {
    policy: DedupPolicy,
    index: HashMap<String, usize>,
    tokens: Vec<ConsolidatedToken>,
}

impl Consolidator {
    fn new(policy: DedupPolicy) -> Self {
        Self {
            policy,
            index: HashMap::new(),
            tokens: Vec::new(),
        }
    }

    /// `chain_id` is the map key; it wins over the listing's own field.
    fn push(&mut self, chain_id: ChainId, token: &TokenDescriptor) {
        if !token.is_valid() {
            return;
        }

        let mut token = token.clone();
        token.chain_id = chain_id;
        let key = self.policy.key(&token);

        match self.index.get(&key) {
            Some(&pos) => {
                let canonical = &mut self.tokens[pos];
                let mut entry = NetworkEntry::new(chain_id, token.address);
                if token.decimals != canonical.decimals {
                    entry = entry.with_decimals(token.decimals);
                }
                canonical.add_network(entry);
            }
            None => {
                self.index.insert(key.clone(), self.tokens.len());
                self.tokens.push(ConsolidatedToken::seed(key, &token));
            }
        }
    }

    fn finish(self) -> Vec<ConsolidatedToken> {
        self.tokens
    }
}
