//! Folding resolved balance batches into per-token USD positions.
//!
//! The engine keeps one running entry per catalog token. Grouping by symbol
//! and ordering are applied when a view is taken, so the running state only
//! ever sees per-(token, chain) additions and the final result does not
//! depend on the order batches complete in.

use std::collections::HashMap;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};

use chainfolio_chain_data::{BalancesByChain, ChainId};

use super::model::{TokenBalance, TokenWithBalance};
use crate::catalog::ConsolidatedToken;

/// Whether tokens without any balance are part of the emitted collection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingMode {
    /// Every catalog token is listed, held or not.
    #[default]
    CatalogComplete,
    /// Only tokens with at least one balance are listed.
    HoldingsOnly,
}

impl FromStr for ListingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "catalog" | "catalog_complete" => Ok(ListingMode::CatalogComplete),
            "holdings" | "holdings_only" => Ok(ListingMode::HoldingsOnly),
            other => Err(format!("unknown listing mode '{}'", other)),
        }
    }
}

/// Running aggregation state for one epoch.
#[derive(Debug, Clone)]
pub struct AggregationEngine {
    tokens: Vec<TokenWithBalance>,
    /// (chain, lowercase address) -> first catalog token listed there and
    /// the decimals of that listing
    index: HashMap<(ChainId, String), (usize, u8)>,
    mode: ListingMode,
}

impl AggregationEngine {
    /// Seed a fresh collection from the catalog. No balances yet.
    pub fn new(catalog: &[ConsolidatedToken], mode: ListingMode) -> Self {
        let mut index = HashMap::new();
        for (pos, token) in catalog.iter().enumerate() {
            for network in &token.networks {
                index
                    .entry((network.chain_id, network.address.to_lowercase()))
                    .or_insert((pos, token.decimals_on(network)));
            }
        }
        Self {
            tokens: catalog.iter().cloned().map(TokenWithBalance::new).collect(),
            index,
            mode,
        }
    }

    pub fn empty(mode: ListingMode) -> Self {
        Self::new(&[], mode)
    }

    pub fn mode(&self) -> ListingMode {
        self.mode
    }

    /// Merge one resolved batch. Returns the number of balances stored.
    ///
    /// Zero or missing amounts and listings not in the catalog are ignored.
    pub fn merge(&mut self, batch: &BalancesByChain) -> usize {
        let mut merged = 0;
        for (chain_id, amounts) in batch {
            for amount in amounts {
                let Some(units) = amount.amount.as_ref().filter(|_| amount.is_positive()) else {
                    continue;
                };
                let key = (*chain_id, amount.token.address.to_lowercase());
                let Some(&(pos, decimals)) = self.index.get(&key) else {
                    debug!(
                        "No catalog token for {} on chain {}",
                        amount.token.address, chain_id
                    );
                    continue;
                };

                let entry = &mut self.tokens[pos];
                let balance = TokenBalance::new(
                    *chain_id,
                    units,
                    decimals,
                    entry.token.price_usd_f64(),
                );
                entry.add_balance(balance);
                merged += 1;
            }
        }
        merged
    }

    /// Grouped, filtered and ordered collection for consumers.
    pub fn view(&self) -> Vec<TokenWithBalance> {
        let mut grouped = group_by_symbol(&self.tokens);
        if self.mode == ListingMode::HoldingsOnly {
            grouped.retain(TokenWithBalance::has_balances);
        }
        sort_by_value(&mut grouped);
        grouped
    }

    pub fn total_value_usd(&self) -> f64 {
        self.tokens.iter().map(|t| t.total_value_usd).sum()
    }
}

/// Fold tokens sharing a symbol into one entry.
///
/// The first token of each symbol keeps its metadata and position. Networks
/// are unioned, per-chain balances are summed, and totals are recomputed.
/// Applying this to its own output returns the same collection.
pub fn group_by_symbol(tokens: &[TokenWithBalance]) -> Vec<TokenWithBalance> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut grouped: Vec<TokenWithBalance> = Vec::with_capacity(tokens.len());

    for token in tokens {
        match positions.get(token.token.symbol.as_str()) {
            Some(&pos) => {
                let target = &mut grouped[pos];
                target.token.absorb_networks(&token.token);
                for balance in token.balances.values() {
                    match target.balances.get_mut(&balance.chain_id) {
                        Some(existing) => existing.absorb(balance),
                        None => {
                            target.balances.insert(balance.chain_id, balance.clone());
                        }
                    }
                }
            }
            None => {
                positions.insert(token.token.symbol.as_str(), grouped.len());
                grouped.push(token.clone());
            }
        }
    }

    for token in &mut grouped {
        token.network_count = token.token.networks.len();
        token.recompute_total();
    }
    grouped
}

/// Stable sort, highest `total_value_usd` first.
pub fn sort_by_value(tokens: &mut [TokenWithBalance]) {
    tokens.sort_by(|a, b| b.total_value_usd.total_cmp(&a.total_value_usd));
}
