use serde::{Deserialize, Serialize};

use chainfolio_chain_data::{ChainId, TokenDescriptor};

/// One chain presence of a consolidated token.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkEntry {
    pub chain_id: ChainId,
    pub address: String,
    /// Set only when this chain's listing disagrees with the token's decimals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
}

impl NetworkEntry {
    pub fn new(chain_id: ChainId, address: impl Into<String>) -> Self {
        Self {
            chain_id,
            address: address.into(),
            decimals: None,
        }
    }

    pub fn with_decimals(mut self, decimals: u8) -> Self {
        self.decimals = Some(decimals);
        self
    }

    /// Same chain and same address, ignoring address case.
    pub fn matches(&self, chain_id: ChainId, address: &str) -> bool {
        self.chain_id == chain_id && self.address.eq_ignore_ascii_case(address)
    }
}

/// Canonical cross-chain identity of one fungible asset.
///
/// Metadata fields come from the first listing seen for the dedup key;
/// `networks` collects every chain presence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedToken {
    pub id: String,
    pub sort_key: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    #[serde(rename = "logoURI")]
    pub logo_uri: String,
    #[serde(rename = "priceUSD", skip_serializing_if = "Option::is_none")]
    pub price_usd: Option<String>,
    pub coin_key: String,
    pub networks: Vec<NetworkEntry>,
}

impl ConsolidatedToken {
    /// Seed a canonical entry from its first listing.
    pub(crate) fn seed(id: String, descriptor: &TokenDescriptor) -> Self {
        Self {
            id,
            sort_key: descriptor.symbol.to_lowercase(),
            symbol: descriptor.symbol.clone(),
            name: descriptor.name.clone(),
            decimals: descriptor.decimals,
            logo_uri: descriptor.logo_uri.clone(),
            price_usd: descriptor.price_usd.clone(),
            coin_key: descriptor.coin_key.clone(),
            networks: vec![NetworkEntry::new(
                descriptor.chain_id,
                descriptor.address.clone(),
            )],
        }
    }

    /// Add a chain presence unless an identical (chain, address) pair exists.
    /// Returns whether the entry was added.
    pub fn add_network(&mut self, entry: NetworkEntry) -> bool {
        let present = self
            .networks
            .iter()
            .any(|n| n.chain_id == entry.chain_id && n.address == entry.address);
        if present {
            return false;
        }
        self.networks.push(entry);
        true
    }

    /// Union another token's networks into this one, keeping each chain's
    /// effective decimals.
    pub fn absorb_networks(&mut self, other: &ConsolidatedToken) {
        for network in &other.networks {
            let decimals = other.decimals_on(network);
            let mut entry = NetworkEntry::new(network.chain_id, network.address.clone());
            if decimals != self.decimals {
                entry = entry.with_decimals(decimals);
            }
            self.add_network(entry);
        }
    }

    /// Decimals of the listing on `network`.
    pub fn decimals_on(&self, network: &NetworkEntry) -> u8 {
        network.decimals.unwrap_or(self.decimals)
    }

    pub fn has_network(&self, chain_id: ChainId, address: &str) -> bool {
        self.networks.iter().any(|n| n.matches(chain_id, address))
    }

    /// USD price as a float, `0.0` when absent or unparsable.
    pub fn price_usd_f64(&self) -> f64 {
        self.price_usd
            .as_deref()
            .and_then(|p| p.trim().parse::<f64>().ok())
            .filter(|p| p.is_finite())
            .unwrap_or(0.0)
    }

    /// Listing of this token on one of its networks, as sent to a balance provider.
    pub fn descriptor_for(&self, network: &NetworkEntry) -> TokenDescriptor {
        TokenDescriptor {
            address: network.address.clone(),
            decimals: self.decimals_on(network),
            symbol: self.symbol.clone(),
            chain_id: network.chain_id,
            coin_key: self.coin_key.clone(),
            name: self.name.clone(),
            logo_uri: self.logo_uri.clone(),
            price_usd: self.price_usd.clone(),
        }
    }
}
