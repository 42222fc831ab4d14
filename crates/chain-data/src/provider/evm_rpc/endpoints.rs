//! Public JSON-RPC endpoints for the EVM chains supported out of the box.

use std::collections::HashMap;

use rand::seq::SliceRandom;

use crate::models::ChainId;

const ETHEREUM: &[&str] = &[
    "https://eth.llamarpc.com",
    "https://ethereum.publicnode.com",
    "https://rpc.ankr.com/eth",
    "https://eth-mainnet.public.blastapi.io",
];

const OPTIMISM: &[&str] = &[
    "https://mainnet.optimism.io",
    "https://op-pokt.nodies.app",
    "https://optimism.meowrpc.com",
];

const ARBITRUM: &[&str] = &[
    "https://arb1.arbitrum.io/rpc",
    "https://arb-pokt.nodies.app",
    "https://arbitrum.meowrpc.com",
];

const BASE: &[&str] = &[
    "https://mainnet.base.org/",
    "https://base.meowrpc.com",
    "https://base-pokt.nodies.app",
];

/// Static endpoint table, in declaration order.
pub fn public_endpoints() -> HashMap<ChainId, Vec<String>> {
    [
        (1, ETHEREUM),
        (10, OPTIMISM),
        (42161, ARBITRUM),
        (8453, BASE),
    ]
    .into_iter()
    .map(|(chain_id, urls)| (chain_id, urls.iter().map(|u| u.to_string()).collect()))
    .collect()
}

/// Endpoint table with each chain's list shuffled, so that load spreads
/// across public gateways between sessions.
pub fn shuffled_public_endpoints() -> HashMap<ChainId, Vec<String>> {
    let mut rng = rand::thread_rng();
    let mut endpoints = public_endpoints();
    for urls in endpoints.values_mut() {
        urls.shuffle(&mut rng);
    }
    endpoints
}
