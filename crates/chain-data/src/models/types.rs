use std::collections::BTreeMap;

use super::token::{TokenAmount, TokenDescriptor};

/// Numeric chain identifier (EIP-155 id for EVM chains, LI.FI id otherwise).
pub type ChainId = u64;

/// Wallet address as handed over by the wallet connector.
pub type WalletAddress = String;

/// Raw token listings keyed by chain.
pub type TokensByChain = BTreeMap<ChainId, Vec<TokenDescriptor>>;

/// Balance provider response keyed by chain.
pub type BalancesByChain = BTreeMap<ChainId, Vec<TokenAmount>>;
