//! Provider abstractions and implementations.
//!
//! This module contains:
//! - The collaborator traits (`TokenMetadataProvider`, `BalanceProvider`, `ChainRegistry`)
//! - `LifiProvider`: token lists and chain registry over the LI.FI REST API
//! - `EvmRpcBalanceProvider`: ERC-20 and native balances over public JSON-RPC endpoints

mod traits;

pub mod evm_rpc;
pub mod lifi;

pub use traits::{BalanceProvider, ChainRegistry, TokenMetadataProvider};
