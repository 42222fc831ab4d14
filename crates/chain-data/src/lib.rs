//! Chainfolio Chain Data Crate
//!
//! Provider-facing types and clients for the multi-chain portfolio pipeline.
//!
//! # Overview
//!
//! - Token listings per chain (`TokenDescriptor`) and balances (`TokenAmount`)
//! - Chain registry entries grouped by ecosystem (`ChainType`)
//! - Provider traits the core crate depends on
//! - HTTP providers: LI.FI (tokens, chains) and EVM JSON-RPC (balances)
//! - Error type with retry classification
//!
//! # Architecture
//!
//! ```text
//! +-----------------------+     +----------------------+
//! | TokenMetadataProvider |     |    ChainRegistry     |   (LifiProvider)
//! +-----------------------+     +----------------------+
//!             |                            |
//!             v                            v
//!      TokensByChain                  Vec<Chain>
//!             |
//!             v
//! +-----------------------+
//! |    BalanceProvider    |   (EvmRpcBalanceProvider)
//! +-----------------------+
//!             |
//!             v
//!      BalancesByChain
//! ```

pub mod errors;
pub mod models;
pub mod provider;

pub use errors::{ChainDataError, RetryClass};

pub use models::{
    BalancesByChain, Chain, ChainId, ChainType, ConnectedAccount, TokenAmount, TokenDescriptor,
    TokensByChain, WalletAddress,
};

pub use provider::evm_rpc::EvmRpcBalanceProvider;
pub use provider::lifi::{LifiProvider, DEFAULT_LIFI_API_URL};
pub use provider::{BalanceProvider, ChainRegistry, TokenMetadataProvider};
