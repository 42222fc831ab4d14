//! Chain data models
//!
//! - `types` - Aliases for chain ids, wallet addresses and per-chain maps
//! - `token` - Token listings (`TokenDescriptor`) and balances (`TokenAmount`)
//! - `chain` - Ecosystems (`ChainType`) and registry entries (`Chain`)
//! - `account` - Connected wallet accounts

mod account;
mod chain;
mod token;
mod types;

pub use account::ConnectedAccount;
pub use chain::{Chain, ChainType};
pub use token::{TokenAmount, TokenDescriptor};
pub use types::{BalancesByChain, ChainId, TokensByChain, WalletAddress};
