use serde::{Deserialize, Serialize};

use super::types::ChainId;

/// Blockchain ecosystem: a family of chains sharing wallet and address semantics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChainType {
    /// Account-based EVM chains (Ethereum, Optimism, Arbitrum, ...)
    #[serde(rename = "EVM")]
    Evm,
    /// Solana virtual machine
    #[serde(rename = "SVM")]
    Svm,
    /// UTXO chains (Bitcoin)
    #[serde(rename = "UTXO")]
    Utxo,
    /// Move virtual machine (Sui)
    #[serde(rename = "MVM")]
    Mvm,
}

impl ChainType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Evm => "EVM",
            Self::Svm => "SVM",
            Self::Utxo => "UTXO",
            Self::Mvm => "MVM",
        }
    }
}

impl std::fmt::Display for ChainType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChainType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EVM" => Ok(Self::Evm),
            "SVM" => Ok(Self::Svm),
            "UTXO" => Ok(Self::Utxo),
            "MVM" => Ok(Self::Mvm),
            other => Err(format!("unknown chain type: {}", other)),
        }
    }
}

/// Chain registry entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chain {
    pub id: ChainId,
    pub chain_type: ChainType,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "logoURI")]
    pub logo_uri: String,
    /// Short registry key, e.g. `eth`, `sol`, `btc`
    #[serde(default)]
    pub key: String,
}
