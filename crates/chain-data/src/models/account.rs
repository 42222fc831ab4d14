use serde::{Deserialize, Serialize};

use super::chain::ChainType;

/// A wallet account reported by the wallet-connection layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedAccount {
    #[serde(default)]
    pub address: Option<String>,
    pub chain_type: ChainType,
    #[serde(default)]
    pub is_connected: bool,
}

impl ConnectedAccount {
    pub fn connected(address: impl Into<String>, chain_type: ChainType) -> Self {
        Self {
            address: Some(address.into()),
            chain_type,
            is_connected: true,
        }
    }

    /// Address of a connected account, `None` if disconnected or blank.
    pub fn active_address(&self) -> Option<&str> {
        if !self.is_connected {
            return None;
        }
        self.address.as_deref().map(str::trim).filter(|a| !a.is_empty())
    }
}
