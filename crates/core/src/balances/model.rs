use std::collections::BTreeMap;
use std::str::FromStr;

use num_bigint::BigUint;
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};

use chainfolio_chain_data::ChainId;

use crate::catalog::ConsolidatedToken;
use crate::utils::format::format_units;

/// Balance of one token on one chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub chain_id: ChainId,
    /// Base-unit integer as a decimal string.
    pub amount: String,
    /// `amount / 10^decimals`
    pub formatted_amount: String,
    #[serde(rename = "valueUSD")]
    pub value_usd: f64,
    pub decimals: u8,
}

impl TokenBalance {
    pub fn new(chain_id: ChainId, amount: &BigUint, decimals: u8, price_usd: f64) -> Self {
        let formatted_amount = format_units(amount, decimals);
        let value_usd = units_as_f64(&formatted_amount) * price_usd;
        Self {
            chain_id,
            amount: amount.to_str_radix(10),
            formatted_amount,
            value_usd,
            decimals,
        }
    }

    pub fn amount_units(&self) -> BigUint {
        BigUint::from_str(&self.amount).unwrap_or_default()
    }

    /// Fold another balance for the same chain into this one.
    ///
    /// Amounts are summed at the finer of the two precisions. USD values are
    /// added, not re-derived from the summed amount.
    pub fn absorb(&mut self, other: &TokenBalance) {
        let decimals = self.decimals.max(other.decimals);
        let total = rescale(self.amount_units(), self.decimals, decimals)
            + rescale(other.amount_units(), other.decimals, decimals);
        self.decimals = decimals;
        self.formatted_amount = format_units(&total, decimals);
        self.amount = total.to_str_radix(10);
        self.value_usd += other.value_usd;
    }
}

fn rescale(units: BigUint, from: u8, to: u8) -> BigUint {
    units * BigUint::from(10u32).pow(u32::from(to.saturating_sub(from)))
}

fn units_as_f64(formatted: &str) -> f64 {
    formatted
        .parse::<f64>()
        .ok()
        .or_else(|| BigUint::from_str(formatted).ok().and_then(|v| v.to_f64()))
        .unwrap_or(0.0)
}

/// A consolidated token with its per-chain balances.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenWithBalance {
    #[serde(flatten)]
    pub token: ConsolidatedToken,
    pub balances: BTreeMap<ChainId, TokenBalance>,
    #[serde(rename = "totalValueUSD")]
    pub total_value_usd: f64,
    pub network_count: usize,
}

impl TokenWithBalance {
    pub fn new(token: ConsolidatedToken) -> Self {
        let network_count = token.networks.len();
        Self {
            token,
            balances: BTreeMap::new(),
            total_value_usd: 0.0,
            network_count,
        }
    }

    /// Add a balance, summing into an existing entry for the same chain.
    pub fn add_balance(&mut self, balance: TokenBalance) {
        match self.balances.get_mut(&balance.chain_id) {
            Some(existing) => existing.absorb(&balance),
            None => {
                self.balances.insert(balance.chain_id, balance);
            }
        }
        self.recompute_total();
    }

    pub fn has_balances(&self) -> bool {
        !self.balances.is_empty()
    }

    /// `total_value_usd` is always the sum over `balances`.
    pub(crate) fn recompute_total(&mut self) {
        self.total_value_usd = self.balances.values().map(|b| b.value_usd).sum();
    }
}
