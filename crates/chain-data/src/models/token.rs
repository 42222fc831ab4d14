use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Deserializer, Serialize};

use super::types::ChainId;

/// One chain-specific token listing, as returned by the token metadata provider.
///
/// `symbol` and `address` default to empty strings so that incomplete
/// listings still decode; consumers decide whether to skip them. Explicit
/// `null`s are treated like absent fields.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDescriptor {
    #[serde(default, deserialize_with = "null_as_default")]
    pub address: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub decimals: u8,
    #[serde(default, deserialize_with = "null_as_default")]
    pub symbol: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub chain_id: ChainId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub coin_key: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, rename = "logoURI", deserialize_with = "null_as_default")]
    pub logo_uri: String,
    #[serde(default, rename = "priceUSD", skip_serializing_if = "Option::is_none")]
    pub price_usd: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl TokenDescriptor {
    /// A listing is usable only when it carries both a symbol and an address.
    pub fn is_valid(&self) -> bool {
        !self.symbol.is_empty() && !self.address.is_empty()
    }

    /// USD price as a float, `0.0` when absent or unparsable.
    pub fn price_usd_f64(&self) -> f64 {
        self.price_usd
            .as_deref()
            .and_then(|p| p.trim().parse::<f64>().ok())
            .filter(|p| p.is_finite())
            .unwrap_or(0.0)
    }
}

/// A token listing together with the base-unit balance held by a wallet.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAmount {
    #[serde(flatten)]
    pub token: TokenDescriptor,

    /// Unsigned base-unit balance. `None` when the provider could not read it.
    #[serde(default, with = "amount_string", skip_serializing_if = "Option::is_none")]
    pub amount: Option<BigUint>,
}

impl TokenAmount {
    pub fn new(token: TokenDescriptor, amount: Option<BigUint>) -> Self {
        Self { token, amount }
    }

    /// True when the balance is present and non-zero.
    pub fn is_positive(&self) -> bool {
        self.amount.as_ref().is_some_and(|a| !a.is_zero())
    }
}

/// Base-unit amounts travel as decimal strings to avoid precision loss.
mod amount_string {
    use num_bigint::BigUint;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<BigUint>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) => serializer.serialize_str(&v.to_str_radix(10)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<BigUint>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Raw::Number(n)) => Ok(Some(BigUint::from(n))),
            Some(Raw::Text(s)) if s.trim().is_empty() => Ok(None),
            Some(Raw::Text(s)) => s
                .trim()
                .parse::<BigUint>()
                .map(Some)
                .map_err(|e| de::Error::custom(format!("invalid amount '{}': {}", s, e))),
        }
    }
}
