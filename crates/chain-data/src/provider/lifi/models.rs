//! LI.FI API response models.

use std::collections::HashMap;

use serde::Deserialize;

use serde_json::Value;

use crate::models::Chain;

/// Response of `GET /tokens`.
///
/// Chain ids arrive as JSON object keys, so they are strings here and parsed
/// by the provider. Listings stay untyped so one malformed entry does not
/// fail the whole response.
#[derive(Debug, Deserialize)]
pub struct LifiTokensResponse {
    #[serde(default)]
    pub tokens: HashMap<String, Vec<Value>>,
}

/// Response of `GET /chains`.
#[derive(Debug, Deserialize)]
pub struct LifiChainsResponse {
    #[serde(default)]
    pub chains: Vec<Chain>,
}
