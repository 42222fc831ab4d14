//! Runtime configuration.
//!
//! `FetchConfig` carries the pipeline tunables with their defaults.
//! `AppConfig::from_env` reads them from the environment (and `.env`), and
//! fails fast when the required API base URL is missing.

use std::str::FromStr;
use std::time::Duration;

use crate::balances::ListingMode;
use crate::catalog::DedupPolicy;
use crate::constants::*;
use crate::errors::{ConfigError, Result};

/// Tunables for one portfolio fetch cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchConfig {
    /// Tokens per balance request (B).
    pub batch_size: usize,
    /// Inter-batch delay and backoff unit (D).
    pub fetch_delay: Duration,
    /// Retries after the first failed attempt (R).
    pub max_retries: u32,
    /// Whether tokens without balances stay in the emitted collection.
    pub listing_mode: ListingMode,
    /// Dedup key used when consolidating the catalog.
    pub dedup_policy: DedupPolicy,
    /// Freshness window of the cached catalog.
    pub catalog_ttl: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            fetch_delay: DEFAULT_FETCH_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
            listing_mode: ListingMode::default(),
            dedup_policy: DedupPolicy::default(),
            catalog_ttl: DEFAULT_CATALOG_TTL,
        }
    }
}

impl FetchConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: ENV_BATCH_SIZE.to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

/// Application configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    /// Base URL of the token metadata / chain registry API.
    pub api_url: String,
    pub fetch: FetchConfig,
}

impl AppConfig {
    /// Load configuration from the process environment, after reading `.env`
    /// if one exists.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Ok(Self::from_lookup(|key| std::env::var(key).ok())?)
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> std::result::Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup(ENV_API_URL)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::MissingKey(ENV_API_URL.to_string()))?;

        let defaults = FetchConfig::default();
        let fetch = FetchConfig {
            batch_size: parse_or(&lookup, ENV_BATCH_SIZE, defaults.batch_size)?,
            fetch_delay: Duration::from_millis(parse_or(
                &lookup,
                ENV_FETCH_DELAY_MS,
                defaults.fetch_delay.as_millis() as u64,
            )?),
            max_retries: parse_or(&lookup, ENV_MAX_RETRIES, defaults.max_retries)?,
            listing_mode: parse_or(&lookup, ENV_LISTING_MODE, defaults.listing_mode)?,
            dedup_policy: parse_or(&lookup, ENV_DEDUP_POLICY, defaults.dedup_policy)?,
            catalog_ttl: Duration::from_secs(parse_or(
                &lookup,
                ENV_CATALOG_TTL_SECS,
                defaults.catalog_ttl.as_secs(),
            )?),
        };
        fetch.validate()?;

        Ok(Self { api_url, fetch })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> std::result::Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
    }
}
