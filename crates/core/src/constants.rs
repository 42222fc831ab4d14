use std::time::Duration;

/// Tokens queried per balance request
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Base delay between batches of one lane, and the unit of retry backoff
pub const DEFAULT_FETCH_DELAY: Duration = Duration::from_millis(500);

/// Retries after the first failed attempt of a batch
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// How long a consolidated token catalog stays fresh
pub const DEFAULT_CATALOG_TTL: Duration = Duration::from_secs(60 * 60);

/// Environment variable names
pub const ENV_API_URL: &str = "CHAINFOLIO_API_URL";
pub const ENV_BATCH_SIZE: &str = "CHAINFOLIO_BATCH_SIZE";
pub const ENV_FETCH_DELAY_MS: &str = "CHAINFOLIO_FETCH_DELAY_MS";
pub const ENV_MAX_RETRIES: &str = "CHAINFOLIO_MAX_RETRIES";
pub const ENV_LISTING_MODE: &str = "CHAINFOLIO_LISTING_MODE";
pub const ENV_CATALOG_TTL_SECS: &str = "CHAINFOLIO_CATALOG_TTL_SECS";
pub const ENV_DEDUP_POLICY: &str = "CHAINFOLIO_DEDUP_POLICY";
