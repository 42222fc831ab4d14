//! Error types and retry classification for the chain data crate.
//!
//! This module provides:
//! - [`ChainDataError`]: The error enum for all provider operations
//! - [`RetryClass`]: Classification for determining backoff behavior

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

/// HTTP status codes that upstream RPC gateways use to signal throttling.
const RATE_LIMIT_STATUSES: [u16; 2] = [429, 403];

/// Errors that can occur while talking to token, chain or balance providers.
///
/// Each variant is classified into a [`RetryClass`] via
/// [`retry_class`](Self::retry_class).
#[derive(Error, Debug)]
pub enum ChainDataError {
    /// The provider rate limited the request.
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
        /// HTTP status, when the signal came from a response code
        status: Option<u16>,
    },

    /// The provider answered with a non-success HTTP status.
    #[error("HTTP {status} from {provider}: {message}")]
    Http {
        provider: String,
        status: u16,
        message: String,
    },

    /// The request to the provider timed out.
    #[error("Timeout: {provider}")]
    Timeout { provider: String },

    /// A provider-specific error occurred.
    #[error("Provider error: {provider} - {message}")]
    ProviderError { provider: String, message: String },

    /// The provider answered but the body could not be understood.
    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse { provider: String, message: String },

    /// A network error occurred while communicating with a provider.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl ChainDataError {
    /// Map a transport error into a typed variant.
    ///
    /// Timeouts and rate-limit statuses get their own variants so that
    /// [`retry_class`](Self::retry_class) does not depend on message text.
    pub fn from_reqwest(provider: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout {
                provider: provider.to_string(),
            };
        }
        match err.status().map(|s| s.as_u16()) {
            Some(status) if RATE_LIMIT_STATUSES.contains(&status) => Self::RateLimited {
                provider: provider.to_string(),
                status: Some(status),
            },
            Some(status) => Self::Http {
                provider: provider.to_string(),
                status,
                message: err.to_string(),
            },
            None => Self::Network(err),
        }
    }

    /// Build an error from a non-success HTTP status and the response body.
    pub fn from_status(provider: &str, status: u16, body: impl Into<String>) -> Self {
        if RATE_LIMIT_STATUSES.contains(&status) {
            Self::RateLimited {
                provider: provider.to_string(),
                status: Some(status),
            }
        } else {
            Self::Http {
                provider: provider.to_string(),
                status,
                message: body.into(),
            }
        }
    }

    /// Returns the retry classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use chainfolio_chain_data::errors::{ChainDataError, RetryClass};
    ///
    /// let error = ChainDataError::Http {
    ///     provider: "EVM_RPC".to_string(),
    ///     status: 429,
    ///     message: "Too Many Requests".to_string(),
    /// };
    /// assert_eq!(error.retry_class(), RetryClass::RateLimited);
    ///
    /// let error = ChainDataError::Timeout { provider: "LIFI".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::Transient);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::RateLimited { .. } => RetryClass::RateLimited,
            Self::Http { status, .. } if RATE_LIMIT_STATUSES.contains(status) => {
                RetryClass::RateLimited
            }
            Self::Network(err)
                if err
                    .status()
                    .is_some_and(|s| RATE_LIMIT_STATUSES.contains(&s.as_u16())) =>
            {
                RetryClass::RateLimited
            }
            other if other.to_string().to_lowercase().contains("rate limit") => {
                RetryClass::RateLimited
            }
            _ => RetryClass::Transient,
        }
    }

    /// Name of the provider that produced the error, if known.
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::RateLimited { provider, .. }
            | Self::Http { provider, .. }
            | Self::Timeout { provider }
            | Self::ProviderError { provider, .. }
            | Self::InvalidResponse { provider, .. } => Some(provider),
            Self::Network(_) => None,
        }
    }
}
