/// Classification for retry policy.
///
/// Every balance-provider failure is considered retryable; the class only
/// selects the backoff curve used by the caller.
///
/// | Class | Backoff |
/// |-------|---------|
/// | `RateLimited` | exponential (`delay * 2^attempt`) |
/// | `Transient` | flat (`delay`) |
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum RetryClass {
    /// The upstream asked us to slow down (HTTP 429/403 or a "rate limit"
    /// message). Retry with exponential backoff.
    RateLimited,

    /// Timeout, dropped connection, 5xx or anything else that may succeed on
    /// a second try. Retry after a flat delay.
    Transient,
}

impl std::fmt::Display for RetryClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimited => write!(f, "rate_limited"),
            Self::Transient => write!(f, "transient"),
        }
    }
}
