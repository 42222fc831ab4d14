//! Retry policy for batch balance requests.
//!
//! The policy is parameterized by a failure classifier and a backoff
//! function so the scheduler can be tested without real network timing.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::warn;

use chainfolio_chain_data::{ChainDataError, RetryClass};

type Classifier<E> = Arc<dyn Fn(&E) -> RetryClass + Send + Sync>;
type Backoff = Arc<dyn Fn(RetryClass, u32) -> Duration + Send + Sync>;

/// The operation kept failing until the attempt budget ran out.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

impl<E: fmt::Display> fmt::Display for RetryExhausted<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gave up after {} attempts: {}", self.attempts, self.last_error)
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for RetryExhausted<E> {}

/// Bounded retry with classified backoff.
pub struct RetryPolicy<E> {
    max_retries: u32,
    classify: Classifier<E>,
    backoff: Backoff,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            max_retries: self.max_retries,
            classify: self.classify.clone(),
            backoff: self.backoff.clone(),
        }
    }
}

impl<E> RetryPolicy<E> {
    pub fn new<C, B>(max_retries: u32, classify: C, backoff: B) -> Self
    where
        C: Fn(&E) -> RetryClass + Send + Sync + 'static,
        B: Fn(RetryClass, u32) -> Duration + Send + Sync + 'static,
    {
        Self {
            max_retries,
            classify: Arc::new(classify),
            backoff: Arc::new(backoff),
        }
    }

    /// First attempt plus `max_retries` retries.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before the next attempt, `failures` being the number of failed
    /// attempts so far (starting at 1).
    pub fn delay_for(&self, error: &E, failures: u32) -> Duration {
        (self.backoff)((self.classify)(error), failures)
    }

    /// Run `op` until it succeeds or the attempt budget is spent.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, RetryExhausted<E>>
    where
        E: fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) if attempt >= max_attempts => {
                    return Err(RetryExhausted {
                        attempts: attempt,
                        last_error: error,
                    });
                }
                Err(error) => {
                    let class = (self.classify)(&error);
                    let delay = (self.backoff)(class, attempt);
                    warn!(
                        "Attempt {}/{} failed ({}): {}. Retrying in {:?}",
                        attempt, max_attempts, class, error, delay
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}

impl RetryPolicy<ChainDataError> {
    /// Provider-error classification with [`classified_backoff`].
    pub fn for_chain_data(max_retries: u32, base_delay: Duration) -> Self {
        Self::new(
            max_retries,
            ChainDataError::retry_class,
            classified_backoff(base_delay),
        )
    }
}

/// `base * 2^failures` for rate limits, flat `base` for anything else.
pub fn classified_backoff(base: Duration) -> impl Fn(RetryClass, u32) -> Duration + Send + Sync {
    move |class, failures| match class {
        RetryClass::RateLimited => base.saturating_mul(2u32.saturating_pow(failures)),
        RetryClass::Transient => base,
    }
}
