//! Fixed-delay retry for rate-limited Admin API calls.

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;

use super::ShopifyError;

/// Retry a call while Shopify answers with a rate limit.
///
/// The delay is fixed; `Retry-After` is not consulted. Any error other than
/// [`ShopifyError::RateLimited`] is returned immediately, and once the
/// budget is spent the last rate-limit error is returned.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Create a policy with `attempts` retries after the first call.
    #[must_use]
    pub const fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Retries allowed after the first call.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Run `operation`, retrying on rate limiting.
    ///
    /// # Errors
    ///
    /// Returns the operation's error, or `ShopifyError::RateLimited` when the
    /// retry budget is exhausted.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, ShopifyError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ShopifyError>>,
    {
        let mut retries_left = self.attempts;
        loop {
            match operation().await {
                Err(err) if err.is_rate_limited() && retries_left > 0 => {
                    retries_left -= 1;
                    tracing::warn!(
                        delay_ms = u64::try_from(self.delay.as_millis()).unwrap_or(u64::MAX),
                        retries_left,
                        "Shopify rate limited, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                }
                result => return result,
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryConfig::default().into()
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self::new(config.attempts, config.delay)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = fast(3)
            .run(|| async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ShopifyError::RateLimited(2))
                } else {
                    Ok("done")
                }
            })
            .await;

        assert!(matches!(result, Ok("done")));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_budget_surfaces_rate_limit() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast(3)
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ShopifyError::RateLimited(2))
            })
            .await;

        assert!(matches!(result, Err(ShopifyError::RateLimited(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast(3)
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ShopifyError::Unauthorized("expired".to_string()))
            })
            .await;

        assert!(matches!(result, Err(ShopifyError::Unauthorized(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_default_matches_config() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts(), 3);
        assert_eq!(RetryPolicy::none().attempts(), 0);
    }
}
