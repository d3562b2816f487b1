//! Bounded retry with linear backoff.
//!
//! [`RetryPolicy`] describes the schedule: up to `max_attempts` tries, and
//! after a failed attempt `n` (1-indexed) a pause of `base_delay * n` before
//! the next one. The same policy drives page fetching ([`RetryingFetcher`])
//! and message delivery in the dispatcher.

use std::time::Duration;

use crate::error::AppError;
use crate::traits::Fetcher;

/// Attempt budget and backoff base for a retried operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay to wait after failed attempt `attempt` (1-indexed).
    ///
    /// Returns `None` once the attempt budget is spent.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            None
        } else {
            Some(self.base_delay * attempt)
        }
    }
}

impl Default for RetryPolicy {
    /// 3 attempts, 5s base: waits 5s then 10s.
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5))
    }
}

/// A [`Fetcher`] wrapper that retries failed fetches.
///
/// Timeouts, connection errors and non-2xx responses are retried per the
/// policy. Once the budget is spent (or the error is not retryable) the
/// result is a single [`AppError::FetchExhausted`].
#[derive(Clone)]
pub struct RetryingFetcher<F> {
    inner: F,
    policy: RetryPolicy,
}

impl<F: Fetcher> RetryingFetcher<F> {
    pub fn new(inner: F, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<F: Fetcher> Fetcher for RetryingFetcher<F> {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        let mut attempt = 1;
        loop {
            tracing::info!(%url, attempt, max_attempts = self.policy.max_attempts, "Fetching page");
            let err = match self.inner.fetch(url).await {
                Ok(body) => return Ok(body),
                Err(e) => e,
            };

            let delay = if err.is_retryable() {
                self.policy.delay_after(attempt)
            } else {
                None
            };

            match delay {
                Some(delay) => {
                    tracing::warn!(
                        %url,
                        attempt,
                        error = %err,
                        wait_secs = delay.as_secs_f64(),
                        "Fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    tracing::error!(%url, attempts = attempt, error = %err, "Fetch failed");
                    return Err(AppError::FetchExhausted {
                        url: url.to_string(),
                        attempts: attempt,
                        last_error: Box::new(err),
                    });
                }
            }
        }
    }
}
