//! Retry with exponential backoff for provider HTTP calls.
//!
//! Rate-limit responses (429) wait for `Retry-After` when the provider sends
//! one; other retryable statuses and connection failures back off
//! exponentially with up to 25% jitter.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse, HttpTransport};

/// Retry policy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub use_jitter: bool,
    /// Statuses that trigger a retry.
    pub retry_status_codes: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
            backoff_multiplier: 2.0,
            use_jitter: true,
            retry_status_codes: vec![429, 502, 503, 504],
        }
    }
}

impl RetryConfig {
    /// A policy that never retries.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let base = self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = base.min(self.max_backoff_ms as f64);

        let delay_ms = if self.use_jitter {
            let jitter_range = capped * 0.25;
            let jitter = (rand::random::<f64>() * 2.0 - 1.0) * jitter_range;
            (capped + jitter).max(0.0)
        } else {
            capped
        };

        Duration::from_millis(delay_ms as u64)
    }

    #[must_use]
    pub fn should_retry(&self, status: u16) -> bool {
        self.retry_status_codes.contains(&status)
    }
}

/// Wraps another transport and retries transient failures.
#[derive(Clone)]
pub struct RetryingTransport {
    inner: Arc<dyn HttpTransport>,
    config: RetryConfig,
}

impl RetryingTransport {
    pub fn new(inner: Arc<dyn HttpTransport>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    fn wait_for(&self, response: &HttpResponse, attempt: u32) -> Duration {
        let backoff = self.config.calculate_backoff(attempt);
        if response.status == 429 {
            let cap = Duration::from_millis(self.config.max_backoff_ms);
            response.retry_after.map(|d| d.min(cap)).unwrap_or(backoff)
        } else {
            backoff
        }
    }
}

#[async_trait]
impl HttpTransport for RetryingTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut attempt = 0u32;

        loop {
            match self.inner.send(request.clone()).await {
                Ok(response)
                    if self.config.should_retry(response.status)
                        && attempt < self.config.max_retries =>
                {
                    attempt += 1;
                    let wait = self.wait_for(&response, attempt);
                    warn!(
                        url = %request.url,
                        status = response.status,
                        attempt = attempt,
                        wait_ms = wait.as_millis() as u64,
                        "Transient response, retrying with backoff"
                    );
                    tokio::time::sleep(wait).await;
                }
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let wait = self.config.calculate_backoff(attempt);
                    warn!(
                        url = %request.url,
                        error = %e,
                        attempt = attempt,
                        wait_ms = wait.as_millis() as u64,
                        "Request failed, retrying with backoff"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
