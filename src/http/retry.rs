//! Bounded retry with exponential backoff and jitter.
//!
//! The HTTP client itself never retries. Each subsystem that wants retries
//! owns its envelope: the realtime poller retries a fetch up to 3 times, the
//! event queue retries a flush up to 2 times, and configuration fetches are
//! not retried at all.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{ConvoKitError, ErrorCode, Result};

/// Configuration for one retry envelope.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,

    /// Base delay in milliseconds before the second attempt.
    pub base_delay_ms: u64,

    /// Cap on any single delay, in milliseconds.
    pub max_delay_ms: u64,

    /// Multiplier applied per attempt. 2.0 doubles the delay each time.
    pub backoff_multiplier: f64,

    /// Random 0..jitter milliseconds added to each delay.
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            jitter_ms: 100,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::default()
    }

    /// Backoff delay before the attempt after `attempt` failed ones:
    /// base_delay * multiplier^(attempt - 1), capped, plus jitter.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponential =
            self.base_delay_ms as f64 * self.backoff_multiplier.powi((attempt - 1) as i32);
        let capped = exponential.min(self.max_delay_ms as f64);
        let jitter = rand::random::<f64>() * self.jitter_ms as f64;

        Duration::from_millis((capped + jitter) as u64)
    }
}

#[derive(Debug, Default)]
pub struct RetryConfigBuilder {
    max_attempts: Option<u32>,
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
    backoff_multiplier: Option<f64>,
    jitter_ms: Option<u64>,
}

impl RetryConfigBuilder {
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = Some(delay);
        self
    }

    pub fn max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = Some(delay);
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = Some(multiplier);
        self
    }

    pub fn jitter_ms(mut self, jitter: u64) -> Self {
        self.jitter_ms = Some(jitter);
        self
    }

    pub fn build(self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts.unwrap_or(3),
            base_delay_ms: self.base_delay_ms.unwrap_or(1000),
            max_delay_ms: self.max_delay_ms.unwrap_or(30000),
            backoff_multiplier: self.backoff_multiplier.unwrap_or(2.0),
            jitter_ms: self.jitter_ms.unwrap_or(100),
        }
    }
}

/// Whether an error class may clear up on its own. Client-side errors and
/// undecodable responses fail fast.
pub fn is_retryable(error: &ConvoKitError) -> bool {
    matches!(
        error.code,
        ErrorCode::HttpTimeout
            | ErrorCode::HttpNetworkError
            | ErrorCode::HttpServerError
            | ErrorCode::NetworkError
            | ErrorCode::NetworkTimeout
            | ErrorCode::HttpRateLimited
    )
}

/// Run `operation` up to `config.max_attempts` times, sleeping the backoff
/// delay between attempts. Non-retryable errors return immediately; otherwise
/// the last error is returned once attempts are exhausted.
///
/// # Example
///
/// ```rust,ignore
/// use convokit::http::retry::{with_retry, RetryConfig};
///
/// let envelope = RetryConfig::builder().max_attempts(2).build();
/// let result = with_retry(|| async { send_batch().await }, &envelope).await;
/// ```
pub async fn with_retry<T, F, Fut>(operation: F, config: &RetryConfig) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error: Option<ConvoKitError> = None;

    for attempt in 1..=config.max_attempts {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !is_retryable(&e) {
                    return Err(e);
                }

                last_error = Some(e);

                if attempt < config.max_attempts {
                    let delay = config.calculate_delay(attempt);
                    tracing::debug!(
                        "Attempt {} of {} failed, waiting {:?}",
                        attempt,
                        config.max_attempts,
                        delay
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        ConvoKitError::network_error(
            ErrorCode::NetworkRetryLimit,
            "Maximum retry attempts exceeded",
        )
    }))
}
