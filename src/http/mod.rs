mod client;
pub mod retry;

pub use client::{ApiClient, HttpApiClient};
pub use retry::{is_retryable, with_retry, RetryConfig, RetryConfigBuilder};
