//! Utility modules

pub mod duration_secs;
pub mod retry;

pub use retry::{retry_with_backoff, RetryConfig, Retryable};
