//! Transport retry with exponential backoff.
//!
//! - Retry transient failures after 2^n seconds
//! - Cap each wait at 1 hour
//! - Give up after `MAX_RETRIES` retries
//!
//! Group membership must track the record store: a revoked requester left
//! in the channel because of a flaky network call is a privilege leak.

use super::traits::ChatError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Maximum retries before giving up.
pub const MAX_RETRIES: u32 = 12; // 2^12 = 4096 seconds > 1 hour

/// Maximum backoff duration (1 hour).
pub const MAX_BACKOFF_SECS: u64 = 3600;

/// Wait before retry number `attempt` (zero-based).
pub fn backoff_for(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt).min(MAX_BACKOFF_SECS))
}

/// Retry `operation` while `is_retryable` accepts its error.
///
/// Returns the first success, or the last error once retries are exhausted
/// or the error is not retryable.
pub async fn retry_with_backoff<F, Fut, T, E>(
    mut operation: F,
    is_retryable: fn(&E) -> bool,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                if !is_retryable(&err) || attempt >= MAX_RETRIES {
                    return Err(err);
                }

                let backoff = backoff_for(attempt);
                warn!(
                    attempt = attempt + 1,
                    backoff_secs = backoff.as_secs(),
                    error = %err,
                    "transport call failed, retrying"
                );

                sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}

/// Only network errors are transient.
pub fn is_chat_error_retryable(err: &ChatError) -> bool {
    matches!(err, ChatError::Network(_))
}
