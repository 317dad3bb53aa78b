//! Exponential backoff for transient remote failures.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use tabula_core::defaults::{
    RATE_LIMITED_BACKOFF_MULTIPLIER, RETRY_BASE_DELAY_MS, RETRY_MAX_ATTEMPTS,
};
use tabula_core::{Error, Result};

/// Run an async operation with exponential backoff.
///
/// Only retryable error categories (transient network, rate limiting) are
/// retried; everything else returns immediately. Rate-limited responses
/// back off at a multiple of the transient delay. The operation itself is
/// responsible for its own gating: a retried sync re-enters the same
/// lock/throttle checks rather than bypassing them.
///
/// Backoff schedule: 1s, 2s, 4s (doubling per attempt).
pub async fn with_backoff<T, F, Fut>(op: &str, max_attempts: u32, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);
    let mut attempt = 1u32;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(op, attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let wait = if matches!(e, Error::RateLimited(_)) {
                    delay * RATE_LIMITED_BACKOFF_MULTIPLIER
                } else {
                    delay
                };
                warn!(
                    op,
                    attempt,
                    delay_ms = wait.as_millis() as u64,
                    error = %e,
                    "Transient failure, backing off"
                );
                sleep(wait).await;
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Default-attempt convenience wrapper.
pub async fn with_default_backoff<T, F, Fut>(op: &str, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    with_backoff(op, RETRY_MAX_ATTEMPTS, operation).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = with_backoff("test", 3, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::TransientNetwork("503".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_retry_fatal_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_backoff("test", 3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::PermissionDenied("403".into())) }
        })
        .await;
        assert!(matches!(result, Err(Error::PermissionDenied(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_backoff("test", 3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::RateLimited("429".into())) }
        })
        .await;
        assert!(matches!(result, Err(Error::RateLimited(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
