//! Retry with exponential backoff for transient service errors.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{MlError, MlResult};

/// Base delay before the first retry; doubles on each attempt.
const BASE_DELAY: Duration = Duration::from_millis(500);

/// Run `operation` up to `max_retries + 1` times while it fails with a
/// retryable error.
pub(crate) async fn with_retry<F, Fut, T>(
    service: &str,
    max_retries: u32,
    operation: F,
) -> MlResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = MlResult<T>>,
{
    let mut last_error = None;

    for attempt in 0..=max_retries {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                let delay = BASE_DELAY.saturating_mul(2u32.saturating_pow(attempt));
                warn!(
                    "{} request failed (attempt {}), retrying in {:?}: {}",
                    service,
                    attempt + 1,
                    delay,
                    e
                );
                tokio::time::sleep(delay).await;
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| MlError::RequestFailed("Unknown error".to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_errors() {
        let calls = AtomicU32::new(0);
        let result = with_retry("test", 2, || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(MlError::ServiceUnavailable("busy".into()))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_fail_fast() {
        let calls = AtomicU32::new(0);
        let result: MlResult<()> = with_retry("test", 3, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(MlError::RequestFailed("bad request".into()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
