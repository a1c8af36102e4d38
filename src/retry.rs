//! Bounded retry with a fixed short backoff.
//!
//! Used by the reservation engine's quantity path, where a concurrent
//! hold can win the claim race and the whole allocation is retried from
//! the free-set computation.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Run `op` up to `attempts` times, sleeping `backoff` between tries.
/// Returns the first success or the last error.
pub async fn with_retries<T, E, F, Fut>(attempts: u32, backoff: Duration, mut op: F) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= attempts => return Err(err),
            Err(err) => {
                debug!("attempt {}/{} failed: {}, retrying", attempt, attempts, err);
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_after_transient_failure() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> =
            with_retries(2, Duration::from_millis(1), || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err("transient".to_string())
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_surfaces_last_error_when_exhausted() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> =
            with_retries(3, Duration::from_millis(1), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("still failing".to_string())
            })
            .await;
        assert_eq!(result.unwrap_err(), "still failing");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
