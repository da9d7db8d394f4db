//! Retry with exponential backoff

use crate::provider::RetryConfig;
use std::future::Future;
use tracing::warn;

/// Run `f` until it succeeds, fails with an error `is_retryable` rejects, or
/// `config.max_attempts` is reached
pub async fn with_retry<T, E, F, Fut>(
    config: &RetryConfig,
    op_name: &str,
    is_retryable: impl Fn(&E) -> bool,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < config.max_attempts && is_retryable(&err) => {
                let delay = config.delay_for(attempt);
                warn!(
                    operation = op_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn test_retries_transient_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = with_retry(
            &fast(),
            "create",
            |e: &String| e.contains("throttled"),
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 { Err("throttled".to_string()) } else { Ok(n) }
            },
        )
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = with_retry(
            &fast(),
            "create",
            |e: &String| e.contains("throttled"),
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("invalid name".to_string())
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = tokio_test::block_on(with_retry(
            &fast(),
            "create",
            |_: &String| true,
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("throttled".to_string())
            },
        ));

        assert_eq!(result, Err("throttled".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
