//! Timeout, bounded retry and cancellation around TEE calls.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::config::CallPolicy;
use crate::error::{Result, TeeError};

/// Run `f` under `policy`, retrying only retryable errors.
///
/// Each attempt is bounded by `policy.request_timeout`; a timeout counts as a
/// transport failure. Cancelling `cancel` aborts the in-flight attempt or the
/// backoff sleep and returns [`TeeError::Cancelled`].
pub async fn run_with_policy<T, F, Fut>(
    mut f: F,
    policy: &CallPolicy,
    cancel: &CancellationToken,
    operation: &str,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.retry.max_attempts.max(1);
    let mut delay = policy.retry.initial_delay_ms;
    let mut attempt = 0;

    loop {
        attempt += 1;
        if cancel.is_cancelled() {
            return Err(TeeError::cancelled(operation));
        }
        debug!("{} (attempt {}/{})", operation, attempt, max_attempts);

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TeeError::cancelled(operation)),
            r = timeout(policy.request_timeout, f()) => r,
        };

        let err = match outcome {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => e,
            Err(_) => TeeError::transport(format!(
                "{} timed out after {}ms",
                operation,
                policy.request_timeout.as_millis()
            )),
        };

        if !err.is_retryable() {
            return Err(err);
        }
        if attempt >= max_attempts {
            if max_attempts > 1 {
                error!("{} failed after {} attempts", operation, max_attempts);
            }
            return Err(err);
        }

        warn!(
            "{} failed (attempt {}/{}): {}; retrying in {}ms",
            operation, attempt, max_attempts, err, delay
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TeeError::cancelled(operation)),
            _ = sleep(Duration::from_millis(delay)) => {}
        }

        delay = std::cmp::min(
            (delay as f64 * policy.retry.backoff_multiplier) as u64,
            policy.retry.max_delay_ms,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> CallPolicy {
        CallPolicy {
            request_timeout: Duration::from_millis(50),
            retry: RetryConfig {
                max_attempts,
                initial_delay_ms: 1,
                max_delay_ms: 4,
                backoff_multiplier: 2.0,
            },
        }
    }

    #[tokio::test]
    async fn test_retries_transport_errors_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = run_with_policy(
            move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TeeError::transport("connection refused"))
                } else {
                    Ok(7)
                }
            },
            &fast_policy(3),
            &CancellationToken::new(),
            "derive_key",
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = run_with_policy(
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TeeError::transport("connection refused"))
            },
            &fast_policy(2),
            &CancellationToken::new(),
            "derive_key",
        )
        .await;

        assert!(matches!(result, Err(TeeError::Transport(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_errors_fail_immediately() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = run_with_policy(
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TeeError::attestation("bad report"))
            },
            &fast_policy(5),
            &CancellationToken::new(),
            "tdx_quote",
        )
        .await;

        assert!(matches!(result, Err(TeeError::Attestation(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_becomes_transport_error() {
        let result: Result<()> = run_with_policy(
            || async {
                sleep(Duration::from_secs(5)).await;
                Ok(())
            },
            &fast_policy(1),
            &CancellationToken::new(),
            "derive_key",
        )
        .await;

        match result {
            Err(TeeError::Transport(msg)) => assert!(msg.contains("timed out")),
            other => panic!("expected transport timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: Result<()> = run_with_policy(
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            &fast_policy(3),
            &cancel,
            "derive_key",
        )
        .await;

        assert!(matches!(result, Err(TeeError::Cancelled(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
