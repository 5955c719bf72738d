//! Retry wrapper
//!
//! Wraps a fallible step action with fixed/linear/exponential backoff,
//! grounded on the interpreter's retry policy (spec.md §4.2).

use crate::error::Result;
use crate::graph::{BackoffKind, RetryPolicy};
use std::future::Future;
use tokio::time::{sleep, Duration};
use tracing::warn;

fn delay_for(policy: &RetryPolicy, attempt: u32) -> Duration {
    let ms = match policy.backoff {
        BackoffKind::Fixed => policy.retry_delay_ms,
        BackoffKind::Linear => policy.retry_delay_ms * (attempt as u64 + 1),
        BackoffKind::Exponential => policy.retry_delay_ms.saturating_mul(1u64 << attempt.min(16)),
    };
    Duration::from_millis(ms)
}

/// Run `action` up to `policy.max_retries + 1` times, sleeping between
/// attempts per `policy.backoff`. Returns the last error if every attempt
/// fails (spec.md §4.2: "If `max_retries == 0` the step is executed once").
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, step_name: &str, mut action: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.max_retries + 1;
    let mut last_err = None;

    for attempt in 0..attempts {
        match action().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!(step = step_name, attempt, error = %e, "step attempt failed");
                last_err = Some(e);
                if attempt + 1 < attempts {
                    sleep(delay_for(policy, attempt)).await;
                }
            }
        }
    }
    Err(last_err.expect("loop runs at least once"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ArgoError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_on_first_try() {
        let policy = RetryPolicy {
            max_retries: 2,
            backoff: BackoffKind::Fixed,
            retry_delay_ms: 1,
        };
        let result: Result<u32> = with_retry(&policy, "step", || async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let policy = RetryPolicy {
            max_retries: 2,
            backoff: BackoffKind::Fixed,
            retry_delay_ms: 1,
        };
        let calls = AtomicU32::new(0);
        let result: Result<u32> = with_retry(&policy, "step", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ArgoError::System("transient".into()))
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_max_retries_zero_runs_once() {
        let policy = RetryPolicy {
            max_retries: 0,
            backoff: BackoffKind::Fixed,
            retry_delay_ms: 1,
        };
        let calls = AtomicU32::new(0);
        let result: Result<u32> = with_retry(&policy, "step", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ArgoError::System("permanent".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausts_attempts_and_returns_last_error() {
        let policy = RetryPolicy {
            max_retries: 1,
            backoff: BackoffKind::Fixed,
            retry_delay_ms: 1,
        };
        let calls = AtomicU32::new(0);
        let result: Result<u32> = with_retry(&policy, "step", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ArgoError::System("permanent".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_delay_progressions() {
        let fixed = RetryPolicy {
            max_retries: 0,
            backoff: BackoffKind::Fixed,
            retry_delay_ms: 100,
        };
        assert_eq!(delay_for(&fixed, 0), Duration::from_millis(100));
        assert_eq!(delay_for(&fixed, 5), Duration::from_millis(100));

        let linear = RetryPolicy {
            max_retries: 0,
            backoff: BackoffKind::Linear,
            retry_delay_ms: 100,
        };
        assert_eq!(delay_for(&linear, 0), Duration::from_millis(100));
        assert_eq!(delay_for(&linear, 2), Duration::from_millis(300));

        let exp = RetryPolicy {
            max_retries: 0,
            backoff: BackoffKind::Exponential,
            retry_delay_ms: 100,
        };
        assert_eq!(delay_for(&exp, 0), Duration::from_millis(100));
        assert_eq!(delay_for(&exp, 2), Duration::from_millis(400));
    }
}
