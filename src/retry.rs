//! Deadline-aware external-call wrapper
//!
//! All outbound calls (map provider, LLM) go through `call_with_retry`: a
//! per-call timeout, up to two retries on transient failures with a fixed
//! backoff schedule, everything clipped to the request deadline.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

/// Backoff schedule between attempts
const BACKOFF_SCHEDULE: [Duration; 2] = [Duration::from_millis(200), Duration::from_millis(800)];

/// Maximum attempts per call (1 initial + 2 retries)
const MAX_ATTEMPTS: u32 = 3;

/// Absolute point in time a request must finish by
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn after(duration: Duration) -> Self {
        Self {
            at: Instant::now() + duration,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn expired(&self) -> bool {
        self.remaining().is_zero()
    }
}

/// Errors that know whether a retry could help
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Outcome of a wrapped call
#[derive(Debug)]
pub enum CallError<E> {
    /// The per-call timeout elapsed on the final attempt
    Timeout,

    /// The request deadline ran out before the call could finish or retry
    DeadlineExceeded,

    /// The call failed with a non-transient error, or retries were exhausted
    Failed(E),
}

impl<E: std::fmt::Display> std::fmt::Display for CallError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "call timed out"),
            Self::DeadlineExceeded => write!(f, "request deadline exceeded"),
            Self::Failed(e) => write!(f, "call failed: {e}"),
        }
    }
}

/// Run `operation` with retry, backoff, a per-attempt timeout, and the
/// request deadline as an upper bound on everything.
pub async fn call_with_retry<T, E, F, Fut>(
    op_name: &str,
    call_timeout: Duration,
    deadline: Deadline,
    mut operation: F,
) -> Result<T, CallError<E>>
where
    E: Transient + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut last_timeout = false;

    for attempt in 1..=MAX_ATTEMPTS {
        let remaining = deadline.remaining();
        if remaining.is_zero() {
            debug!(op_name, attempt, "deadline exhausted before attempt");
            return Err(CallError::DeadlineExceeded);
        }

        let attempt_timeout = call_timeout.min(remaining);
        match tokio::time::timeout(attempt_timeout, operation()).await {
            Ok(Ok(value)) => {
                debug!(op_name, attempt, "call succeeded");
                return Ok(value);
            }
            Ok(Err(e)) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                warn!(op_name, attempt, error = %e, "transient failure, will retry");
                last_timeout = false;
            }
            Ok(Err(e)) => {
                debug!(op_name, attempt, error = %e, "call failed");
                return Err(CallError::Failed(e));
            }
            Err(_elapsed) if attempt < MAX_ATTEMPTS => {
                warn!(op_name, attempt, timeout_ms = attempt_timeout.as_millis() as u64, "call timed out, will retry");
                last_timeout = true;
            }
            Err(_elapsed) => {
                // Distinguish "the call is slow" from "the request is out of time"
                if deadline.expired() {
                    return Err(CallError::DeadlineExceeded);
                }
                return Err(CallError::Timeout);
            }
        }

        let backoff = BACKOFF_SCHEDULE[(attempt as usize - 1).min(BACKOFF_SCHEDULE.len() - 1)];
        if backoff >= deadline.remaining() {
            debug!(op_name, attempt, last_timeout, "deadline too close for backoff");
            return Err(CallError::DeadlineExceeded);
        }
        tokio::time::sleep(backoff).await;
    }

    unreachable!("retry loop always returns")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct TestError {
        transient: bool,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "test error (transient={})", self.transient)
        }
    }

    impl Transient for TestError {
        fn is_transient(&self) -> bool {
            self.transient
        }
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let deadline = Deadline::after(Duration::from_secs(5));
        let result: Result<u32, _> = call_with_retry("op", Duration::from_secs(1), deadline, || async {
            Ok::<_, TestError>(42)
        })
        .await;
        assert!(matches!(result, Ok(42)));
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let attempts = AtomicU32::new(0);
        let deadline = Deadline::after(Duration::from_secs(10));

        let result = call_with_retry("op", Duration::from_secs(1), deadline, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(TestError { transient: true })
                } else {
                    Ok(7u32)
                }
            }
        })
        .await;

        assert!(matches!(result, Ok(7)));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_transient_fails_immediately() {
        let attempts = AtomicU32::new(0);
        let deadline = Deadline::after(Duration::from_secs(10));

        let result: Result<u32, _> = call_with_retry("op", Duration::from_secs(1), deadline, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError { transient: false }) }
        })
        .await;

        assert!(matches!(result, Err(CallError::Failed(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deadline_bounds_retries() {
        let deadline = Deadline::after(Duration::from_millis(50));

        let result: Result<u32, _> = call_with_retry("op", Duration::from_secs(1), deadline, || async {
            Err(TestError { transient: true })
        })
        .await;

        // Backoff (200ms) exceeds the 50ms deadline, so the wrapper gives up
        assert!(matches!(result, Err(CallError::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn test_expired_deadline_rejects_without_calling() {
        let deadline = Deadline::after(Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(5)).await;

        let result: Result<u32, _> = call_with_retry("op", Duration::from_secs(1), deadline, || async {
            Ok::<_, TestError>(1)
        })
        .await;

        assert!(matches!(result, Err(CallError::DeadlineExceeded)));
    }
}
