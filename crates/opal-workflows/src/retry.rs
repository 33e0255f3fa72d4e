//! Shared retry policy
//!
//! Bounded attempt count per operation with exponential backoff between
//! attempts. Only transient errors consume retry budget; a permanent
//! error returns immediately. The backoff sleep races the cancel signal
//! so a cancelled session never waits out its delay.

use crate::cancel::CancelSignal;
use crate::failure::WorkflowFailure;
use opal_types::{DeviceSession, TransientError};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Bounded retry with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per operation, first try included
    pub max_attempts: u32,

    /// Delay before the first retry
    pub base_delay: Duration,

    /// Backoff ceiling
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Near-zero delays for tests and development
    pub fn fast() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    /// Delay before the retry following `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1u32 << exp);
        delay.min(self.max_delay)
    }
}

/// Why a retried operation gave up
#[derive(Debug)]
pub enum RetryError<E> {
    /// Permanent error on some attempt; budget untouched
    Permanent(E),

    /// Transient errors exhausted the attempt budget
    Exhausted { attempts: u32, last: E },

    /// Cancel signal delivered before or between attempts
    Cancelled,
}

impl<E: std::fmt::Display> RetryError<E> {
    /// Convert into the terminal failure diagnostic for `operation`
    pub fn into_failure(self, operation: &str) -> WorkflowFailure {
        match self {
            RetryError::Cancelled => WorkflowFailure::cancelled(),
            RetryError::Permanent(e) => WorkflowFailure::new(e.to_string()),
            RetryError::Exhausted { attempts, last } => WorkflowFailure::new(format!(
                "{operation} failed after {attempts} attempts: {last}"
            )),
        }
    }
}

/// Run `op` under the retry policy, recording consumed retries on the
/// session.
///
/// `op` is invoked once per attempt; each invocation must produce an
/// independent future (clone captured handles into it).
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancelSignal,
    session: &mut DeviceSession,
    operation: &str,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    E: TransientError + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    if cancel.is_cancelled() {
        return Err(RetryError::Cancelled);
    }

    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => return Err(RetryError::Permanent(e)),
            Err(e) => {
                if attempt >= policy.max_attempts {
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: e,
                    });
                }
                warn!(
                    device = %session.device_id,
                    operation = operation,
                    attempt = attempt,
                    error = %e,
                    "Transient failure, retrying"
                );
                session.note_retry(operation);

                let delay = policy.delay_for(attempt);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opal_types::{DeviceId, TenantId, WorkflowKind};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct FakeError {
        transient: bool,
    }

    impl std::fmt::Display for FakeError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "fake error")
        }
    }

    impl TransientError for FakeError {
        fn is_transient(&self) -> bool {
            self.transient
        }
    }

    fn session() -> DeviceSession {
        DeviceSession::new(
            DeviceId::new("D1"),
            TenantId::new("t1"),
            WorkflowKind::Activation,
            None,
        )
    }

    #[tokio::test]
    async fn test_transient_then_success() {
        let mut session = session();
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let result: Result<u32, RetryError<FakeError>> = retry_with_backoff(
            &RetryPolicy::fast(),
            &CancelSignal::none(),
            &mut session,
            "op",
            move || {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(FakeError { transient: true })
                    } else {
                        Ok(7)
                    }
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(session.retries_for("op"), 2);
    }

    #[tokio::test]
    async fn test_permanent_fails_immediately() {
        let mut session = session();
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let result: Result<(), RetryError<FakeError>> = retry_with_backoff(
            &RetryPolicy::fast(),
            &CancelSignal::none(),
            &mut session,
            "op",
            move || {
                c.fetch_add(1, Ordering::SeqCst);
                async { Err(FakeError { transient: false }) }
            },
        )
        .await;

        assert!(matches!(result, Err(RetryError::Permanent(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(session.retries_for("op"), 0);
    }

    #[tokio::test]
    async fn test_budget_exhaustion() {
        let mut session = session();

        let result: Result<(), RetryError<FakeError>> = retry_with_backoff(
            &RetryPolicy::fast(),
            &CancelSignal::none(),
            &mut session,
            "op",
            || async { Err(FakeError { transient: true }) },
        )
        .await;

        match result {
            Err(RetryError::Exhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected exhaustion, got {:?}", other.map(|_| ())),
        }
        assert_eq!(session.retries_for("op"), 2);
    }

    #[tokio::test]
    async fn test_cancel_during_backoff() {
        let mut session = session();
        let (handle, signal) = crate::cancel::cancel_pair();
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(30),
        };

        let cancel_task = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.cancel();
        });

        let result: Result<(), RetryError<FakeError>> = retry_with_backoff(
            &policy,
            &signal,
            &mut session,
            "op",
            || async { Err(FakeError { transient: true }) },
        )
        .await;

        assert!(matches!(result, Err(RetryError::Cancelled)));
        cancel_task.await.unwrap();
    }

    #[test]
    fn test_backoff_growth_and_cap() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(350));
        assert_eq!(policy.delay_for(10), Duration::from_millis(350));
    }
}
