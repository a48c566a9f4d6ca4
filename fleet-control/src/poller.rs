//! Bounded "fetch until converged" loop.
//!
//! Every attempt fetches a fresh value (the output of a status command, a
//! state snapshot, ...) and evaluates a predicate against it. Fetch errors
//! end the wait immediately; a predicate that never holds ends it with
//! [`ControlError::ConvergenceTimeout`] once the timeout has elapsed.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::ControlError;

/// Polling schedule: total time allowed and pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poller {
    timeout: Duration,
    interval: Duration,
}

impl Poller {
    /// Create a poller.
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    /// Total time allowed for one wait.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Pause between attempts.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Fetch and evaluate until `predicate` holds.
    ///
    /// The value is always evaluated at least once, even with a zero
    /// timeout. Returns the number of attempts it took.
    pub async fn wait_until<T, F, Fut, P>(
        &self,
        what: &str,
        mut fetch: F,
        predicate: P,
    ) -> Result<u32, ControlError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ControlError>>,
        P: Fn(&T) -> bool,
    {
        tracing::info!("Waiting for {} (timeout: {:?})", what, self.timeout);

        // A timeout too large to represent never expires.
        let deadline = Instant::now().checked_add(self.timeout);
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let value = fetch().await?;
            if predicate(&value) {
                tracing::debug!("{} after {} attempt(s)", what, attempts);
                return Ok(attempts);
            }

            let out_of_time = deadline.is_some_and(|deadline| {
                Instant::now()
                    .checked_add(self.interval)
                    .map_or(true, |next| next > deadline)
            });
            if out_of_time {
                tracing::error!(
                    "Timed out waiting for {} after {} attempt(s)",
                    what,
                    attempts
                );
                return Err(ControlError::ConvergenceTimeout {
                    what: what.to_string(),
                    timeout: self.timeout,
                });
            }

            tokio::time::sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> Poller {
        Poller::new(Duration::from_millis(200), Duration::from_millis(5))
    }

    #[tokio::test]
    async fn returns_once_predicate_holds() {
        let counter = &AtomicU32::new(0);
        let attempts = fast()
            .wait_until(
                "counter reaches 3",
                move || async move { Ok::<_, ControlError>(counter.fetch_add(1, Ordering::SeqCst) + 1) },
                |n| *n >= 3,
            )
            .await
            .unwrap();
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn times_out_when_never_true() {
        let err = fast()
            .wait_until("never", || async { Ok::<_, ControlError>(false) }, |v| *v)
            .await
            .unwrap_err();
        match err {
            ControlError::ConvergenceTimeout { what, timeout } => {
                assert_eq!(what, "never");
                assert_eq!(timeout, Duration::from_millis(200));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn zero_timeout_still_checks_once() {
        let poller = Poller::new(Duration::ZERO, Duration::from_millis(5));
        let attempts = poller
            .wait_until("already true", || async { Ok::<_, ControlError>(1) }, |_| true)
            .await
            .unwrap();
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn fetch_error_aborts_wait() {
        let calls = &AtomicU32::new(0);
        let err = fast()
            .wait_until(
                "broken fetch",
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<bool, _>(ControlError::Environment("ssh down".into()))
                },
                |v| *v,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::Environment(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unbounded_timeout_keeps_polling() {
        let counter = &AtomicU32::new(0);
        let timing = crate::config::TimingConfig {
            convergence_timeout_secs: u64::MAX,
            poll_interval_ms: 1,
            ..Default::default()
        };
        let attempts = timing
            .poller()
            .wait_until(
                "counter reaches 3",
                move || async move { Ok::<_, ControlError>(counter.fetch_add(1, Ordering::SeqCst) + 1) },
                |n| *n >= 3,
            )
            .await
            .unwrap();
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn oversized_interval_times_out_after_one_attempt() {
        let calls = &AtomicU32::new(0);
        let err = Poller::new(Duration::from_millis(50), Duration::MAX)
            .wait_until(
                "never",
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ControlError>(false)
                },
                |v| *v,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::ConvergenceTimeout { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
