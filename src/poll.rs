//! Generic wait-until-ready polling used by every provisioning stage.
//!
//! Each stage of the orchestration waits on an external system (the compute
//! API, the guest SSH daemon, the application health endpoint) with the same
//! shape: probe, sleep a fixed interval, give up after a deadline. This
//! module centralises that loop so stages only supply the probe itself and a
//! [`WaitPolicy`] describing the cadence.

use std::future::Future;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::time::sleep;

/// Cadence and deadline for a polling loop.
///
/// A pure value object; the loop never mutates it. The `description` names
/// the awaited condition and is echoed in the timeout error so operators can
/// tell which stage gave up.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WaitPolicy {
    /// Fixed sleep between probe attempts.
    pub interval: Duration,
    /// Cumulative elapsed time after which the loop gives up.
    pub timeout: Duration,
    /// Human-readable description of the awaited condition.
    pub description: &'static str,
}

impl WaitPolicy {
    /// Creates a policy from an interval, a timeout, and a description.
    #[must_use]
    pub const fn new(interval: Duration, timeout: Duration, description: &'static str) -> Self {
        Self {
            interval,
            timeout,
            description,
        }
    }
}

/// Errors surfaced by [`poll`].
#[derive(Debug, Error, Eq, PartialEq)]
pub enum PollError<E> {
    /// The awaited condition did not hold before the policy deadline.
    #[error("timed out waiting for {description} after {}s", .elapsed.as_secs())]
    Timeout {
        /// Description of the awaited condition, from the policy.
        description: &'static str,
        /// Time spent polling before giving up.
        elapsed: Duration,
    },
    /// The probe reported a non-recoverable error; polling stopped at once.
    #[error(transparent)]
    Fatal(E),
}

/// Invokes `check` until it reports ready, fails, or the policy deadline
/// passes.
///
/// `check` resolves to `Ok(true)` when the condition holds, `Ok(false)` when
/// it should be probed again after `policy.interval`, and `Err` for a
/// non-recoverable failure. Real errors abort immediately; they are never
/// swallowed into further retries. At least one probe always runs, and the
/// loop returns no later than one interval past the deadline.
///
/// # Errors
///
/// Returns [`PollError::Timeout`] when the deadline elapses and
/// [`PollError::Fatal`] when `check` fails.
pub async fn poll<C, Fut, E>(policy: &WaitPolicy, mut check: C) -> Result<(), PollError<E>>
where
    C: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
{
    let started = Instant::now();
    loop {
        if check().await.map_err(PollError::Fatal)? {
            return Ok(());
        }

        let elapsed = started.elapsed();
        if elapsed >= policy.timeout {
            return Err(PollError::Timeout {
                description: policy.description,
                elapsed,
            });
        }

        sleep(policy.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::time::{Duration, Instant};

    use super::{PollError, WaitPolicy, poll};

    #[derive(Debug, Eq, PartialEq, thiserror::Error)]
    #[error("probe exploded")]
    struct ProbeFailure;

    fn policy(interval_ms: u64, timeout_ms: u64) -> WaitPolicy {
        WaitPolicy::new(
            Duration::from_millis(interval_ms),
            Duration::from_millis(timeout_ms),
            "test condition",
        )
    }

    #[tokio::test]
    async fn returns_immediately_when_ready() {
        let attempts = Cell::new(0u32);
        let result = poll(&policy(1, 50), || {
            attempts.set(attempts.get() + 1);
            async { Ok::<_, ProbeFailure>(true) }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(attempts.get(), 1);
    }

    #[tokio::test]
    async fn retries_until_ready() {
        let attempts = Cell::new(0u32);
        let result = poll(&policy(1, 200), || {
            attempts.set(attempts.get() + 1);
            let ready = attempts.get() >= 3;
            async move { Ok::<_, ProbeFailure>(ready) }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(attempts.get(), 3);
    }

    #[tokio::test]
    async fn times_out_within_one_interval_of_deadline() {
        let wait = policy(5, 40);
        let started = Instant::now();
        let result = poll(&wait, || async { Ok::<_, ProbeFailure>(false) }).await;
        let elapsed = started.elapsed();

        assert!(
            matches!(
                result,
                Err(PollError::Timeout {
                    description: "test condition",
                    ..
                })
            ),
            "unexpected poll outcome: {result:?}"
        );
        assert!(elapsed >= wait.timeout, "gave up early after {elapsed:?}");
        // Generous slack on top of one interval for scheduler jitter.
        assert!(
            elapsed < wait.timeout + wait.interval + Duration::from_millis(100),
            "gave up too late after {elapsed:?}"
        );
    }

    #[tokio::test]
    async fn fatal_error_aborts_after_single_attempt() {
        let attempts = Cell::new(0u32);
        let result = poll(&policy(1, 200), || {
            attempts.set(attempts.get() + 1);
            async { Err::<bool, _>(ProbeFailure) }
        })
        .await;

        assert_eq!(result, Err(PollError::Fatal(ProbeFailure)));
        assert_eq!(attempts.get(), 1);
    }
}
