//! Retry policy and backoff sleeping.
//!
//! Only gateway failures (502/503/504) and requests that never got a
//! response are retried, and only for idempotent requests. The wait before
//! attempt `n + 1` is `base_delay * 2^(n - 1)`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;

/// Default number of attempts per logical call.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Statuses the gateway emits while the backend restarts or redeploys.
pub const RETRYABLE_STATUSES: &[u16] = &[502, 503, 504];

/// Retry budget for a single logical call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            retryable_statuses: RETRYABLE_STATUSES.to_vec(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Attempts allowed for a request; never below one.
    pub fn attempts_for(&self, idempotent: bool) -> u32 {
        if idempotent {
            self.max_attempts.max(1)
        } else {
            1
        }
    }

    /// Wait after failed attempt `attempt` (1-based) before the next one.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }
}

/// Pluggable backoff sleep.
///
/// Production uses `tokio::time::sleep`; tests swap in a recorder that
/// returns immediately.
#[derive(Clone)]
pub struct Sleeper(Arc<dyn Fn(Duration) -> BoxFuture<'static, ()> + Send + Sync>);

impl Sleeper {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Duration) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Non-blocking timer sleep on the tokio runtime.
    pub fn tokio() -> Self {
        Self::new(|delay| Box::pin(tokio::time::sleep(delay)))
    }

    /// Returns immediately.
    pub fn instant() -> Self {
        Self::new(|_| Box::pin(async {}))
    }

    pub async fn sleep(&self, delay: Duration) {
        (self.0)(delay).await;
    }
}

impl Default for Sleeper {
    fn default() -> Self {
        Self::tokio()
    }
}

impl fmt::Debug for Sleeper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Sleeper(..)")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn default_policy_matches_gateway_contract() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        for status in [502, 503, 504] {
            assert!(policy.is_retryable_status(status));
        }
        assert!(!policy.is_retryable_status(500));
        assert!(!policy.is_retryable_status(401));
    }

    #[test]
    fn delay_doubles_per_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_millis(1000));
        assert_eq!(policy.delay(2), Duration::from_millis(2000));
        assert_eq!(policy.delay(3), Duration::from_millis(4000));
        assert!(policy.delay(40) >= policy.delay(31));
    }

    #[test]
    fn non_idempotent_requests_get_one_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts_for(true), 3);
        assert_eq!(policy.attempts_for(false), 1);

        let zero = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };
        assert_eq!(zero.attempts_for(true), 1);
        assert_eq!(RetryPolicy::none().attempts_for(true), 1);
    }

    #[tokio::test]
    async fn custom_sleeper_sees_requested_delay() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sleeper = Sleeper::new(move |d| {
            sink.lock().unwrap().push(d);
            Box::pin(async {})
        });

        sleeper.sleep(Duration::from_millis(250)).await;
        assert_eq!(*seen.lock().unwrap(), vec![Duration::from_millis(250)]);
    }

    #[test]
    fn instant_sleeper_does_not_wait() {
        tokio_test::block_on(Sleeper::instant().sleep(Duration::from_secs(3600)));
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_sleeper_waits_on_the_timer() {
        let start = tokio::time::Instant::now();
        Sleeper::tokio().sleep(Duration::from_secs(2)).await;
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
