//! Bounded retry with fixed or exponential backoff.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::shutdown::StopSignal;

/// Delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed(Duration),
    /// `initial`, doubling per retry, never more than `max`.
    Exponential { initial: Duration, max: Duration },
}

/// How many times to try an operation and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
}

/// Outcome of a retried operation that did not succeed.
#[derive(Debug)]
pub enum RetryError<E> {
    /// All attempts failed; carries the last error.
    Exhausted { attempts: u32, last: E },
    /// The stop signal fired before or between attempts.
    Cancelled,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(10))
    }
}

impl RetryPolicy {
    /// Create a policy. At least one attempt is always made.
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::new(max_attempts, Backoff::Fixed(delay))
    }

    pub fn exponential(max_attempts: u32, initial: Duration, max: Duration) -> Self {
        Self::new(max_attempts, Backoff::Exponential { initial, max })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    ///
    /// Returns `None` after the final attempt.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let delay = match self.backoff {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { initial, max } => {
                let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
                initial.saturating_mul(factor).min(max)
            }
        };
        Some(delay)
    }

    /// Run `op` until it succeeds, the budget is spent, or `stop` fires.
    ///
    /// `op` receives the 1-based attempt number. Backoff sleeps are
    /// interrupted by the stop signal.
    pub async fn run<T, E, F, Fut>(&self, stop: &StopSignal, mut op: F) -> Result<T, RetryError<E>>
    where
        E: Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            if stop.is_stopped() {
                return Err(RetryError::Cancelled);
            }

            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Attempt {} failed: {}",
                        attempt,
                        e
                    );
                    match self.delay_for(attempt) {
                        Some(delay) => {
                            if !stop.sleep(delay).await {
                                return Err(RetryError::Cancelled);
                            }
                        }
                        None => {
                            return Err(RetryError::Exhausted {
                                attempts: attempt,
                                last: e,
                            })
                        }
                    }
                }
            }
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::shutdown::Shutdown;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn fixed_delays() {
        let policy = RetryPolicy::fixed(3, Duration::from_secs(10));
        assert_eq!(policy.delay_for(1), Some(Duration::from_secs(10)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_secs(10)));
        assert_eq!(policy.delay_for(3), None);
    }

    #[test]
    fn exponential_delays_double_and_cap() {
        let policy =
            RetryPolicy::exponential(6, Duration::from_secs(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for(1), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_for(3), Some(Duration::from_secs(4)));
        assert_eq!(policy.delay_for(4), Some(Duration::from_secs(5)));
        assert_eq!(policy.delay_for(5), Some(Duration::from_secs(5)));
        assert_eq!(policy.delay_for(6), None);
    }

    #[test]
    fn exponential_does_not_overflow() {
        let policy =
            RetryPolicy::exponential(100, Duration::from_secs(1), Duration::from_secs(60));
        assert_eq!(policy.delay_for(64), Some(Duration::from_secs(60)));
    }

    #[test]
    fn zero_attempts_means_one() {
        let policy = RetryPolicy::fixed(0, Duration::ZERO);
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.delay_for(1), None);
    }

    #[test]
    fn default_is_three_attempts_ten_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.backoff(), Backoff::Fixed(Duration::from_secs(10)));
    }

    #[tokio::test]
    async fn succeeds_after_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed(3, Duration::from_millis(1));

        let result: Result<u32, RetryError<String>> = policy
            .run(&StopSignal::never(), |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(format!("failure {}", attempt))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_with_last_error() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(1));

        let result: Result<(), RetryError<String>> = policy
            .run(&StopSignal::never(), |attempt| async move {
                Err(format!("failure {}", attempt))
            })
            .await;

        match result {
            Err(RetryError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last, "failure 3");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn stop_cancels_backoff() {
        let (shutdown, stop) = Shutdown::new();
        let policy = RetryPolicy::fixed(3, Duration::from_secs(60));
        let calls = AtomicU32::new(0);

        let run = policy.run(&stop, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("down".to_string()) }
        });
        let trigger = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            shutdown.trigger();
        };

        let (result, _) = tokio::time::timeout(Duration::from_secs(5), async {
            tokio::join!(run, trigger)
        })
        .await
        .unwrap();

        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
