//! Generic bounded retry with exponential backoff.
//!
//! Every external fetch in the pipeline runs through [`RetryPolicy::run`].
//! The executor is an iterative loop - never recursive - so the retry depth
//! is bounded regardless of how the operation fails.
//!
//! Failures are classified by the [`Classify`] trait:
//! - [`FailureClass::Transient`]: wait the exponential delay, retry.
//! - [`FailureClass::RateLimited`]: wait a randomized duration within a wider
//!   band (the source told us to back off), then resume the standard delay
//!   sequence where it left off.
//! - [`FailureClass::Permanent`]: propagate immediately, no sleep.

use std::fmt::Display;
use std::future::Future;
use std::ops::RangeInclusive;
use std::time::Duration;

use rand::Rng;

/// How a failure should be treated by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Connectivity/timeout/server error - retry on the standard tier
    Transient,
    /// Source signaled throttling - retry on the rate-limit tier
    RateLimited,
    /// Not worth retrying - propagate immediately
    Permanent,
}

/// Classification of an error for retry purposes.
pub trait Classify {
    fn classify(&self) -> FailureClass;
}

/// Retry parameters for one class of operation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts per operation, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each transient failure
    pub backoff: f64,
    /// Band for the randomized rate-limit wait
    pub rate_limit_wait: RangeInclusive<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_secs(1),
            backoff: 2.0,
            rate_limit_wait: Duration::from_secs(30)..=Duration::from_secs(60),
        }
    }
}

/// Outcome of a retried operation that never succeeded.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E: std::error::Error> {
    /// The failure was not retryable; it is surfaced as-is.
    #[error("permanent failure: {0}")]
    Permanent(#[source] E),

    /// Every attempt failed; carries the attempt count and the final cause.
    #[error("retries exhausted after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: E,
    },
}

impl<E: std::error::Error> RetryError<E> {
    /// The final underlying failure, whichever way the loop ended.
    pub fn into_source(self) -> E {
        match self {
            Self::Permanent(e) => e,
            Self::Exhausted { source, .. } => source,
        }
    }
}

impl RetryPolicy {
    /// Execute `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `op_name` only feeds the retry logs; item identity belongs there too
    /// when the caller has it (e.g. `"genius search for <artist>"`).
    pub async fn run<T, E, F, Fut>(&self, op_name: &str, mut op: F) -> Result<T, RetryError<E>>
    where
        E: std::error::Error + Classify + Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut delay = self.initial_delay;

        for attempt in 1..=self.max_attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => match e.classify() {
                    FailureClass::Permanent => return Err(RetryError::Permanent(e)),
                    _ if attempt >= self.max_attempts => {
                        tracing::error!(
                            operation = op_name,
                            attempts = self.max_attempts,
                            error = %e,
                            "retries exhausted"
                        );
                        return Err(RetryError::Exhausted {
                            attempts: self.max_attempts,
                            source: e,
                        });
                    }
                    FailureClass::RateLimited => {
                        let wait = self.pick_rate_limit_wait();
                        tracing::warn!(
                            operation = op_name,
                            attempt,
                            wait_secs = wait.as_secs(),
                            "rate limited, backing off"
                        );
                        tokio::time::sleep(wait).await;
                        // The exponential sequence resumes untouched after
                        // the rate-limit wait.
                    }
                    FailureClass::Transient => {
                        tracing::warn!(
                            operation = op_name,
                            attempt,
                            max_attempts = self.max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "transient failure, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        delay = delay.mul_f64(self.backoff);
                    }
                },
            }
        }

        unreachable!("retry loop exits via return")
    }

    fn pick_rate_limit_wait(&self) -> Duration {
        let min = self.rate_limit_wait.start().as_millis() as u64;
        let max = self.rate_limit_wait.end().as_millis() as u64;
        if min >= max {
            return *self.rate_limit_wait.start();
        }
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error("flaky")]
        Transient,
        #[error("throttled")]
        RateLimited,
        #[error("broken credentials")]
        Fatal,
    }

    impl Classify for TestError {
        fn classify(&self) -> FailureClass {
            match self {
                Self::Transient => FailureClass::Transient,
                Self::RateLimited => FailureClass::RateLimited,
                Self::Fatal => FailureClass::Permanent,
            }
        }
    }

    fn short_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(100),
            backoff: 2.0,
            rate_limit_wait: Duration::from_secs(30)..=Duration::from_secs(60),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_exact_attempt_count_with_backoff() {
        let policy = short_policy(3);
        let calls = Cell::new(0u32);
        let started = tokio::time::Instant::now();

        let result: Result<(), _> = policy
            .run("always-fails", || {
                calls.set(calls.get() + 1);
                async { Err(TestError::Transient) }
            })
            .await;

        assert_eq!(calls.get(), 3);
        // Slept 100ms then 200ms between the three attempts, nothing after
        // the last failure.
        assert_eq!(started.elapsed(), Duration::from_millis(300));
        match result {
            Err(RetryError::Exhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected Exhausted, got {:?}", other.err()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let policy = short_policy(3);
        let calls = Cell::new(0u32);

        let result = policy
            .run("flaky", || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    if n < 2 {
                        Err(TestError::Transient)
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_stops_immediately() {
        let policy = short_policy(5);
        let calls = Cell::new(0u32);
        let started = tokio::time::Instant::now();

        let result: Result<(), _> = policy
            .run("fatal", || {
                calls.set(calls.get() + 1);
                async { Err(TestError::Fatal) }
            })
            .await;

        assert_eq!(calls.get(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert!(matches!(result, Err(RetryError::Permanent(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_tier_waits_within_band() {
        let policy = short_policy(3);
        let calls = Cell::new(0u32);
        let started = tokio::time::Instant::now();

        let result = policy
            .run("throttled-once", || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    if n == 1 {
                        Err(TestError::RateLimited)
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(calls.get(), 2);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(30), "waited {waited:?}");
        assert!(waited <= Duration::from_secs(60), "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_does_not_advance_exponential_sequence() {
        let policy = short_policy(4);
        let calls = Cell::new(0u32);
        let started = tokio::time::Instant::now();

        // rate-limited, then transient, then success: total wait must be the
        // rate-limit band pick plus the *initial* delay (100ms), not 200ms.
        let result = policy
            .run("mixed", || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    match n {
                        1 => Err(TestError::RateLimited),
                        2 => Err(TestError::Transient),
                        _ => Ok(()),
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(calls.get(), 3);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(30) + Duration::from_millis(100));
        assert!(waited <= Duration::from_secs(60) + Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_carries_final_cause() {
        let policy = short_policy(2);
        let result: Result<(), _> = policy
            .run("always-fails", || async { Err(TestError::Transient) })
            .await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("2 attempts"));
        assert!(matches!(err.into_source(), TestError::Transient));
    }
}
