//! Retry classification and exponential backoff
//!
//! The pipeline retries a failed item in place. This module decides whether an error is
//! worth another attempt and how long to wait before it. Delays grow exponentially up to
//! a cap, with optional jitter to keep repeated failures from hammering a server in
//! lockstep.
//!
//! # Example
//!
//! ```
//! use feed_relay::config::RetryConfig;
//! use feed_relay::error::Error;
//! use feed_relay::retry::{Backoff, RetryDecision};
//!
//! let config = RetryConfig { jitter: false, ..RetryConfig::default() };
//! let mut backoff = Backoff::new(&config);
//!
//! let transient = Error::unexpected("fetch page", 502, "bad gateway");
//! assert!(matches!(backoff.next(&transient), RetryDecision::Retry { attempt: 1, .. }));
//!
//! let fatal = Error::Unreachable("unknown media entity".into());
//! assert!(matches!(backoff.next(&fatal), RetryDecision::Fatal));
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use serde_json::error::Category;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (connection drops, timeouts, 5xx responses) should return `true`.
/// Failures that will repeat identically (unknown response shapes, invalid input)
/// should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // A malformed request will be malformed again
            Error::Network(e) => !e.is_builder(),
            // Staging and download I/O is retried; the area is recreated each attempt
            Error::Io(_) => true,
            // Status-driven failures are assumed transient
            Error::UnexpectedResponse { .. } => true,
            // Truncated or garbled bodies can succeed next time, wrong shapes cannot
            Error::Decode { source, .. } => {
                matches!(source.classify(), Category::Syntax | Category::Eof | Category::Io)
            }
            Error::Precondition(_) => false,
            Error::Unreachable(_) => false,
            Error::Config { .. } => false,
            Error::RetriesExhausted { .. } => false,
            Error::Cancelled => false,
        }
    }
}

/// Outcome of asking a [`Backoff`] what to do after a failure
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait `delay`, then make retry number `attempt`
    Retry {
        /// Retry number, starting at 1
        attempt: u32,
        /// How long to wait first
        delay: Duration,
    },
    /// The error is retryable but the budget is spent
    Exhausted {
        /// Total attempts made, including the first
        attempts: u32,
    },
    /// The error must not be retried
    Fatal,
}

/// Per-item retry state
///
/// Create one per work item; it tracks how many retries have been spent on that item
/// and the delay to use next.
#[derive(Debug, Clone)]
pub struct Backoff {
    max_attempts: u32,
    max_delay: Duration,
    multiplier: f64,
    jitter: bool,
    attempt: u32,
    delay: Duration,
}

impl Backoff {
    /// Start a fresh retry budget
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            max_delay: config.max_delay,
            multiplier: config.backoff_multiplier,
            jitter: config.jitter,
            attempt: 0,
            delay: config.initial_delay.min(config.max_delay),
        }
    }

    /// Number of retries handed out so far
    pub fn retries(&self) -> u32 {
        self.attempt
    }

    /// Decide what to do about `error`
    ///
    /// A `max_attempts` of zero never exhausts.
    pub fn next<E: IsRetryable>(&mut self, error: &E) -> RetryDecision {
        if !error.is_retryable() {
            return RetryDecision::Fatal;
        }
        if self.max_attempts != 0 && self.attempt >= self.max_attempts {
            return RetryDecision::Exhausted {
                attempts: self.attempt + 1,
            };
        }

        self.attempt += 1;
        let base = self.delay;
        let delay = if self.jitter {
            add_jitter(base).min(self.max_delay)
        } else {
            base
        };

        // Calculate next delay with exponential backoff
        let next_delay = Duration::from_secs_f64(base.as_secs_f64() * self.multiplier);
        self.delay = next_delay.min(self.max_delay);

        RetryDecision::Retry {
            attempt: self.attempt,
            delay,
        }
    }
}

/// Add random jitter to a delay
///
/// Jitter is uniformly distributed between 0% and 100% of the delay, so the result
/// lies between `delay` and `2 * delay`. Callers cap it at the configured maximum.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    let jittered_secs = delay.as_secs_f64() * (1.0 + jitter_factor);
    Duration::from_secs_f64(jittered_secs)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    enum TestError {
        Transient,
        Permanent,
    }

    impl IsRetryable for TestError {
        fn is_retryable(&self) -> bool {
            matches!(self, TestError::Transient)
        }
    }

    fn config(max_attempts: u32, initial_ms: u64, max_ms: u64, multiplier: f64) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(initial_ms),
            max_delay: Duration::from_millis(max_ms),
            backoff_multiplier: multiplier,
            jitter: false,
        }
    }

    fn delays(backoff: &mut Backoff, count: usize) -> Vec<Duration> {
        (0..count)
            .map(|_| match backoff.next(&TestError::Transient) {
                RetryDecision::Retry { delay, .. } => delay,
                other => panic!("expected retry, got {other:?}"),
            })
            .collect()
    }

    #[test]
    fn test_exponential_backoff() {
        let mut backoff = Backoff::new(&config(5, 10, 1000, 2.0));
        assert_eq!(
            delays(&mut backoff, 4),
            vec![
                Duration::from_millis(10),
                Duration::from_millis(20),
                Duration::from_millis(40),
                Duration::from_millis(80),
            ]
        );
        assert_eq!(backoff.retries(), 4);
    }

    #[test]
    fn test_individual_retry_delays_never_exceed_max_delay() {
        // Without capping, delays would be 50ms, 500ms, 5000ms, 50000ms
        let mut backoff = Backoff::new(&config(4, 50, 200, 10.0));
        assert_eq!(
            delays(&mut backoff, 4),
            vec![
                Duration::from_millis(50),
                Duration::from_millis(200),
                Duration::from_millis(200),
                Duration::from_millis(200),
            ]
        );
    }

    #[test]
    fn test_retry_exhausted() {
        let mut backoff = Backoff::new(&config(2, 10, 1000, 2.0));
        delays(&mut backoff, 2);
        assert_eq!(
            backoff.next(&TestError::Transient),
            RetryDecision::Exhausted { attempts: 3 },
            "initial attempt + 2 retries"
        );
    }

    #[test]
    fn test_permanent_error_no_retry() {
        let mut backoff = Backoff::new(&config(5, 10, 1000, 2.0));
        assert_eq!(backoff.next(&TestError::Permanent), RetryDecision::Fatal);
        assert_eq!(backoff.retries(), 0, "fatal errors do not spend budget");
    }

    #[test]
    fn test_zero_max_attempts_never_exhausts() {
        let mut backoff = Backoff::new(&config(0, 1, 4, 2.0));
        let all = delays(&mut backoff, 100);
        assert_eq!(all.len(), 100);
        assert_eq!(*all.last().unwrap(), Duration::from_millis(4));
    }

    #[test]
    fn test_initial_delay_above_cap_is_clamped() {
        let mut backoff = Backoff::new(&config(3, 500, 100, 2.0));
        assert_eq!(delays(&mut backoff, 1), vec![Duration::from_millis(100)]);
    }

    #[test]
    fn test_jittered_delays_never_exceed_max_delay() {
        let retry = RetryConfig {
            jitter: true,
            ..config(0, 100, 100, 2.0)
        };
        let mut backoff = Backoff::new(&retry);
        for delay in delays(&mut backoff, 50) {
            assert!(delay <= Duration::from_millis(100), "delay {delay:?} above cap");
        }
    }

    #[test]
    fn test_jitter_adds_randomness() {
        let delay = Duration::from_millis(100);

        let jittered1 = add_jitter(delay);
        let jittered2 = add_jitter(delay);

        // Jitter should produce values between delay and 2*delay
        assert!(jittered1 >= delay);
        assert!(jittered1 <= delay * 2);
        assert!(jittered2 >= delay);
        assert!(jittered2 <= delay * 2);
    }

    #[test]
    fn error_classification() {
        assert!(Error::unexpected("fetch page", 503, "").is_retryable());
        assert!(Error::Io(std::io::Error::other("disk hiccup")).is_retryable());
        assert!(!Error::Precondition("empty media".into()).is_retryable());
        assert!(!Error::Unreachable("unknown shape".into()).is_retryable());
        assert!(!Error::config("source.ids", "empty").is_retryable());
        assert!(!Error::Cancelled.is_retryable());
    }

    #[test]
    fn truncated_json_is_retryable_but_wrong_shape_is_not() {
        let eof = serde_json::from_str::<serde_json::Value>(r#"{"data": ["#).unwrap_err();
        assert!(Error::decode("feed page", eof).is_retryable());

        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct NeedsId {
            id: i64,
        }
        let shape = serde_json::from_str::<NeedsId>(r#"{"name": "x"}"#).unwrap_err();
        assert!(!Error::decode("tag response", shape).is_retryable());
    }
}
