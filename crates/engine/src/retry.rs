//! Bounded retry with a fixed pause
//!
//! Catalog indexes converge asynchronously, so a write issued right after
//! another may be refused for a short while. `RetryPolicy` repeats such a
//! write a fixed number of times, sleeping on an injected [`Clock`] between
//! attempts so tests never wait on real time.

use metavault_core::Clock;
use std::time::Duration;
use tracing::trace;

/// Errors that may clear up if the operation is repeated
pub trait Retryable {
    /// True if another attempt may succeed
    fn is_retryable(&self) -> bool;
}

/// How often and how patiently to repeat a refused operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (at least 1 is always made)
    pub max_attempts: usize,
    /// Pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            delay: Duration::from_millis(350),
        }
    }
}

impl RetryPolicy {
    /// Policy with the given attempts and pause
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// A single attempt
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Set total attempts
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the pause between attempts
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts run out
    ///
    /// `op` receives the 1-based attempt number. The last error is returned
    /// when every attempt failed.
    pub fn run<T, E, F>(&self, clock: &dyn Clock, mut op: F) -> Result<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut(usize) -> Result<T, E>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    trace!(
                        target: "metavault::revert",
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    clock.sleep(self.delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
