//! Retry with doubling backoff.
//!
//! A [`RetryPolicy`] runs a zero-argument operation up to `max_attempts`
//! times, sleeping between failures and doubling the delay each time. The
//! error of the last attempt is returned unchanged. Sleeping goes through a
//! [`Sleeper`] so callers (and tests) control how time passes.

use std::fmt::Display;
use std::time::Duration;

use tracing::warn;

use crate::error::{Result, WoError};

/// Blocks the current thread for a duration.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Real sleeper backed by [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
}

impl RetryPolicy {
    /// Build a policy. Zero attempts is a configuration error.
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Result<Self> {
        if max_attempts == 0 {
            return Err(WoError::Config(
                "retry max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            max_attempts,
            initial_delay,
        })
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub const fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Retry on every failure.
    pub fn run<T, E, F>(&self, sleeper: &dyn Sleeper, operation: F) -> std::result::Result<T, E>
    where
        F: FnMut() -> std::result::Result<T, E>,
        E: Display,
    {
        self.run_when(sleeper, operation, |_| true)
    }

    /// Retry only failures accepted by `should_retry`; anything else is
    /// returned immediately.
    pub fn run_when<T, E, F, P>(
        &self,
        sleeper: &dyn Sleeper,
        mut operation: F,
        should_retry: P,
    ) -> std::result::Result<T, E>
    where
        F: FnMut() -> std::result::Result<T, E>,
        E: Display,
        P: Fn(&E) -> bool,
    {
        let mut delay = self.initial_delay;
        let mut attempt = 1;
        loop {
            match operation() {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_attempts && should_retry(&err) => {
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "attempt failed, retrying"
                    );
                    sleeper.sleep(delay);
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Retry only [`WoError::is_transient`] failures.
    pub fn run_transient<T, F>(&self, sleeper: &dyn Sleeper, operation: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        self.run_when(sleeper, operation, WoError::is_transient)
    }
}
