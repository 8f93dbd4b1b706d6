//! Polling with exponential backoff.
//!
//! Used by callers of the non-blocking `try_lock_*` operations. The protocol
//! layer itself never sleeps or retries.

use crate::error::Result;
use std::thread;
use std::time::{Duration, Instant};

/// Timeout and sleep bounds for a polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub timeout: Duration,
    pub initial: Duration,
    pub max: Duration,
}

impl BackoffPolicy {
    pub fn new(timeout: Duration, initial: Duration, max: Duration) -> Self {
        Self {
            timeout,
            initial,
            max: max.max(initial),
        }
    }

    /// Start a polling loop; the timeout runs from now.
    pub fn start(&self) -> Backoff {
        Backoff {
            started: Instant::now(),
            timeout: self.timeout,
            next: self.initial,
            max: self.max,
        }
    }
}

/// A running polling loop.
#[derive(Debug)]
pub struct Backoff {
    started: Instant,
    timeout: Duration,
    next: Duration,
    max: Duration,
}

impl Backoff {
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Run `query` until it yields a value or the timeout expires.
    ///
    /// `query` runs at least once. Errors end the loop immediately.
    pub fn retry_until<T>(&mut self, mut query: impl FnMut() -> Result<Option<T>>) -> Result<Option<T>> {
        loop {
            if let Some(value) = query()? {
                return Ok(Some(value));
            }

            let elapsed = self.elapsed();
            if elapsed >= self.timeout {
                return Ok(None);
            }

            thread::sleep(self.next.min(self.timeout - elapsed));
            self.next = (self.next * 2).min(self.max);
        }
    }
}
