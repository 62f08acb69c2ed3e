//! Bounded retry with a fixed delay between attempts
//!
//! The attempt budget is a value owned by the caller; nothing is shared between
//! invocations.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::no_retry()
    }
}

/// Result of a retried operation together with the attempts it took
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

impl<T, E> RetryOutcome<T, E> {
    pub fn into_result(self) -> Result<T, E> {
        self.result
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

impl RetryPolicy {
    /// `max_attempts` of 0 is treated as 1
    pub fn new(max_attempts: u32, delay: Option<Duration>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn no_retry() -> Self {
        Self::new(1, None)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Option<Duration> {
        self.delay
    }

    /// Run `operation` until it succeeds or the attempts are used up.
    ///
    /// The closure receives the 1-based attempt number.
    pub fn run<T, E, F>(&self, operation: F) -> RetryOutcome<T, E>
    where
        F: FnMut(u32) -> Result<T, E>,
        E: Display,
    {
        self.run_when(operation, |_| true)
    }

    /// Like [`run`](Self::run), but gives up early on errors `retryable` rejects
    pub fn run_when<T, E, F, P>(&self, mut operation: F, retryable: P) -> RetryOutcome<T, E>
    where
        F: FnMut(u32) -> Result<T, E>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt) {
                Ok(value) => {
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt,
                    }
                }
                Err(e) if attempt < self.max_attempts && retryable(&e) => {
                    warn!("Attempt {}/{} failed: {}", attempt, self.max_attempts, e);
                    if let Some(delay) = self.delay {
                        debug!("Retrying in {:?}", delay);
                        std::thread::sleep(delay);
                    }
                    attempt += 1;
                }
                Err(e) => {
                    return RetryOutcome {
                        result: Err(e),
                        attempts: attempt,
                    }
                }
            }
        }
    }

    /// Async variant of [`run_when`](Self::run_when), sleeping on the tokio timer
    pub async fn run_async_when<T, E, F, Fut, P>(
        &self,
        mut operation: F,
        retryable: P,
    ) -> RetryOutcome<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => {
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt,
                    }
                }
                Err(e) if attempt < self.max_attempts && retryable(&e) => {
                    warn!("Attempt {}/{} failed: {}", attempt, self.max_attempts, e);
                    if let Some(delay) = self.delay {
                        debug!("Retrying in {:?}", delay);
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(e) => {
                    return RetryOutcome {
                        result: Err(e),
                        attempts: attempt,
                    }
                }
            }
        }
    }
}
