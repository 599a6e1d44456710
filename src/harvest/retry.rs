/// Bounded retry with exponential backoff and an injectable delay.
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::fetch::TransportError;

/// Something that can pause the current thread.
///
/// Implemented for any `FnMut(Duration)`, so tests pass `|_| {}` and the
/// binary passes [`blocking_sleep`].
pub trait Delay {
    fn wait(&mut self, duration: Duration);
}

impl<F: FnMut(Duration)> Delay for F {
    fn wait(&mut self, duration: Duration) {
        self(duration)
    }
}

/// Real delay: blocks the thread.
pub fn blocking_sleep(duration: Duration) {
    if !duration.is_zero() {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per request, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Wait before retrying after the `failures`-th failure (1-based):
    /// `base * 2^(failures - 1)`.
    pub fn backoff(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Whether a request that has now failed `failures` times with `err`
    /// gets another attempt. Shared by [`with_retry`] and the harvest loop.
    pub fn should_retry(&self, err: &TransportError, failures: u32) -> bool {
        err.is_transient() && failures < self.max_attempts.max(1)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetryError {
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: TransportError },

    #[error(transparent)]
    Rejected(TransportError),
}

impl RetryError {
    pub fn into_transport(self) -> TransportError {
        match self {
            Self::Exhausted { last, .. } => last,
            Self::Rejected(err) => err,
        }
    }
}

/// Run `op` until it succeeds, fails permanently, or runs out of attempts.
///
/// Only [`TransportError::is_transient`] failures are retried; the delay
/// between attempts follows [`RetryPolicy::backoff`].
pub fn with_retry<T, D: Delay>(
    policy: &RetryPolicy,
    delay: &mut D,
    label: &str,
    mut op: impl FnMut() -> Result<T, TransportError>,
) -> Result<T, RetryError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut failures = 0;

    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_transient() => return Err(RetryError::Rejected(err)),
            Err(err) => {
                failures += 1;
                if !policy.should_retry(&err, failures) {
                    return Err(RetryError::Exhausted {
                        attempts: failures,
                        last: err,
                    });
                }
                let wait = policy.backoff(failures);
                warn!("{label}: retry {failures}/{max_attempts} in {wait:?} ({err})");
                delay.wait(wait);
            }
        }
    }
}
