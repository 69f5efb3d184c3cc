//! Explicit retry with exponential backoff for backend calls.

use crate::error::BackendError;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::{trace, warn};

/// Default number of retries after the first failed call.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
/// Default base delay between calls.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(300);

/// How many times a failing call is retried and how long to wait in between.
/// The delay before retry `k` (1-indexed) is `base_delay * 2^k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait before retry number `retry`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        2u32.checked_pow(retry)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }
}

/// Something that can wait. Sleeping goes through this so tests can record
/// delays instead of spending them.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, delay: Duration);
}

/// Pacer backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// The last error of a call that never succeeded, with the number of calls made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure {
    pub attempts: u32,
    pub error: BackendError,
}

/// Run `op` until it succeeds, fails permanently, or the retry budget is spent.
/// Only transient errors are retried.
pub async fn run<T, F, Fut>(
    policy: &RetryPolicy,
    pacer: &dyn Pacer,
    mut op: F,
) -> Result<T, RetryFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    let mut retry = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_transient() && retry < policy.max_attempts => {
                retry += 1;
                let delay = policy.delay_for(retry);
                warn!(
                    "backend call failed ({error}), retry {retry}/{} in {} ms",
                    policy.max_attempts,
                    delay.as_millis()
                );
                pacer.pause(delay).await;
            }
            Err(error) => {
                trace!("giving up after {} attempt(s)", retry + 1);
                return Err(RetryFailure {
                    attempts: retry + 1,
                    error,
                });
            }
        }
    }
}
