// Bounded retry with pluggable sleeping

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::common::error::EtlResult;

/// How the delay grows between consecutive retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    Fixed,
    #[default]
    Exponential,
}

/// Suspension point used between retries and between pipeline cycles.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts = max_retries + 1
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            strategy: BackoffStrategy::Exponential,
        }
    }
}

/// Final result of a retried operation and how many attempts it took
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: EtlResult<T>,
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay: delay,
            max_delay: delay,
            strategy: BackoffStrategy::Fixed,
        }
    }

    pub fn exponential(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            strategy: BackoffStrategy::Exponential,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay to wait before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        match self.strategy {
            BackoffStrategy::Fixed => self.base_delay,
            BackoffStrategy::Exponential => {
                let factor = 2u32.saturating_pow(retry.saturating_sub(1));
                self.base_delay.saturating_mul(factor).min(self.max_delay)
            }
        }
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or the retry budget is spent. The closure receives the 1-based attempt.
    pub async fn run<T, F, Fut>(
        &self,
        label: &str,
        sleeper: &dyn Sleeper,
        mut operation: F,
    ) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = EtlResult<T>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match operation(attempt).await {
                Ok(value) => {
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt,
                    }
                }
                Err(error) => error,
            };

            if !error.is_retryable() {
                warn!(
                    operation = label,
                    attempt,
                    error = %error,
                    "✗ Non-retryable failure, giving up"
                );
                return RetryOutcome {
                    result: Err(error),
                    attempts: attempt,
                };
            }

            if attempt > self.max_retries {
                warn!(
                    operation = label,
                    attempts = attempt,
                    error = %error,
                    "✗ Retry budget exhausted"
                );
                return RetryOutcome {
                    result: Err(error),
                    attempts: attempt,
                };
            }

            let delay = self.delay_for(attempt);
            warn!(
                "⟲ {label} attempt {attempt}/{} failed: {error}. Retrying in {delay:?}...",
                self.max_attempts()
            );
            sleeper.sleep(delay).await;
        }
    }
}
