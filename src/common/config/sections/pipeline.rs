use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::common::config::validation::ConfigSection;
use crate::common::error::EtlResult;
use crate::common::retry::{BackoffStrategy, RetryPolicy};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub interval_seconds: u64,
    /// Write retries per batch
    pub max_retries: u32,
    /// Base retry delay in seconds
    pub retry_delay: u64,
    pub max_retry_delay: u64,
    pub backoff: BackoffStrategy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 300,
            max_retries: 3,
            retry_delay: 5,
            max_retry_delay: 60,
            backoff: BackoffStrategy::Exponential,
        }
    }
}

impl PipelineConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_secs(self.retry_delay),
            max_delay: Duration::from_secs(self.max_retry_delay.max(self.retry_delay)),
            strategy: self.backoff,
        }
    }
}

impl ConfigSection for PipelineConfig {
    const KEY: &'static str = "pipeline";

    fn validate(&self) -> EtlResult<()> {
        if self.interval_seconds == 0 {
            crate::etl_bail!(crate::etl_error!(
                invalid_config_value,
                "pipeline.interval_seconds",
                self.interval_seconds.to_string(),
            ));
        }

        Ok(())
    }
}
