use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::common::config::validation::{require_http_url, require_non_empty, ConfigSection};
use crate::common::error::EtlResult;

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
    /// Per-request timeout in seconds
    pub timeout: u64,
    pub batch_size: usize,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            org: "monitoring".to_string(),
            bucket: "health_metrics".to_string(),
            timeout: 30,
            batch_size: 1000,
        }
    }
}

// Token stays out of logs
impl fmt::Debug for LoadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadConfig")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .field("org", &self.org)
            .field("bucket", &self.bucket)
            .field("timeout", &self.timeout)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl LoadConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl ConfigSection for LoadConfig {
    const KEY: &'static str = "load";

    fn validate(&self) -> EtlResult<()> {
        require_http_url("load.url", &self.url)?;
        require_non_empty("load.token", &self.token)?;
        require_non_empty("load.org", &self.org)?;
        require_non_empty("load.bucket", &self.bucket)?;

        if self.timeout == 0 {
            crate::etl_bail!(crate::etl_error!(
                invalid_config_value,
                "load.timeout",
                self.timeout.to_string(),
            ));
        }

        if self.batch_size == 0 {
            crate::etl_bail!(crate::etl_error!(
                invalid_config_value,
                "load.batch_size",
                self.batch_size.to_string(),
            ));
        }

        Ok(())
    }
}
