use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::common::config::validation::ConfigSection;
use crate::common::error::EtlResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enable_metrics: bool,
    pub metrics_port: u16,
    pub health_check_interval: u64,
    /// Number of recent cycles used for the success rate
    pub health_window: usize,
    pub degraded_success_rate: f64,
    pub unhealthy_success_rate: f64,
    /// Staleness thresholds; default to 3x and 6x the pipeline interval
    pub degraded_after_seconds: Option<u64>,
    pub unhealthy_after_seconds: Option<u64>,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: true,
            metrics_port: 9102,
            health_check_interval: 60,
            health_window: 10,
            degraded_success_rate: 0.8,
            unhealthy_success_rate: 0.5,
            degraded_after_seconds: None,
            unhealthy_after_seconds: None,
        }
    }
}

impl MonitoringConfig {
    pub fn degraded_after(&self, interval: Duration) -> Duration {
        self.degraded_after_seconds
            .map(Duration::from_secs)
            .unwrap_or_else(|| interval.saturating_mul(3))
    }

    pub fn unhealthy_after(&self, interval: Duration) -> Duration {
        self.unhealthy_after_seconds
            .map(Duration::from_secs)
            .unwrap_or_else(|| interval.saturating_mul(6))
    }

    pub fn health_check_period(&self) -> Duration {
        Duration::from_secs(self.health_check_interval.max(1))
    }
}

impl ConfigSection for MonitoringConfig {
    const KEY: &'static str = "monitoring";

    fn validate(&self) -> EtlResult<()> {
        if self.enable_metrics && self.metrics_port == 0 {
            crate::etl_bail!(crate::etl_error!(
                invalid_config_value,
                "monitoring.metrics_port",
                self.metrics_port.to_string(),
            ));
        }

        if self.health_window == 0 {
            crate::etl_bail!(crate::etl_error!(
                invalid_config_value,
                "monitoring.health_window",
                self.health_window.to_string(),
            ));
        }

        let rates_valid = (0.0..=1.0).contains(&self.degraded_success_rate)
            && (0.0..=1.0).contains(&self.unhealthy_success_rate)
            && self.unhealthy_success_rate <= self.degraded_success_rate;
        if !rates_valid {
            crate::etl_bail!(crate::etl_error!(
                invalid_config_value,
                "monitoring.degraded_success_rate",
                format!(
                    "{} (unhealthy {})",
                    self.degraded_success_rate, self.unhealthy_success_rate
                ),
            ));
        }

        if let (Some(degraded), Some(unhealthy)) =
            (self.degraded_after_seconds, self.unhealthy_after_seconds)
        {
            if degraded > unhealthy {
                crate::etl_bail!(crate::etl_error!(
                    invalid_config_value,
                    "monitoring.degraded_after_seconds",
                    format!("{degraded} > unhealthy_after_seconds {unhealthy}"),
                ));
            }
        }

        Ok(())
    }
}
