// Error Classification and Analysis

use crate::common::error::EtlError;

impl EtlError {
    /// Get error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::BackendUnavailable { .. }
            | Self::QueryRejected { .. }
            | Self::MalformedResponse { .. }
            | Self::InvalidQuery { .. } => "extract",
            Self::StoreConnection { .. }
            | Self::StoreWrite { .. }
            | Self::StoreRejected { .. } => "load",
            Self::DataValidation { .. } | Self::DataSerialization { .. } => "data",
            Self::Configuration { .. } | Self::InvalidConfigValue { .. } => "configuration",
            Self::Timeout { .. } => "system",
            Self::Authentication { .. } => "security",
            Self::InvalidState { .. } | Self::Internal { .. } => "general",
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            // Transient I/O
            Self::BackendUnavailable { .. }
            | Self::MalformedResponse { .. }
            | Self::StoreConnection { .. }
            | Self::StoreWrite { .. }
            | Self::Timeout { .. } => true,

            // The store throttles writes with 429; a rejected query never changes on retry
            Self::StoreRejected { status, .. } => *status == 429,

            Self::QueryRejected { .. }
            | Self::InvalidQuery { .. }
            | Self::DataValidation { .. }
            | Self::DataSerialization { .. }
            | Self::Configuration { .. }
            | Self::InvalidConfigValue { .. }
            | Self::Authentication { .. }
            | Self::InvalidState { .. }
            | Self::Internal { .. } => false,
        }
    }

    /// Get severity level for logging
    pub fn severity(&self) -> tracing::Level {
        match self {
            Self::StoreConnection { .. }
            | Self::Authentication { .. }
            | Self::Configuration { .. }
            | Self::InvalidConfigValue { .. }
            | Self::Internal { .. } => tracing::Level::ERROR,

            Self::BackendUnavailable { .. }
            | Self::QueryRejected { .. }
            | Self::MalformedResponse { .. }
            | Self::StoreWrite { .. }
            | Self::StoreRejected { .. }
            | Self::Timeout { .. }
            | Self::InvalidState { .. } => tracing::Level::WARN,

            Self::InvalidQuery { .. }
            | Self::DataValidation { .. }
            | Self::DataSerialization { .. } => tracing::Level::DEBUG,
        }
    }
}
