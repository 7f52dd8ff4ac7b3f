// Error Handling Module
// "Every failure gets a name before it gets a retry"

mod classification;
mod conversions;
mod macros;


use thiserror::Error;

/// Error taxonomy for the health metrics pipeline
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EtlError {
    // Metrics backend errors
    #[error("Metrics backend unavailable: {message}")]
    BackendUnavailable { message: String },

    #[error("Metrics backend rejected query (HTTP {status}): {message}")]
    QueryRejected { status: u16, message: String },

    #[error("Malformed metrics response: {message}")]
    MalformedResponse { message: String },

    #[error("Invalid query parameters: {message}")]
    InvalidQuery { message: String },

    // Time-series store errors
    #[error("Store connection failed: {message}")]
    StoreConnection { message: String },

    #[error("Store write failed: {message}")]
    StoreWrite { message: String },

    #[error("Store rejected request (HTTP {status}): {message}")]
    StoreRejected { status: u16, message: String },

    // Data processing errors
    #[error("Data validation failed: {message}")]
    DataValidation { message: String },

    #[error("Data serialization failed: {message}")]
    DataSerialization { message: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidConfigValue { key: String, value: String },

    // System errors
    #[error("Timeout occurred: {operation} after {duration_ms}ms")]
    Timeout { operation: String, duration_ms: u64 },

    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("Pipeline is {state}, expected {expected}")]
    InvalidState { state: String, expected: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl EtlError {
    pub fn backend_unavailable<S: Into<String>>(message: S) -> Self {
        Self::BackendUnavailable {
            message: message.into(),
        }
    }

    pub fn query_rejected<S: Into<String>>(status: u16, message: S) -> Self {
        Self::QueryRejected {
            status,
            message: message.into(),
        }
    }

    pub fn malformed_response<S: Into<String>>(message: S) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    pub fn invalid_query<S: Into<String>>(message: S) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    /// Create a store connection error
    pub fn store_connection<S: Into<String>>(message: S) -> Self {
        Self::StoreConnection {
            message: message.into(),
        }
    }

    /// Create a store write error
    pub fn store_write<S: Into<String>>(message: S) -> Self {
        Self::StoreWrite {
            message: message.into(),
        }
    }

    pub fn store_rejected<S: Into<String>>(status: u16, message: S) -> Self {
        Self::StoreRejected {
            status,
            message: message.into(),
        }
    }

    pub fn data_validation<S: Into<String>>(message: S) -> Self {
        Self::DataValidation {
            message: message.into(),
        }
    }

    pub fn data_serialization<S: Into<String>>(message: S) -> Self {
        Self::DataSerialization {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_config_value<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
        Self::InvalidConfigValue {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(operation: S, duration_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration_ms,
        }
    }

    pub fn authentication<S: Into<String>>(message: S) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    pub fn invalid_state<S: Into<String>, E: Into<String>>(state: S, expected: E) -> Self {
        Self::InvalidState {
            state: state.into(),
            expected: expected.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Result type alias for convenience
pub type EtlResult<T> = Result<T, EtlError>;
