// Error Conversions

use crate::common::error::EtlError;

impl From<std::io::Error> for EtlError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::TimedOut => EtlError::timeout("IO operation", 0),
            _ => EtlError::internal(error.to_string()),
        }
    }
}

impl From<serde_json::Error> for EtlError {
    fn from(error: serde_json::Error) -> Self {
        EtlError::data_serialization(error.to_string())
    }
}

impl From<config::ConfigError> for EtlError {
    fn from(error: config::ConfigError) -> Self {
        EtlError::configuration(error.to_string())
    }
}

/// Metrics backend transport errors
impl From<reqwest::Error> for EtlError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return EtlError::timeout("metrics backend request", 0);
        }

        if let Some(status) = error.status() {
            if status.is_client_error() {
                return EtlError::query_rejected(status.as_u16(), error.to_string());
            }
            return EtlError::backend_unavailable(format!("HTTP {status}: {error}"));
        }

        if error.is_decode() {
            return EtlError::malformed_response(error.to_string());
        }

        EtlError::backend_unavailable(error.to_string())
    }
}

/// Store client errors
impl From<influxdb2::RequestError> for EtlError {
    fn from(error: influxdb2::RequestError) -> Self {
        match error {
            influxdb2::RequestError::Http { status, text } => {
                let code = status.as_u16();
                match code {
                    401 | 403 => EtlError::authentication(format!("HTTP {code}: {text}")),
                    400..=499 => EtlError::store_rejected(code, text),
                    _ => EtlError::store_write(format!("HTTP {code}: {text}")),
                }
            }
            other => EtlError::store_connection(other.to_string()),
        }
    }
}
