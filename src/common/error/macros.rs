// Error Macros

/// Build an [`EtlError`](crate::common::error::EtlError) through its constructor helper
#[macro_export]
macro_rules! etl_error {
    ($variant:ident $(, $arg:expr)* $(,)?) => {
        $crate::common::error::EtlError::$variant($($arg),*)
    };
}

/// Log an error at its own severity and return it
#[macro_export]
macro_rules! etl_bail {
    ($error:expr) => {
        {
            let error = $error;
            match error.severity() {
                tracing::Level::ERROR => tracing::error!(error = %error, "Operation failed"),
                tracing::Level::WARN => tracing::warn!(error = %error, "Operation failed"),
                tracing::Level::INFO => tracing::info!(error = %error, "Operation failed"),
                _ => tracing::debug!(error = %error, "Operation failed"),
            }
            return Err(error);
        }
    };
}

/// Log an error with its classification fields attached
#[macro_export]
macro_rules! log_error {
    ($error:expr, $($field:tt)*) => {
        {
            let error = &$error;
            match error.severity() {
                tracing::Level::ERROR => tracing::error!(
                    error = %error,
                    category = error.category(),
                    retryable = error.is_retryable(),
                    $($field)*
                ),
                tracing::Level::WARN => tracing::warn!(
                    error = %error,
                    category = error.category(),
                    retryable = error.is_retryable(),
                    $($field)*
                ),
                _ => tracing::debug!(
                    error = %error,
                    category = error.category(),
                    retryable = error.is_retryable(),
                    $($field)*
                ),
            }
        }
    };
}
