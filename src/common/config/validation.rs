use serde::de::DeserializeOwned;

use crate::common::error::EtlResult;

/// Trait implemented by individual configuration sections.
///
/// Each section is responsible for providing validation logic and a key that
/// matches the section name in the configuration file.
pub trait ConfigSection: DeserializeOwned + Default + Send + Sync {
    /// Top-level key for the section inside the configuration file.
    const KEY: &'static str;

    /// Validate semantic correctness of the section.
    fn validate(&self) -> EtlResult<()>;
}

/// Reject an empty string value for a required key
pub(crate) fn require_non_empty(key: &str, value: &str) -> EtlResult<()> {
    if value.trim().is_empty() {
        crate::etl_bail!(crate::etl_error!(
            invalid_config_value,
            key,
            "<empty>".to_string(),
        ));
    }
    Ok(())
}

/// Reject anything that is not an absolute http(s) URL
pub(crate) fn require_http_url(key: &str, value: &str) -> EtlResult<()> {
    require_non_empty(key, value)?;

    match url::Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => {
            crate::etl_bail!(crate::etl_error!(
                invalid_config_value,
                key,
                value.to_string(),
            ));
        }
    }
}
