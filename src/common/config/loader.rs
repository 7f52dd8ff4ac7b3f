use std::path::{Path, PathBuf};

use config::{Config as RawConfig, Environment, File, FileFormat};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::common::config::validation::ConfigSection;
use crate::common::error::{EtlError, EtlResult};

pub const DEFAULT_CONFIG_PATH: &str = "config/etl.toml";
pub const ENV_PREFIX: &str = "HEALTH_ETL";

#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    explicit_file: Option<PathBuf>,
    use_environment: bool,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            explicit_file: None,
            use_environment: true,
        }
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit_file = Some(path.into());
        self
    }

    /// Ignore `HEALTH_ETL_*` environment overrides
    pub fn without_environment(mut self) -> Self {
        self.use_environment = false;
        self
    }

    pub fn config_path(&self) -> PathBuf {
        self.explicit_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn load_section<T>(&self) -> EtlResult<T>
    where
        T: ConfigSection + DeserializeOwned,
    {
        let raw = self.build()?;
        Self::section_from_raw(&raw)
    }

    pub fn load_section_from_path<T>(path: impl AsRef<Path>) -> EtlResult<T>
    where
        T: ConfigSection + DeserializeOwned,
    {
        ConfigLoader::new()
            .with_file(path.as_ref().to_path_buf())
            .load_section::<T>()
    }

    pub(crate) fn section_from_raw<T>(raw: &RawConfig) -> EtlResult<T>
    where
        T: ConfigSection + DeserializeOwned,
    {
        let section = match raw.get::<T>(T::KEY) {
            Ok(section) => section,
            Err(config::ConfigError::NotFound(_)) => T::default(),
            Err(e) => {
                return Err(EtlError::configuration(format!(
                    "Failed to load '{}' configuration section: {e}",
                    T::KEY
                )))
            }
        };

        section.validate()?;
        Ok(section)
    }

    pub fn build(&self) -> EtlResult<RawConfig> {
        let mut builder = RawConfig::builder();
        let path = self.config_path();

        if path.exists() {
            let path_str = path.to_string_lossy().into_owned();
            let file_source = File::new(&path_str, format_for_path(&path)).required(true);
            builder = builder.add_source(file_source);
        } else if self.explicit_file.is_some() {
            return Err(EtlError::configuration(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        } else {
            warn!(
                "Configuration file not found at {} - falling back to defaults and environment variables",
                path.display()
            );
        }

        if self.use_environment {
            builder = builder.add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        builder.build().map_err(|e| {
            EtlError::configuration(format!("Failed to build configuration sources: {e}"))
        })
    }
}

fn format_for_path(path: &Path) -> FileFormat {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        Some("json") => FileFormat::Json,
        _ => FileFormat::Toml,
    }
}
