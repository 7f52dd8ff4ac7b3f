use serde::Serialize;

use crate::common::config::loader::ConfigLoader;
use crate::common::config::sections::{
    ExtractConfig, LoadConfig, MonitoringConfig, PipelineConfig, TransformConfig,
};
use crate::common::config::validation::ConfigSection;
use crate::common::error::EtlResult;
use crate::common::logging::LoggingConfig;

/// Complete, validated configuration for one run of the pipeline
#[derive(Debug, Clone, Serialize, Default)]
pub struct RuntimeConfig {
    pub extract: ExtractConfig,
    pub transform: TransformConfig,
    pub load: LoadConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
    pub monitoring: MonitoringConfig,
}

impl RuntimeConfig {
    pub fn load() -> EtlResult<Self> {
        Self::load_with_loader(&ConfigLoader::new())
    }

    pub fn load_with_loader(loader: &ConfigLoader) -> EtlResult<Self> {
        let raw = loader.build()?;

        let config = RuntimeConfig {
            extract: ConfigLoader::section_from_raw::<ExtractConfig>(&raw)?,
            transform: ConfigLoader::section_from_raw::<TransformConfig>(&raw)?,
            load: ConfigLoader::section_from_raw::<LoadConfig>(&raw)?,
            pipeline: ConfigLoader::section_from_raw::<PipelineConfig>(&raw)?,
            logging: ConfigLoader::section_from_raw::<LoggingConfig>(&raw)?,
            monitoring: ConfigLoader::section_from_raw::<MonitoringConfig>(&raw)?,
        };

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> EtlResult<()> {
        self.extract.validate()?;
        self.transform.validate()?;
        self.load.validate()?;
        self.pipeline.validate()?;
        self.logging.validate()?;
        self.monitoring.validate()?;
        Ok(())
    }
}
