mod extract;
mod load;
mod monitoring;
mod pipeline;
mod transform;

pub use extract::{
    default_queries, AggregationPolicy, ExtractConfig, NamedQuery, MAX_LOOKBACK_MINUTES,
};
pub use load::LoadConfig;
pub use monitoring::MonitoringConfig;
pub use pipeline::PipelineConfig;
pub use transform::{
    default_valid_metrics, DataCleaningConfig, TransformConfig, ValueRange, DEFAULT_MEASUREMENT,
    MAX_FUTURE_SKEW_SECONDS,
};
