// health-etl - Core Library
// "Metrics go in dirty, records come out clean"

pub mod app;
pub mod common;
pub mod extract;
pub mod load;
pub mod model;
pub mod monitoring;
pub mod pipeline;
pub mod transform;

// Re-export commonly used types
pub use common::config::RuntimeConfig;
pub use common::error::{EtlError, EtlResult};
pub use common::logging::LoggingConfig;
pub use extract::MetricsExtractor;
pub use load::{LoadReport, Loader};
pub use model::{CanonicalRecord, ExtractionResult, RawSample};
pub use pipeline::{EtlPipeline, HealthReport, HealthStatus, PipelineState, StopHandle};
pub use transform::{TransformOutput, TransformReport, Transformer};
