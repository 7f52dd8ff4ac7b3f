// Monitoring Module
// "Someone has to watch the watcher"

pub mod metrics;
pub mod server;

pub use metrics::PipelineMetrics;
pub use server::{LivenessResponse, MonitoringService, MonitoringState};
