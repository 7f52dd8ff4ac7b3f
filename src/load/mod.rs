// Time-Series Loader
// "Written once, batch by batch"

pub mod datapoints;
pub mod writer;

pub use datapoints::{record_to_datapoint, records_to_datapoints};
pub use writer::{BucketInfo, InfluxConnector, InfluxWriter, PointWriter, StoreConnector};

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::common::config::LoadConfig;
use crate::common::error::EtlResult;
use crate::common::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::model::CanonicalRecord;

/// What happened to one `load` call
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    pub records: usize,
    pub batches_total: usize,
    pub batches_written: usize,
    pub records_written: usize,
    /// Records that could not be converted to data points
    pub records_skipped: usize,
    /// Batches never attempted because an earlier batch failed
    pub batches_skipped: usize,
    pub write_attempts: u32,
    pub error: Option<String>,
}

impl LoadReport {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

/// Batches canonical records into the store.
///
/// The connection is opened lazily on the first write or probe and kept
/// until [`Loader::close`], or until a batch exhausts its retries.
pub struct Loader {
    config: LoadConfig,
    retry: RetryPolicy,
    connector: Arc<dyn StoreConnector>,
    sleeper: Arc<dyn Sleeper>,
    writer: Option<Box<dyn PointWriter>>,
}

impl Loader {
    /// InfluxDB-backed loader; `retry` governs per-batch write retries
    pub fn new(config: LoadConfig, retry: RetryPolicy) -> Self {
        let connector = Arc::new(InfluxConnector::new(config.clone()));
        Self::with_connector(config, retry, connector, Arc::new(TokioSleeper))
    }

    pub fn with_connector(
        config: LoadConfig,
        retry: RetryPolicy,
        connector: Arc<dyn StoreConnector>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            config,
            retry,
            connector,
            sleeper,
            writer: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.writer.is_some()
    }

    pub fn batch_size(&self) -> usize {
        self.config.batch_size.max(1)
    }

    /// Store health probe and bucket check; never errors
    pub async fn test_connection(&mut self) -> bool {
        let result = match self.connect().await {
            Ok(writer) => writer.ping().await,
            Err(e) => Err(e),
        };

        match result {
            Ok(bucket) => {
                info!(
                    "✓ Store reachable at {} (bucket {bucket})",
                    self.connector.describe()
                );
                true
            }
            Err(e) => {
                error!(
                    category = e.category(),
                    "✗ Store connection test failed for {}: {e}",
                    self.connector.describe()
                );
                self.release();
                false
            }
        }
    }

    /// Look up the target bucket's metadata; `None` when it is missing or
    /// the store cannot be reached
    pub async fn bucket_info(&mut self) -> Option<BucketInfo> {
        let result = match self.connect().await {
            Ok(writer) => writer.bucket_info().await,
            Err(e) => Err(e),
        };

        match result {
            Ok(Some(bucket)) => {
                debug!("Bucket info: {bucket}");
                Some(bucket)
            }
            Ok(None) => {
                warn!("⚠ Bucket '{}' not found", self.config.bucket);
                None
            }
            Err(e) => {
                warn!(category = e.category(), "⚠ Bucket lookup failed: {e}");
                None
            }
        }
    }

    pub async fn load_data(&mut self, records: &[CanonicalRecord]) -> bool {
        self.load(records).await.success()
    }

    pub async fn load(&mut self, records: &[CanonicalRecord]) -> LoadReport {
        let batch_size = self.batch_size();
        let mut report = LoadReport {
            records: records.len(),
            batches_total: records.len().div_ceil(batch_size),
            ..LoadReport::default()
        };

        if records.is_empty() {
            debug!("No records to load");
            return report;
        }

        info!(
            "⚬ Loading {} records in {} batch(es) of up to {}",
            records.len(),
            report.batches_total,
            batch_size
        );

        if let Err(e) = self.connect().await {
            error!("✗ Cannot open store connection: {e}");
            report.error = Some(e.to_string());
            report.batches_skipped = report.batches_total;
            return report;
        }

        for (index, batch) in records.chunks(batch_size).enumerate() {
            let (points, skipped) = records_to_datapoints(batch);
            report.records_skipped += skipped;

            if points.is_empty() {
                report.batches_written += 1;
                continue;
            }

            let Some(writer) = self.writer.as_deref() else {
                break;
            };

            let count = points.len();
            let label = format!("batch {}/{}", index + 1, report.batches_total);
            let points = &points;

            let outcome = self
                .retry
                .run(&label, self.sleeper.as_ref(), move |_| {
                    writer.write(points.clone())
                })
                .await;
            report.write_attempts += outcome.attempts;

            match outcome.result {
                Ok(()) => {
                    report.batches_written += 1;
                    report.records_written += count;
                    debug!("✓ {label}: {count} points written");
                }
                Err(e) => {
                    let remaining = report.batches_total - index - 1;
                    error!(
                        category = e.category(),
                        attempts = outcome.attempts,
                        "✗ {label} failed, skipping {remaining} remaining batch(es): {e}"
                    );
                    report.error = Some(format!("{label}: {e}"));
                    report.batches_skipped = remaining;
                    self.release();
                    break;
                }
            }
        }

        if report.success() {
            info!(
                "✓ Loaded {} records ({} batches, {} attempts)",
                report.records_written, report.batches_written, report.write_attempts
            );
        } else {
            warn!(
                "⚠ Load incomplete: {}/{} records written before failure",
                report.records_written, report.records
            );
        }

        report
    }

    /// Release the store connection; safe to call repeatedly
    pub fn close(&mut self) {
        if self.writer.take().is_some() {
            info!("⚬ Store connection closed");
        } else {
            debug!("Store connection already closed");
        }
    }

    async fn connect(&mut self) -> EtlResult<&dyn PointWriter> {
        if self.writer.is_none() {
            let connector = Arc::clone(&self.connector);
            let outcome = self
                .retry
                .run("store connect", self.sleeper.as_ref(), |_| {
                    let connector = Arc::clone(&connector);
                    async move { connector.connect().await }
                })
                .await;
            let writer = outcome.result?;
            info!("⟐ Connected to store at {}", self.connector.describe());
            self.writer = Some(writer);
        }

        match self.writer.as_deref() {
            Some(writer) => Ok(writer),
            None => Err(crate::etl_error!(internal, "store writer missing after connect")),
        }
    }

    fn release(&mut self) {
        if self.writer.take().is_some() {
            debug!("Released store connection");
        }
    }
}

impl Drop for Loader {
    fn drop(&mut self) {
        if self.writer.is_some() {
            debug!("Loader dropped with an open store connection, releasing");
        }
    }
}
