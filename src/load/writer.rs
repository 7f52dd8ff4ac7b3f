// Store Connection Seams
// "The vault door opens only for those who knock correctly"

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream;
use influxdb2::api::buckets::ListBucketsRequest;
use influxdb2::models::{Bucket, DataPoint};
use influxdb2::Client;
use serde::Serialize;
use tracing::debug;

use crate::common::config::LoadConfig;
use crate::common::error::{EtlError, EtlResult};

/// Metadata of the target bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketInfo {
    pub name: String,
    pub id: Option<String>,
    pub org_id: Option<String>,
    /// Retention period of each rule in seconds; 0 keeps data forever
    pub retention_seconds: Vec<i64>,
}

impl BucketInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            org_id: None,
            retention_seconds: Vec::new(),
        }
    }

    /// Shortest non-zero retention; `None` means data never expires
    pub fn retention(&self) -> Option<Duration> {
        self.retention_seconds
            .iter()
            .filter(|seconds| **seconds > 0)
            .min()
            .map(|seconds| Duration::from_secs(*seconds as u64))
    }
}

impl From<Bucket> for BucketInfo {
    fn from(bucket: Bucket) -> Self {
        Self {
            name: bucket.name,
            id: bucket.id,
            org_id: bucket.org_id,
            retention_seconds: bucket
                .retention_rules
                .iter()
                .map(|rule| i64::from(rule.every_seconds))
                .collect(),
        }
    }
}

impl fmt::Display for BucketInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(id) = &self.id {
            write!(f, " [{id}]")?;
        }
        match self.retention() {
            Some(retention) => write!(f, ", retention {}s", retention.as_secs()),
            None => write!(f, ", infinite retention"),
        }
    }
}

/// An open connection to the time-series store
#[async_trait]
pub trait PointWriter: Send + Sync {
    /// Health probe plus a lookup of the target bucket, which must exist
    async fn ping(&self) -> EtlResult<BucketInfo>;

    /// Target bucket metadata, `None` when the bucket does not exist
    async fn bucket_info(&self) -> EtlResult<Option<BucketInfo>>;

    async fn write(&self, points: Vec<DataPoint>) -> EtlResult<()>;
}

/// Opens connections to the time-series store
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self) -> EtlResult<Box<dyn PointWriter>>;

    fn describe(&self) -> String;
}

/// InfluxDB v2 connector
#[derive(Debug, Clone)]
pub struct InfluxConnector {
    config: LoadConfig,
}

impl InfluxConnector {
    pub fn new(config: LoadConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl StoreConnector for InfluxConnector {
    async fn connect(&self) -> EtlResult<Box<dyn PointWriter>> {
        debug!("⟐ Creating InfluxDB client for {}", self.config.url);
        let client = Client::new(&self.config.url, &self.config.org, &self.config.token);

        Ok(Box::new(InfluxWriter {
            client,
            org: self.config.org.clone(),
            bucket: self.config.bucket.clone(),
            timeout: self.config.request_timeout(),
        }))
    }

    fn describe(&self) -> String {
        format!(
            "{} (org: {}, bucket: {})",
            self.config.url, self.config.org, self.config.bucket
        )
    }
}

pub struct InfluxWriter {
    client: Client,
    org: String,
    bucket: String,
    timeout: Duration,
}

impl InfluxWriter {
    fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }
}

#[async_trait]
impl PointWriter for InfluxWriter {
    async fn ping(&self) -> EtlResult<BucketInfo> {
        tokio::time::timeout(self.timeout, self.client.health())
            .await
            .map_err(|_| EtlError::timeout("influx health", self.timeout_ms()))?
            .map_err(|e| EtlError::store_connection(format!("Health check failed: {e}")))?;

        self.bucket_info().await?.ok_or_else(|| {
            EtlError::configuration(format!(
                "Bucket '{}' not found in org '{}'",
                self.bucket, self.org
            ))
        })
    }

    async fn bucket_info(&self) -> EtlResult<Option<BucketInfo>> {
        let request = ListBucketsRequest {
            name: Some(self.bucket.clone()),
            org: Some(self.org.clone()),
            limit: Some(1),
            ..Default::default()
        };

        let response = tokio::time::timeout(self.timeout, self.client.list_buckets(Some(request)))
            .await
            .map_err(|_| EtlError::timeout("influx list_buckets", self.timeout_ms()))?;

        match response {
            Ok(response) => Ok(response
                .buckets
                .into_iter()
                .find(|bucket| bucket.name == self.bucket)
                .map(BucketInfo::from)),
            Err(influxdb2::RequestError::Http { status, .. }) if status.as_u16() == 404 => Ok(None),
            Err(e) => Err(EtlError::from(e)),
        }
    }

    async fn write(&self, points: Vec<DataPoint>) -> EtlResult<()> {
        let count = points.len();
        tokio::time::timeout(
            self.timeout,
            self.client.write(&self.bucket, stream::iter(points)),
        )
        .await
        .map_err(|_| EtlError::timeout("influx write", self.timeout_ms()))??;

        debug!("✓ Wrote {count} points to bucket {}", self.bucket);
        Ok(())
    }
}
