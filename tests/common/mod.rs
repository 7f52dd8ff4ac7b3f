use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures_util::FutureExt;
use health_etl::common::clock::Clock;
use health_etl::common::config::{ExtractConfig, LoadConfig, RuntimeConfig};
use health_etl::common::error::{EtlError, EtlResult};
use health_etl::common::retry::{BackoffStrategy, Sleeper};
use health_etl::load::{BucketInfo, PointWriter, StoreConnector};
use health_etl::model::{CanonicalRecord, VALUE_FIELD};
use health_etl::pipeline::StopHandle;
use influxdb2::models::DataPoint;
use mockito::{Server, ServerGuard};

pub use mockito::Matcher;

/// Helper to start a mock server safely in sandboxed environments
pub async fn start_mock_server(test_name: &str) -> Option<ServerGuard> {
    match AssertUnwindSafe(Server::new_async()).catch_unwind().await {
        Ok(server) => Some(server),
        Err(_) => {
            eprintln!(
                "skipping {test_name} - unable to start mock server (sandbox may restrict networking)"
            );
            None
        }
    }
}

/// 2023-11-14T22:13:20Z
pub fn t0() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Returns immediately and remembers every requested delay.
///
/// Optionally stops a pipeline after a number of sleeps of one duration,
/// which lets tests end `run_continuous` after N inter-cycle pauses.
#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
    stop_after: Mutex<Option<(Duration, usize, StopHandle)>>,
}

impl RecordingSleeper {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn stop_after(&self, duration: Duration, sleeps: usize, handle: StopHandle) {
        *self.stop_after.lock().unwrap() = Some((duration, sleeps, handle));
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    pub fn count_of(&self, duration: Duration) -> usize {
        self.sleeps().iter().filter(|d| **d == duration).count()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        let count = {
            let mut sleeps = self.sleeps.lock().unwrap();
            sleeps.push(duration);
            sleeps.iter().filter(|d| **d == duration).count()
        };

        if let Some((target, limit, handle)) = self.stop_after.lock().unwrap().as_ref() {
            if *target == duration && count >= *limit {
                handle.stop();
            }
        }

        tokio::task::yield_now().await;
    }
}

/// Shared state of the in-memory store
#[derive(Default)]
pub struct MemoryStore {
    /// Size of every write call, successful or not
    pub write_calls: Mutex<Vec<usize>>,
    pub written: Mutex<Vec<DataPoint>>,
    pub connects: AtomicUsize,
    pub successful_writes: AtomicUsize,
    /// Writes start failing once this many have succeeded
    pub succeed_first: Option<usize>,
    pub ping_fails: bool,
    pub connect_fails: bool,
}

impl MemoryStore {
    pub fn healthy() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_after(successful_writes: usize) -> Arc<Self> {
        Arc::new(Self {
            succeed_first: Some(successful_writes),
            ..Self::default()
        })
    }

    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            ping_fails: true,
            connect_fails: true,
            ..Self::default()
        })
    }

    pub fn write_calls(&self) -> Vec<usize> {
        self.write_calls.lock().unwrap().clone()
    }

    pub fn written_count(&self) -> usize {
        self.written.lock().unwrap().len()
    }
}

pub struct MemoryConnector {
    pub store: Arc<MemoryStore>,
}

impl MemoryConnector {
    pub fn new(store: Arc<MemoryStore>) -> Arc<Self> {
        Arc::new(Self { store })
    }
}

#[async_trait]
impl StoreConnector for MemoryConnector {
    async fn connect(&self) -> EtlResult<Box<dyn PointWriter>> {
        self.store.connects.fetch_add(1, Ordering::SeqCst);
        if self.store.connect_fails {
            return Err(EtlError::store_connection("connection refused"));
        }
        Ok(Box::new(MemoryWriter {
            store: Arc::clone(&self.store),
        }))
    }

    fn describe(&self) -> String {
        "memory://test".to_string()
    }
}

struct MemoryWriter {
    store: Arc<MemoryStore>,
}

#[async_trait]
impl PointWriter for MemoryWriter {
    async fn ping(&self) -> EtlResult<BucketInfo> {
        if self.store.ping_fails {
            return Err(EtlError::store_connection("health check failed"));
        }
        Ok(BucketInfo::named("test-bucket"))
    }

    async fn bucket_info(&self) -> EtlResult<Option<BucketInfo>> {
        if self.store.ping_fails {
            return Err(EtlError::store_connection("health check failed"));
        }
        Ok(Some(BucketInfo::named("test-bucket")))
    }

    async fn write(&self, points: Vec<DataPoint>) -> EtlResult<()> {
        self.store.write_calls.lock().unwrap().push(points.len());

        if let Some(limit) = self.store.succeed_first {
            if self.store.successful_writes.load(Ordering::SeqCst) >= limit {
                return Err(EtlError::store_write("HTTP 503: store overloaded"));
            }
        }

        self.store.written.lock().unwrap().extend(points);
        self.store.successful_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn extract_config(url: &str) -> ExtractConfig {
    ExtractConfig {
        prometheus_url: url.to_string(),
        timeout: 5,
        retry_attempts: 3,
        retry_delay_ms: 10,
        max_retry_delay_ms: 100,
        backoff: BackoffStrategy::Fixed,
        ..ExtractConfig::default()
    }
}

pub fn load_config(batch_size: usize) -> LoadConfig {
    LoadConfig {
        url: "http://localhost:8086".to_string(),
        token: "test-token".to_string(),
        batch_size,
        ..LoadConfig::default()
    }
}

/// Complete configuration pointing the extractor at `prometheus_url`
pub fn runtime_config(prometheus_url: &str) -> RuntimeConfig {
    let mut config = RuntimeConfig {
        extract: extract_config(prometheus_url),
        load: load_config(1000),
        ..RuntimeConfig::default()
    };
    config.pipeline.interval_seconds = 60;
    config.pipeline.retry_delay = 1;
    config.pipeline.max_retry_delay = 1;
    config.monitoring.enable_metrics = false;
    config
}

/// Canonical `up` record for `service` at `t0 + offset` seconds
pub fn record(service: &str, offset: i64) -> CanonicalRecord {
    let mut tags = BTreeMap::new();
    tags.insert("service".to_string(), service.to_string());
    tags.insert("instance".to_string(), "localhost:9100".to_string());
    tags.insert("metric_type".to_string(), "up".to_string());

    let mut fields = BTreeMap::new();
    fields.insert(VALUE_FIELD.to_string(), 1.0);

    CanonicalRecord::new(
        "service_health",
        tags,
        fields,
        t0() + chrono::Duration::seconds(offset),
    )
    .unwrap()
}

pub fn records(count: usize) -> Vec<CanonicalRecord> {
    (0..count).map(|i| record("svc", i as i64)).collect()
}
