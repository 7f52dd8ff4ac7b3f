use influxdb2::models::DataPoint;

use crate::common::error::EtlResult;
use crate::model::CanonicalRecord;

/// Create a DataPoint for a canonical record, nanosecond precision
pub fn record_to_datapoint(record: &CanonicalRecord) -> EtlResult<DataPoint> {
    let timestamp = record.timestamp().timestamp_nanos_opt().ok_or_else(|| {
        crate::etl_error!(
            data_serialization,
            format!(
                "timestamp {} out of nanosecond range",
                record.timestamp()
            )
        )
    })?;

    let mut builder = DataPoint::builder(record.measurement());

    for (key, value) in record.tags() {
        builder = builder.tag(key, value);
    }

    for (name, value) in record.fields() {
        builder = builder.field(name, *value);
    }

    builder.timestamp(timestamp).build().map_err(|e| {
        crate::etl_error!(
            data_serialization,
            format!("Failed to create {} DataPoint: {e}", record.measurement())
        )
    })
}

/// Convert a batch, returning the points and how many records were skipped
pub fn records_to_datapoints(records: &[CanonicalRecord]) -> (Vec<DataPoint>, usize) {
    let mut points = Vec::with_capacity(records.len());
    let mut skipped = 0;

    for record in records {
        match record_to_datapoint(record) {
            Ok(point) => points.push(point),
            Err(e) => {
                skipped += 1;
                tracing::warn!("⚠ Skipping record that cannot be converted: {e}");
            }
        }
    }

    (points, skipped)
}
