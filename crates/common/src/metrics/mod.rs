//! Metrics and observability utilities
//!
//! Prometheus metrics with standardized naming conventions for the
//! catalog import pipeline.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

/// Metrics prefix for all RxCatalog metrics
pub const METRICS_PREFIX: &str = "rxcatalog";

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_import_runs_total", METRICS_PREFIX),
        Unit::Count,
        "Total import runs"
    );

    describe_counter!(
        format!("{}_rows_imported_total", METRICS_PREFIX),
        Unit::Count,
        "Rows newly inserted by import"
    );

    describe_counter!(
        format!("{}_rows_updated_total", METRICS_PREFIX),
        Unit::Count,
        "Rows updated in place by import"
    );

    describe_counter!(
        format!("{}_rows_skipped_total", METRICS_PREFIX),
        Unit::Count,
        "Rows dropped during validation or deduplication"
    );

    describe_counter!(
        format!("{}_rows_failed_total", METRICS_PREFIX),
        Unit::Count,
        "Rows or chunks that errored during the write phase"
    );

    describe_histogram!(
        format!("{}_import_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end import run latency in seconds"
    );

    tracing::info!("Metrics registered");
}

/// Record the aggregate outcome of one import run
pub fn record_import(
    duration_secs: f64,
    imported: u64,
    updated: u64,
    skipped: u64,
    failed: u64,
    success: bool,
) {
    let status = if success { "success" } else { "partial" };

    counter!(
        format!("{}_import_runs_total", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .increment(1);

    counter!(format!("{}_rows_imported_total", METRICS_PREFIX)).increment(imported);
    counter!(format!("{}_rows_updated_total", METRICS_PREFIX)).increment(updated);
    counter!(format!("{}_rows_skipped_total", METRICS_PREFIX)).increment(skipped);
    counter!(format!("{}_rows_failed_total", METRICS_PREFIX)).increment(failed);

    histogram!(format!("{}_import_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_import() {
        record_import(0.25, 10, 2, 1, 0, true);
        // Just verify it runs without panic
    }
}
