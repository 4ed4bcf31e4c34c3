//! Prometheus metrics for storage operations
//!
//! Defines metrics for:
//! - Operation counts by backend, operation and status
//! - Operation latency by backend and operation
//!
//! Metrics are always recorded; registering them with a registry is up to
//! the application, see [`register`].

use std::time::Instant;

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

lazy_static! {
    /// Storage operation counter by backend, operation and status
    pub static ref STORAGE_OPERATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("unistore_storage_operations_total", "Total storage operations"),
        &["backend", "operation", "status"]
    )
    .expect("Failed to create STORAGE_OPERATIONS metric");

    /// Storage operation duration histogram
    pub static ref STORAGE_OPERATION_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "unistore_storage_operation_duration_seconds",
            "Storage operation duration in seconds"
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["backend", "operation"]
    )
    .expect("Failed to create STORAGE_OPERATION_DURATION metric");
}

/// Register the storage metrics with `registry`
pub fn register(registry: &Registry) -> prometheus::Result<()> {
    registry.register(Box::new(STORAGE_OPERATIONS.clone()))?;
    registry.register(Box::new(STORAGE_OPERATION_DURATION.clone()))?;
    Ok(())
}

/// Times one operation; call [`OperationTimer::finish`] with its outcome
pub(crate) struct OperationTimer {
    backend: &'static str,
    operation: &'static str,
    start: Instant,
}

impl OperationTimer {
    pub(crate) fn start(backend: &'static str, operation: &'static str) -> Self {
        Self {
            backend,
            operation,
            start: Instant::now(),
        }
    }

    pub(crate) fn finish<T, E>(self, result: &Result<T, E>) {
        let status = if result.is_ok() { "ok" } else { "error" };
        STORAGE_OPERATIONS
            .with_label_values(&[self.backend, self.operation, status])
            .inc();
        STORAGE_OPERATION_DURATION
            .with_label_values(&[self.backend, self.operation])
            .observe(self.start.elapsed().as_secs_f64());
    }
}
