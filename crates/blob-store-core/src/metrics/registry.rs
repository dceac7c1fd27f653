//! Prometheus metrics registry for blob storage operations.

use parking_lot::RwLock;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::Histogram;
use prometheus_client::registry::Registry;
use std::time::Instant;

use super::labels::{BackendLabels, ErrorLabels, OperationLabels, StorageOperation};
use crate::error::ErrorKind;

/// Operation latency histogram buckets (in seconds).
/// Covers local file operations through large multipart transfers: 1ms to 60s.
const OPERATION_LATENCY_BUCKETS: [f64; 12] = [
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0, 15.0, 60.0,
];

/// Prometheus metrics for blob store operations.
pub struct StorageMetrics {
    /// Internal prometheus-client registry.
    registry: RwLock<Registry>,

    /// Operation latency histogram (by backend and operation).
    pub operation_duration_seconds: Family<OperationLabels, Histogram>,

    /// Cumulative bytes accepted by successful uploads.
    pub bytes_uploaded: Family<BackendLabels, Counter>,

    /// Cumulative bytes delivered by downloads and object reads.
    pub bytes_downloaded: Family<BackendLabels, Counter>,

    /// Failed operations by error kind.
    pub errors: Family<ErrorLabels, Counter>,
}

impl Default for StorageMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageMetrics {
    /// Create a new metrics registry with all metrics registered.
    pub fn new() -> Self {
        let operation_duration_seconds =
            Family::<OperationLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(OPERATION_LATENCY_BUCKETS.iter().cloned())
            });
        let bytes_uploaded = Family::<BackendLabels, Counter>::default();
        let bytes_downloaded = Family::<BackendLabels, Counter>::default();
        let errors = Family::<ErrorLabels, Counter>::default();

        let mut registry = Registry::default();

        registry.register(
            "blob_store_operation_duration_seconds",
            "Latency of blob store operations",
            operation_duration_seconds.clone(),
        );
        // Counters get the _total suffix on encode
        registry.register(
            "blob_store_bytes_uploaded",
            "Bytes written by successful uploads",
            bytes_uploaded.clone(),
        );
        registry.register(
            "blob_store_bytes_downloaded",
            "Bytes read by downloads and object reads",
            bytes_downloaded.clone(),
        );
        registry.register(
            "blob_store_errors",
            "Failed blob store operations by error kind",
            errors.clone(),
        );

        Self {
            registry: RwLock::new(registry),
            operation_duration_seconds,
            bytes_uploaded,
            bytes_downloaded,
            errors,
        }
    }

    /// Record operation latency.
    pub fn record_operation(&self, backend: &str, operation: StorageOperation, latency_secs: f64) {
        let labels = OperationLabels::new(backend, operation);
        self.operation_duration_seconds
            .get_or_create(&labels)
            .observe(latency_secs);
    }

    /// Increment uploaded bytes counter.
    pub fn inc_bytes_uploaded(&self, backend: &str, bytes: u64) {
        self.bytes_uploaded
            .get_or_create(&BackendLabels::new(backend))
            .inc_by(bytes);
    }

    /// Increment downloaded bytes counter.
    pub fn inc_bytes_downloaded(&self, backend: &str, bytes: u64) {
        self.bytes_downloaded
            .get_or_create(&BackendLabels::new(backend))
            .inc_by(bytes);
    }

    /// Handle on the downloaded bytes counter, for readers that count as they go.
    pub fn bytes_downloaded_counter(&self, backend: &str) -> Counter {
        self.bytes_downloaded
            .get_or_create(&BackendLabels::new(backend))
            .clone()
    }

    /// Increment error counter.
    pub fn inc_error(&self, backend: &str, operation: StorageOperation, kind: ErrorKind) {
        let labels = ErrorLabels::new(backend, operation, kind);
        self.errors.get_or_create(&labels).inc();
    }

    /// Encode all metrics to Prometheus text format.
    pub fn encode(&self) -> String {
        let registry = self.registry.read();
        let mut buffer = String::new();
        if encode(&mut buffer, &registry).is_err() {
            return String::new();
        }
        buffer
    }
}

/// A guard that records operation latency when dropped.
pub struct TimerGuard<'a> {
    metrics: &'a StorageMetrics,
    backend: &'a str,
    operation: StorageOperation,
    start: Instant,
}

impl<'a> TimerGuard<'a> {
    pub fn new(metrics: &'a StorageMetrics, backend: &'a str, operation: StorageOperation) -> Self {
        Self {
            metrics,
            backend,
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        let latency = self.start.elapsed().as_secs_f64();
        self.metrics
            .record_operation(self.backend, self.operation, latency);
    }
}
