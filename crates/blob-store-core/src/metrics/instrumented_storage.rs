//! Instrumented store decorator.
//!
//! This module provides a decorator that wraps any `Store` implementation
//! with metrics instrumentation, recording latency, bytes transferred, and errors.

use async_trait::async_trait;
use prometheus_client::metrics::counter::Counter;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

use super::labels::StorageOperation;
use super::registry::{StorageMetrics, TimerGuard};
use crate::context::OpContext;
use crate::storage::{
    DeleteMultipleOutput, DownloadSink, ListInput, ListOutput, ObjectInfo, ObjectReader,
    PresignedUrlGenerator, Store, UploadInput, UploadOutput,
};
use crate::Result;

/// A store wrapper that records metrics for all operations.
///
/// Records, per backend:
/// - Operation latency (histogram, every operation)
/// - Bytes uploaded and downloaded (counters)
/// - Errors by operation and kind (counter)
///
/// # Example
///
/// ```rust,ignore
/// use blob_store_core::metrics::{InstrumentedStore, StorageMetrics};
/// use blob_store_core::storage::{create_store, StorageBackendConfig};
///
/// let store = create_store(&StorageBackendConfig::Memory)?;
/// let metrics = Arc::new(StorageMetrics::new());
/// let instrumented = InstrumentedStore::new(store, metrics.clone());
/// ```
pub struct InstrumentedStore {
    /// The wrapped store.
    inner: Arc<dyn Store>,

    /// The backend name for metric labels.
    backend_name: &'static str,

    /// Reference to the Prometheus metrics registry.
    metrics: Arc<StorageMetrics>,
}

impl InstrumentedStore {
    pub fn new(inner: Arc<dyn Store>, metrics: Arc<StorageMetrics>) -> Self {
        Self {
            backend_name: inner.name(),
            inner,
            metrics,
        }
    }

    /// Get the inner store.
    pub fn inner(&self) -> &Arc<dyn Store> {
        &self.inner
    }

    pub fn metrics(&self) -> &Arc<StorageMetrics> {
        &self.metrics
    }

    fn timer(&self, operation: StorageOperation) -> TimerGuard<'_> {
        TimerGuard::new(&self.metrics, self.backend_name, operation)
    }

    fn record<T>(&self, operation: StorageOperation, result: &Result<T>) {
        if let Err(e) = result {
            self.metrics
                .inc_error(self.backend_name, operation, e.kind());
        }
    }
}

#[async_trait]
impl Store for InstrumentedStore {
    fn name(&self) -> &'static str {
        self.backend_name
    }

    async fn upload(&self, ctx: &OpContext, mut input: UploadInput) -> Result<UploadOutput> {
        let _timer = self.timer(StorageOperation::Upload);

        let tally = Counter::default();
        input.body = Box::new(CountingReader::new(input.body, tally.clone()));

        let result = self.inner.upload(ctx, input).await;
        match &result {
            Ok(_) => self.metrics.inc_bytes_uploaded(self.backend_name, tally.get()),
            Err(e) => self
                .metrics
                .inc_error(self.backend_name, StorageOperation::Upload, e.kind()),
        }
        result
    }

    async fn download(
        &self,
        ctx: &OpContext,
        key: &str,
        sink: &mut dyn DownloadSink,
    ) -> Result<u64> {
        let _timer = self.timer(StorageOperation::Download);

        let result = self.inner.download(ctx, key, sink).await;
        match &result {
            Ok(bytes) => self.metrics.inc_bytes_downloaded(self.backend_name, *bytes),
            Err(e) => self
                .metrics
                .inc_error(self.backend_name, StorageOperation::Download, e.kind()),
        }
        result
    }

    async fn get_object(&self, ctx: &OpContext, key: &str) -> Result<ObjectReader> {
        let _timer = self.timer(StorageOperation::GetObject);

        let result = self.inner.get_object(ctx, key).await;
        self.record(StorageOperation::GetObject, &result);

        let counter = self.metrics.bytes_downloaded_counter(self.backend_name);
        result.map(|reader| Box::new(CountingReader::new(reader, counter)) as ObjectReader)
    }

    async fn head_object(&self, ctx: &OpContext, key: &str) -> Result<ObjectInfo> {
        let _timer = self.timer(StorageOperation::HeadObject);
        let result = self.inner.head_object(ctx, key).await;
        self.record(StorageOperation::HeadObject, &result);
        result
    }

    async fn delete(&self, ctx: &OpContext, key: &str) -> Result<()> {
        let _timer = self.timer(StorageOperation::Delete);
        let result = self.inner.delete(ctx, key).await;
        self.record(StorageOperation::Delete, &result);
        result
    }

    async fn delete_multiple(&self, ctx: &OpContext, keys: &[String]) -> DeleteMultipleOutput {
        let _timer = self.timer(StorageOperation::DeleteMultiple);
        let output = self.inner.delete_multiple(ctx, keys).await;
        if let Some(e) = &output.error {
            self.metrics
                .inc_error(self.backend_name, StorageOperation::DeleteMultiple, e.kind());
        }
        output
    }

    async fn list(&self, ctx: &OpContext, input: &ListInput) -> Result<ListOutput> {
        let _timer = self.timer(StorageOperation::List);
        let result = self.inner.list(ctx, input).await;
        self.record(StorageOperation::List, &result);
        result
    }

    async fn exists(&self, ctx: &OpContext, key: &str) -> Result<bool> {
        let _timer = self.timer(StorageOperation::Exists);
        let result = self.inner.exists(ctx, key).await;
        self.record(StorageOperation::Exists, &result);
        result
    }

    async fn copy(&self, ctx: &OpContext, source_key: &str, dest_key: &str) -> Result<()> {
        let _timer = self.timer(StorageOperation::Copy);
        let result = self.inner.copy(ctx, source_key, dest_key).await;
        self.record(StorageOperation::Copy, &result);
        result
    }

    fn presigner(&self) -> Option<&dyn PresignedUrlGenerator> {
        self.inner.presigner()
    }
}

/// Reader that adds every byte it yields to a counter.
struct CountingReader {
    inner: ObjectReader,
    counter: Counter,
}

impl CountingReader {
    fn new(inner: ObjectReader, counter: Counter) -> Self {
        Self { inner, counter }
    }
}

impl AsyncRead for CountingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        let poll = Pin::new(&mut self.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &poll {
            self.counter.inc_by((buf.filled().len() - before) as u64);
        }
        poll
    }
}
