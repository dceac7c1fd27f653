//! Blob Store Core Library
//!
//! This crate provides a single asynchronous blob storage contract, [`Store`],
//! with a local filesystem backend and a networked backend over
//! `object_store` (S3 and in-memory), plus presigned URLs, cancellation,
//! configuration and Prometheus instrumentation.

pub mod config;
pub mod context;
pub mod error;
pub mod metrics;
pub mod storage;

pub use config::Config;
pub use context::OpContext;
pub use error::{CancelReason, Error, ErrorKind, Result};
pub use metrics::{InstrumentedStore, StorageMetrics};
pub use storage::{
    create_store, DeleteMultipleOutput, DownloadSink, FilesystemStore, ListInput, ListOutput,
    NetworkStore, ObjectInfo, ObjectReader, PresignedUrlGenerator, StorageBackendConfig, Store,
    UploadInput, UploadOutput,
};
