//! Prometheus metrics for blob store operations.
//!
//! ## Modules
//!
//! - [`labels`] - Label types for Prometheus metrics dimensions
//! - [`registry`] - The `StorageMetrics` registry
//! - [`instrumented_storage`] - Store decorator with metrics instrumentation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use blob_store_core::metrics::{InstrumentedStore, StorageMetrics};
//! use std::sync::Arc;
//!
//! let metrics = Arc::new(StorageMetrics::new());
//! let store = InstrumentedStore::new(store, metrics.clone());
//!
//! // ... use the store ...
//! println!("{}", metrics.encode());
//! ```

pub mod instrumented_storage;
pub mod labels;
pub mod registry;

pub use instrumented_storage::InstrumentedStore;
pub use labels::{BackendLabels, ErrorLabels, OperationLabels, StorageOperation};
pub use registry::{StorageMetrics, TimerGuard};
