//! Label types for Prometheus metrics.
//!
//! This module defines the label types used for metrics dimensions,
//! following the prometheus-client crate patterns.

use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use std::fmt::Write;

use crate::error::ErrorKind;

/// Labels for per-operation latency metrics.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OperationLabels {
    pub backend: String,
    pub operation: StorageOperation,
}

impl OperationLabels {
    pub fn new(backend: impl Into<String>, operation: StorageOperation) -> Self {
        Self {
            backend: backend.into(),
            operation,
        }
    }
}

/// Labels for byte counters.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct BackendLabels {
    pub backend: String,
}

impl BackendLabels {
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
        }
    }
}

/// Labels for error metrics.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    pub backend: String,
    pub operation: StorageOperation,
    pub error_kind: String,
}

impl ErrorLabels {
    pub fn new(backend: impl Into<String>, operation: StorageOperation, kind: ErrorKind) -> Self {
        Self {
            backend: backend.into(),
            operation,
            error_kind: kind.as_str().to_string(),
        }
    }
}

/// Store operation, one per `Store` method.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum StorageOperation {
    Upload,
    Download,
    GetObject,
    HeadObject,
    Delete,
    DeleteMultiple,
    List,
    Exists,
    Copy,
}

impl StorageOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageOperation::Upload => "upload",
            StorageOperation::Download => "download",
            StorageOperation::GetObject => "get_object",
            StorageOperation::HeadObject => "head_object",
            StorageOperation::Delete => "delete",
            StorageOperation::DeleteMultiple => "delete_multiple",
            StorageOperation::List => "list",
            StorageOperation::Exists => "exists",
            StorageOperation::Copy => "copy",
        }
    }
}

impl EncodeLabelValue for StorageOperation {
    fn encode(
        &self,
        encoder: &mut prometheus_client::encoding::LabelValueEncoder,
    ) -> std::result::Result<(), std::fmt::Error> {
        encoder.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_labels_use_kind_name() {
        let labels = ErrorLabels::new("s3", StorageOperation::Upload, ErrorKind::UploadFailed);
        assert_eq!(labels.backend, "s3");
        assert_eq!(labels.error_kind, "upload_failed");
    }

    #[test]
    fn test_operation_as_str() {
        assert_eq!(StorageOperation::GetObject.as_str(), "get_object");
        assert_eq!(StorageOperation::DeleteMultiple.as_str(), "delete_multiple");
    }
}
