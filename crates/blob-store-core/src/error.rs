//! Error types for the blob storage layer.
//!
//! Every backend classifies its native failures into [`Error`] at the
//! operation boundary. Callers never see `std::io::Error` or
//! `object_store::Error` directly, only as the `source` of a variant.

use std::fmt;

use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed cause retained for diagnostics.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for the blob storage layer.
#[derive(Error, Debug)]
pub enum Error {
    /// The key is empty, absolute, or escapes the backend root
    #[error("Invalid object key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    /// A non-key argument failed validation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Object does not exist
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Writing an object failed
    #[error("Upload failed for {key}: {source}")]
    UploadFailed {
        key: String,
        #[source]
        source: BoxError,
    },

    /// Reading an object failed
    #[error("Download failed for {key}: {source}")]
    DownloadFailed {
        key: String,
        #[source]
        source: BoxError,
    },

    /// Removing one or more objects failed
    #[error("Delete failed for {key}: {source}")]
    DeleteFailed {
        key: String,
        #[source]
        source: BoxError,
    },

    /// The caller cancelled the operation or its deadline passed
    #[error("Operation cancelled: {0}")]
    Cancelled(CancelReason),

    /// Any other backend failure
    #[error("Internal storage error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Configuration error while building a backend
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Why an operation stopped before completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The cancellation token fired
    Cancelled,
    /// The context deadline elapsed
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Cancelled => write!(f, "cancelled by caller"),
            CancelReason::DeadlineExceeded => write!(f, "deadline exceeded"),
        }
    }
}

/// Fieldless view of [`Error`], used for matching and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidKey,
    InvalidInput,
    NotFound,
    UploadFailed,
    DownloadFailed,
    DeleteFailed,
    Cancelled,
    Internal,
    Config,
}

impl ErrorKind {
    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidKey => "invalid_key",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::NotFound => "not_found",
            ErrorKind::UploadFailed => "upload_failed",
            ErrorKind::DownloadFailed => "download_failed",
            ErrorKind::DeleteFailed => "delete_failed",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
            ErrorKind::Config => "config",
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidKey { .. } => ErrorKind::InvalidKey,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::UploadFailed { .. } => ErrorKind::UploadFailed,
            Error::DownloadFailed { .. } => ErrorKind::DownloadFailed,
            Error::DeleteFailed { .. } => ErrorKind::DeleteFailed,
            Error::Cancelled(_) => ErrorKind::Cancelled,
            Error::Internal { .. } => ErrorKind::Internal,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }

    pub(crate) fn upload(key: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::UploadFailed {
            key: key.into(),
            source: source.into(),
        }
    }

    pub(crate) fn download(key: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::DownloadFailed {
            key: key.into(),
            source: source.into(),
        }
    }

    pub(crate) fn delete(key: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::DeleteFailed {
            key: key.into(),
            source: source.into(),
        }
    }

    pub(crate) fn internal(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Aggregate error for a batch delete with `failed` of `total` keys left behind.
    pub(crate) fn batch_delete(failed: usize, total: usize) -> Self {
        Error::DeleteFailed {
            key: format!("{} of {} keys", failed, total),
            source: format!("{} objects failed to delete", failed).into(),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Config(err.to_string())
    }
}
