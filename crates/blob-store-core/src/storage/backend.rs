//! Storage contract shared by every backend.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncSeek, AsyncWrite};

use super::content_type::content_type_for;
use crate::context::OpContext;
use crate::error::{Error, Result};

/// Default and maximum page size for [`Store::list`].
pub const DEFAULT_MAX_KEYS: usize = 1000;

/// Readable object body. Dropping it closes the underlying handle.
pub type ObjectReader = Box<dyn AsyncRead + Unpin + Send>;

/// Random-access destination for [`Store::download`].
///
/// Networked downloads write parts out of order, so the sink must support
/// seeking. Implemented for anything that is `AsyncWrite + AsyncSeek`, such as
/// `tokio::fs::File` or `std::io::Cursor<Vec<u8>>`.
pub trait DownloadSink: AsyncWrite + AsyncSeek + Unpin + Send {}

impl<T: AsyncWrite + AsyncSeek + Unpin + Send> DownloadSink for T {}

/// Metadata about a stored object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObjectInfo {
    /// Backend-relative key
    pub key: String,
    /// Size in bytes
    pub size: u64,
    /// MIME type, stored or resolved from the key extension
    pub content_type: String,
    /// Content fingerprint, when the backend reports one
    pub etag: Option<String>,
    /// Last modification time, when the backend reports one
    pub last_modified: Option<DateTime<Utc>>,
    /// User-defined metadata
    pub metadata: HashMap<String, String>,
}

/// Parameters for [`Store::upload`].
pub struct UploadInput {
    /// Object key (required)
    pub key: String,
    /// Content to upload; consumed by the upload
    pub body: ObjectReader,
    /// MIME type; resolved from the key extension when absent
    pub content_type: Option<String>,
    /// User-defined metadata
    pub metadata: HashMap<String, String>,
}

impl UploadInput {
    pub fn new(key: impl Into<String>, body: impl AsyncRead + Unpin + Send + 'static) -> Self {
        Self {
            key: key.into(),
            body: Box::new(body),
            content_type: None,
            metadata: HashMap::new(),
        }
    }

    /// Upload an in-memory buffer.
    pub fn from_bytes(key: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self::new(key, std::io::Cursor::new(data.into()))
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The explicit content type, or the one implied by the key extension.
    pub fn resolved_content_type(&self) -> String {
        match self.content_type.as_deref() {
            Some(ct) if !ct.is_empty() => ct.to_string(),
            _ => content_type_for(&self.key).to_string(),
        }
    }
}

impl fmt::Debug for UploadInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadInput")
            .field("key", &self.key)
            .field("content_type", &self.content_type)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Result of an upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadOutput {
    /// File path or URL of the stored object
    pub location: String,
    /// Version ID, if the backend versions objects
    pub version_id: Option<String>,
    /// Entity tag of the stored content
    pub etag: String,
}

/// Parameters for [`Store::list`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListInput {
    /// Only keys starting with this string
    pub prefix: String,
    /// Page size; values <= 0 mean [`DEFAULT_MAX_KEYS`]
    pub max_keys: i32,
    /// Exclusive lower bound on returned keys
    pub start_after: String,
}

impl ListInput {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Default::default()
        }
    }

    pub fn max_keys(mut self, max_keys: i32) -> Self {
        self.max_keys = max_keys;
        self
    }

    pub fn start_after(mut self, key: impl Into<String>) -> Self {
        self.start_after = key.into();
        self
    }

    pub fn effective_max_keys(&self) -> usize {
        if self.max_keys <= 0 {
            DEFAULT_MAX_KEYS
        } else {
            self.max_keys as usize
        }
    }

    pub(crate) fn matches(&self, key: &str) -> bool {
        key.starts_with(&self.prefix)
            && (self.start_after.is_empty() || key > self.start_after.as_str())
    }
}

/// One page of listing results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListOutput {
    /// Objects in ascending key order
    pub objects: Vec<ObjectInfo>,
    /// More keys exist beyond this page
    pub is_truncated: bool,
    /// Last key of this page, to pass as `start_after`
    pub next_marker: Option<String>,
}

impl ListOutput {
    /// Truncate a sorted candidate set to one page.
    pub(crate) fn page(mut objects: Vec<ObjectInfo>, max_keys: usize) -> Self {
        let is_truncated = objects.len() > max_keys;
        objects.truncate(max_keys);
        let next_marker = objects.last().map(|o| o.key.clone());
        Self {
            objects,
            is_truncated,
            next_marker,
        }
    }
}

/// Outcome of [`Store::delete_multiple`]: keys left behind plus one aggregate error.
#[derive(Debug, Default)]
pub struct DeleteMultipleOutput {
    pub failed_keys: Vec<String>,
    pub error: Option<Error>,
}

impl DeleteMultipleOutput {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.failed_keys.is_empty()
    }

    pub fn into_result(self) -> Result<()> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Blob storage contract.
///
/// Implemented by [`FilesystemStore`](super::FilesystemStore) and
/// [`NetworkStore`](super::NetworkStore). Every key is validated with
/// [`sanitize_key`](super::sanitize_key) before any I/O, and every failure is
/// one of the [`Error`] variants.
#[async_trait]
pub trait Store: Send + Sync {
    /// Short backend name used in logs and metric labels.
    fn name(&self) -> &'static str;

    /// Store `input.body` under `input.key`, replacing any existing object.
    async fn upload(&self, ctx: &OpContext, input: UploadInput) -> Result<UploadOutput>;

    /// Write the object into `sink`, returning the number of bytes written.
    async fn download(&self, ctx: &OpContext, key: &str, sink: &mut dyn DownloadSink)
        -> Result<u64>;

    /// Open the object for streaming reads.
    async fn get_object(&self, ctx: &OpContext, key: &str) -> Result<ObjectReader>;

    /// Object metadata without the content.
    async fn head_object(&self, ctx: &OpContext, key: &str) -> Result<ObjectInfo>;

    /// Remove the object. Removing a missing object succeeds.
    async fn delete(&self, ctx: &OpContext, key: &str) -> Result<()>;

    /// Remove several objects, collecting the keys that could not be removed.
    async fn delete_multiple(&self, ctx: &OpContext, keys: &[String]) -> DeleteMultipleOutput;

    /// One page of objects matching `input`.
    async fn list(&self, ctx: &OpContext, input: &ListInput) -> Result<ListOutput>;

    /// Whether an object exists under `key`.
    async fn exists(&self, ctx: &OpContext, key: &str) -> Result<bool>;

    /// Duplicate `source_key` to `dest_key`.
    async fn copy(&self, ctx: &OpContext, source_key: &str, dest_key: &str) -> Result<()>;

    /// Signed URL capability, if this backend has one.
    fn presigner(&self) -> Option<&dyn PresignedUrlGenerator> {
        None
    }
}

/// Time-bounded signed URLs. Not every backend can issue them.
#[async_trait]
pub trait PresignedUrlGenerator: Send + Sync {
    /// A URL permitting a GET of `key` until `expiration` elapses.
    async fn generate_presigned_url(
        &self,
        ctx: &OpContext,
        key: &str,
        expiration: Duration,
    ) -> Result<String>;

    /// A URL permitting a PUT to `key` until `expiration` elapses.
    async fn generate_presigned_upload_url(
        &self,
        ctx: &OpContext,
        key: &str,
        content_type: Option<&str>,
        expiration: Duration,
    ) -> Result<String>;
}
