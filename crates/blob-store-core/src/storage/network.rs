//! Networked storage backend over `object_store`.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use http::Method;
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::{Attribute, Attributes, GetOptions, ObjectMeta, ObjectStore};
use tokio_util::io::StreamReader;
use tracing::{debug, error, warn};

use super::backend::{
    DeleteMultipleOutput, DownloadSink, ListInput, ListOutput, ObjectInfo, ObjectReader,
    PresignedUrlGenerator, Store, UploadInput, UploadOutput,
};
use super::content_type::content_type_for;
use super::key::sanitize_key;
use super::transfer::{Downloader, TransferConfig, Uploader};
use crate::context::OpContext;
use crate::error::{Error, Result};

/// Keys per `delete_stream` call, the S3 DeleteObjects limit.
pub const DELETE_BATCH_SIZE: usize = 1000;

/// Longest lifetime accepted for a presigned URL (SigV4 limit).
pub const MAX_PRESIGN_EXPIRATION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Error code S3 reports for a missing key in an error body.
const NO_SUCH_KEY: &str = "NoSuchKey";

/// A missing bucket also comes back as a 404 and must not read as a missing key.
const NO_SUCH_BUCKET: &str = "NoSuchBucket";

/// Whether `err` means the object does not exist.
///
/// Accepts `object_store::Error::NotFound`, an `io::Error` of kind `NotFound`
/// anywhere in the source chain, and errors carrying the `NoSuchKey` code.
/// A chain that mentions `NoSuchBucket` is never a missing object.
pub fn is_not_found(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut found = false;
    let mut current = Some(err);
    while let Some(e) = current {
        let rendered = e.to_string();
        if rendered.contains(NO_SUCH_BUCKET) {
            return false;
        }
        if let Some(object_store::Error::NotFound { .. }) = e.downcast_ref::<object_store::Error>()
        {
            found = true;
        }
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::NotFound {
                found = true;
            }
        }
        if rendered.contains(NO_SUCH_KEY) {
            found = true;
        }
        current = e.source();
    }
    found
}

/// Map a not-found error to `NotFound`, anything else through `wrap`.
pub(crate) fn classify(
    key: &str,
    err: object_store::Error,
    wrap: fn(&str, object_store::Error) -> Error,
) -> Error {
    if is_not_found(&err) {
        Error::NotFound(key.to_string())
    } else {
        wrap(key, err)
    }
}

/// Blob store over any `object_store` implementation.
///
/// Used with S3 (see [`NetworkStore::s3`]) and with the in-memory store
/// (see [`NetworkStore::in_memory`]). Holds no mutable state of its own.
#[derive(Debug)]
pub struct NetworkStore {
    name: &'static str,
    store: Arc<dyn ObjectStore>,
    signer: Option<Arc<dyn Signer>>,
    base_url: String,
    root: Option<String>,
    transfer: TransferConfig,
}

impl NetworkStore {
    /// Wrap `store`; `base_url` prefixes the locations reported by uploads.
    pub fn new(name: &'static str, store: Arc<dyn ObjectStore>, base_url: impl Into<String>) -> Self {
        Self {
            name,
            store,
            signer: None,
            base_url: base_url.into(),
            root: None,
            transfer: TransferConfig::default(),
        }
    }

    /// Scope every key under `prefix`. An empty prefix means the bucket root.
    pub fn with_prefix(mut self, prefix: impl AsRef<str>) -> Result<Self> {
        let prefix = prefix.as_ref().trim_matches('/');
        if prefix.is_empty() {
            self.root = None;
            return Ok(self);
        }
        let root = sanitize_key(prefix)
            .map_err(|e| Error::Config(format!("Invalid key prefix: {}", e)))?;
        Path::parse(&root).map_err(|e| Error::Config(format!("Invalid key prefix: {}", e)))?;
        self.root = Some(root);
        Ok(self)
    }

    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_transfer_config(mut self, config: TransferConfig) -> Self {
        self.transfer = config.normalized();
        self
    }

    pub fn transfer_config(&self) -> &TransferConfig {
        &self.transfer
    }

    /// Key prefix applied to every operation, if any
    pub fn prefix(&self) -> Option<&str> {
        self.root.as_deref()
    }

    /// Sanitize a key and build its full object path
    fn location(&self, raw: &str) -> Result<(String, Path)> {
        let key = sanitize_key(raw)?;
        let full = self.full_key(&key);
        let location = Path::parse(&full).map_err(|_| Error::InvalidKey {
            key: raw.to_string(),
            reason: "key is not a valid object path",
        })?;
        Ok((key, location))
    }

    fn full_key(&self, key: &str) -> String {
        match &self.root {
            Some(root) if key.is_empty() => root.clone(),
            Some(root) => format!("{}/{}", root, key),
            None => key.to_string(),
        }
    }

    /// Strip the root prefix from a listed location
    fn strip_root(&self, location: &Path) -> Option<String> {
        let raw = location.as_ref();
        match &self.root {
            Some(root) => raw
                .strip_prefix(root.as_str())?
                .strip_prefix('/')
                .map(str::to_string),
            None => Some(raw.to_string()),
        }
    }

    fn url_for(&self, location: &Path) -> String {
        if self.base_url.ends_with('/') {
            format!("{}{}", self.base_url, location)
        } else {
            format!("{}/{}", self.base_url, location)
        }
    }

    fn object_info(&self, key: String, meta: &ObjectMeta) -> ObjectInfo {
        let content_type = content_type_for(&key).to_string();
        ObjectInfo {
            key,
            size: meta.size as u64,
            content_type,
            etag: meta.e_tag.as_deref().map(trim_etag),
            last_modified: Some(meta.last_modified),
            metadata: HashMap::new(),
        }
    }

    async fn sign(
        &self,
        ctx: &OpContext,
        method: Method,
        key: &str,
        expiration: Duration,
    ) -> Result<String> {
        let (key, location) = self.location(key)?;
        validate_expiration(expiration)?;
        let signer = self.signer.as_ref().ok_or_else(|| {
            Error::InvalidInput(format!("{} backend cannot sign URLs", self.name))
        })?;

        let url = ctx
            .run(async {
                signer
                    .signed_url(method.clone(), &location, expiration)
                    .await
                    .map_err(|e| Error::internal(format!("Failed to presign {}", key), e))
            })
            .await?;

        debug!("Presigned {} URL for {} ({:?})", method, key, expiration);
        Ok(url.to_string())
    }
}

#[async_trait]
impl Store for NetworkStore {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn upload(&self, ctx: &OpContext, input: UploadInput) -> Result<UploadOutput> {
        let (key, location) = self.location(&input.key)?;
        ctx.check()?;

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, input.resolved_content_type().into());
        for (name, value) in input.metadata {
            attributes.insert(Attribute::Metadata(name.into()), value.into());
        }

        let mut body = input.body;
        let (result, size) = Uploader::new(self.store.as_ref(), &self.transfer)
            .upload(ctx, &key, &location, body.as_mut(), attributes)
            .await
            .inspect_err(|e| {
                if !e.is_cancelled() {
                    error!("Failed to upload {}: {}", key, e);
                }
            })?;

        debug!("Uploaded {} ({} bytes)", location, size);

        Ok(UploadOutput {
            location: self.url_for(&location),
            version_id: result.version,
            etag: result.e_tag.as_deref().map(trim_etag).unwrap_or_default(),
        })
    }

    async fn download(
        &self,
        ctx: &OpContext,
        key: &str,
        sink: &mut dyn DownloadSink,
    ) -> Result<u64> {
        let (key, location) = self.location(key)?;
        ctx.check()?;

        Downloader::new(self.store.as_ref(), &self.transfer)
            .download(ctx, &key, &location, sink)
            .await
            .inspect_err(|e| {
                if !e.is_cancelled() && !e.is_not_found() {
                    error!("Failed to download {}: {}", key, e);
                }
            })
    }

    async fn get_object(&self, ctx: &OpContext, key: &str) -> Result<ObjectReader> {
        let (key, location) = self.location(key)?;
        ctx.check()?;
        debug!("GET {}", location);

        let result = ctx
            .run(async {
                self.store
                    .get(&location)
                    .await
                    .map_err(|e| classify(&key, e, |k, e| Error::download(k, e)))
            })
            .await?;

        Ok(Box::new(StreamReader::new(result.into_stream())))
    }

    async fn head_object(&self, ctx: &OpContext, key: &str) -> Result<ObjectInfo> {
        let (key, location) = self.location(key)?;
        ctx.check()?;
        debug!("HEAD {}", location);

        let options = GetOptions {
            head: true,
            ..Default::default()
        };
        let result = ctx
            .run(async {
                self.store.get_opts(&location, options).await.map_err(|e| {
                    classify(&key, e, |k, e| {
                        Error::internal(format!("Failed to get object info for {}", k), e)
                    })
                })
            })
            .await?;

        let mut info = self.object_info(key, &result.meta);
        for (attribute, value) in result.attributes.iter() {
            match attribute {
                Attribute::ContentType => info.content_type = value.to_string(),
                Attribute::Metadata(name) => {
                    info.metadata.insert(name.to_string(), value.to_string());
                }
                _ => {}
            }
        }
        Ok(info)
    }

    async fn delete(&self, ctx: &OpContext, key: &str) -> Result<()> {
        let (key, location) = self.location(key)?;
        ctx.check()?;
        debug!("DELETE {}", location);

        let result = ctx
            .run(async { Ok(self.store.delete(&location).await) })
            .await?;
        match result {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => {
                error!("Failed to delete {}: {}", key, e);
                Err(Error::delete(key, e))
            }
        }
    }

    async fn delete_multiple(&self, ctx: &OpContext, keys: &[String]) -> DeleteMultipleOutput {
        if keys.is_empty() {
            return DeleteMultipleOutput::default();
        }

        let mut locations = Vec::with_capacity(keys.len());
        for raw in keys {
            match self.location(raw) {
                Ok((_, location)) => locations.push(location),
                Err(err) => {
                    return DeleteMultipleOutput {
                        failed_keys: keys.to_vec(),
                        error: Some(err),
                    }
                }
            }
        }

        let mut failed_keys = Vec::new();
        for (batch, chunk) in locations.chunks(DELETE_BATCH_SIZE).enumerate() {
            let start = batch * DELETE_BATCH_SIZE;
            let batch_keys = &keys[start..start + chunk.len()];

            let requests = stream::iter(chunk.to_vec().into_iter().map(Ok)).boxed();
            let results = match ctx
                .run(async { Ok(self.store.delete_stream(requests).collect::<Vec<_>>().await) })
                .await
            {
                Ok(results) => results,
                Err(err) => {
                    failed_keys.extend(keys[start..].iter().cloned());
                    return DeleteMultipleOutput {
                        failed_keys,
                        error: Some(err),
                    };
                }
            };

            if results.len() != chunk.len() {
                warn!(
                    "Batch delete returned {} results for {} keys, marking batch failed",
                    results.len(),
                    chunk.len()
                );
                failed_keys.extend(batch_keys.iter().cloned());
                continue;
            }

            for (key, result) in batch_keys.iter().zip(results) {
                match result {
                    Err(e) if !is_not_found(&e) => {
                        warn!("Failed to delete {} in batch: {}", key, e);
                        failed_keys.push(key.clone());
                    }
                    _ => {}
                }
            }
        }

        if failed_keys.is_empty() {
            debug!("Deleted {} objects", keys.len());
            return DeleteMultipleOutput::default();
        }

        let error = Error::batch_delete(failed_keys.len(), keys.len());
        DeleteMultipleOutput {
            failed_keys,
            error: Some(error),
        }
    }

    /// Reads at most `max_keys + 1` entries of the backend listing, which
    /// comes back in key order. The extra entry only decides truncation.
    ///
    /// `object_store` pages the listing itself, so when `max_keys` equals the
    /// backend page size (1000 on S3) the extra entry can cost a second LIST
    /// request. Pages after that are never fetched.
    async fn list(&self, ctx: &OpContext, input: &ListInput) -> Result<ListOutput> {
        ctx.check()?;
        let max_keys = input.effective_max_keys();

        // object_store prefixes match whole segments, the rest is filtered here
        let dir = input
            .prefix
            .rfind('/')
            .map(|i| &input.prefix[..i])
            .unwrap_or("");
        let full_dir = self.full_key(dir);
        let list_prefix = if full_dir.is_empty() {
            None
        } else {
            match Path::parse(&full_dir) {
                Ok(path) => Some(path),
                // No sanitized key can live under an unparseable prefix
                Err(_) => return Ok(ListOutput::default()),
            }
        };
        let offset = if input.start_after.is_empty() {
            None
        } else {
            Path::parse(self.full_key(&input.start_after)).ok()
        };

        debug!("LIST {:?} after {:?}", list_prefix, offset);

        let mut listing = match &offset {
            Some(offset) => self.store.list_with_offset(list_prefix.as_ref(), offset),
            None => self.store.list(list_prefix.as_ref()),
        };

        let mut objects = Vec::new();
        while let Some(entry) = ctx.run(async { Ok(listing.next().await) }).await? {
            let meta = entry.map_err(|e| Error::internal("Failed to list objects", e))?;
            let Some(key) = self.strip_root(&meta.location) else {
                continue;
            };
            if !input.matches(&key) {
                continue;
            }
            objects.push(self.object_info(key, &meta));
            if objects.len() > max_keys {
                break;
            }
        }

        Ok(ListOutput::page(objects, max_keys))
    }

    async fn exists(&self, ctx: &OpContext, key: &str) -> Result<bool> {
        let (key, location) = self.location(key)?;
        ctx.check()?;

        let result = ctx.run(async { Ok(self.store.head(&location).await) }).await?;
        match result {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(Error::internal(
                format!("Failed to check existence of {}", key),
                e,
            )),
        }
    }

    async fn copy(&self, ctx: &OpContext, source_key: &str, dest_key: &str) -> Result<()> {
        let (source_key, source) = self.location(source_key)?;
        let (dest_key, dest) = self.location(dest_key)?;
        ctx.check()?;
        debug!("COPY {} -> {}", source, dest);

        ctx.run(async {
            self.store.copy(&source, &dest).await.map_err(|e| {
                classify(&source_key, e, |k, e| {
                    Error::internal(format!("Failed to copy {}", k), e)
                })
            })
        })
        .await
        .inspect_err(|e| {
            if !e.is_cancelled() && !e.is_not_found() {
                error!("Failed to copy {} to {}: {}", source_key, dest_key, e);
            }
        })
    }

    fn presigner(&self) -> Option<&dyn PresignedUrlGenerator> {
        self.signer
            .as_ref()
            .map(|_| self as &dyn PresignedUrlGenerator)
    }
}

#[async_trait]
impl PresignedUrlGenerator for NetworkStore {
    async fn generate_presigned_url(
        &self,
        ctx: &OpContext,
        key: &str,
        expiration: Duration,
    ) -> Result<String> {
        self.sign(ctx, Method::GET, key, expiration).await
    }

    /// The content type is validated but not bound into the signature; the
    /// uploader should still send it as the `Content-Type` header.
    async fn generate_presigned_upload_url(
        &self,
        ctx: &OpContext,
        key: &str,
        content_type: Option<&str>,
        expiration: Duration,
    ) -> Result<String> {
        if let Some(content_type) = content_type {
            validate_content_type(content_type)?;
        }
        self.sign(ctx, Method::PUT, key, expiration).await
    }
}

fn validate_expiration(expiration: Duration) -> Result<()> {
    if expiration.is_zero() || expiration > MAX_PRESIGN_EXPIRATION {
        return Err(Error::InvalidInput(format!(
            "presign expiration must be within (0, {}s], got {}s",
            MAX_PRESIGN_EXPIRATION.as_secs(),
            expiration.as_secs_f64()
        )));
    }
    Ok(())
}

/// Accepts `type/subtype`, optionally followed by `;` parameters.
fn validate_content_type(content_type: &str) -> Result<()> {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    let valid = match essence.split_once('/') {
        Some((kind, subtype)) => {
            !kind.is_empty()
                && !subtype.is_empty()
                && !subtype.contains('/')
                && !essence.chars().any(|c| c.is_whitespace() || c.is_control())
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "invalid content type {:?}",
            content_type
        )))
    }
}

fn trim_etag(etag: &str) -> String {
    etag.trim_matches('"').to_string()
}
