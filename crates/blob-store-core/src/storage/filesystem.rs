//! Filesystem storage backend implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::{self, SeekFrom};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info, warn};

use super::backend::{
    DeleteMultipleOutput, DownloadSink, ListInput, ListOutput, ObjectInfo, ObjectReader, Store,
    UploadInput, UploadOutput,
};
use super::content_type::content_type_for;
use super::key::sanitize_key;
use crate::context::OpContext;
use crate::error::{Error, Result};

/// Prefix of in-flight upload files, created beside their final path.
pub const TEMP_FILE_PREFIX: &str = ".tmp-";

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Options for [`FilesystemStore::with_options`].
#[derive(Debug, Clone)]
pub struct FilesystemOptions {
    /// Create the base path if it does not exist (otherwise it must exist)
    pub create_base_path: bool,
    /// Unix permission bits for directories created by the store
    pub dir_mode: u32,
}

impl Default for FilesystemOptions {
    fn default() -> Self {
        Self {
            create_base_path: true,
            dir_mode: 0o755,
        }
    }
}

/// Filesystem-based blob store.
///
/// Objects are plain files at `{base_path}/{key}`, with key separators used as
/// directories. Writes go to a temporary file in the target directory and
/// are renamed into place, so readers never observe a partial object.
///
/// One reader-writer lock guards the whole tree: every mutation is exclusive,
/// reads are shared. Two uploads to different keys still run one after the
/// other.
///
/// This backend has no signed URL capability.
#[derive(Debug)]
pub struct FilesystemStore {
    base_path: PathBuf,
    dir_mode: u32,
    lock: RwLock<()>,
}

impl FilesystemStore {
    /// Create a filesystem store rooted at `base_path`, creating it if needed.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_options(base_path, FilesystemOptions::default())
    }

    pub fn with_options(base_path: impl Into<PathBuf>, options: FilesystemOptions) -> Result<Self> {
        let base_path = base_path.into();
        if base_path.as_os_str().is_empty() {
            return Err(Error::Config("Filesystem base path is required".to_string()));
        }

        let base_path = if base_path.is_absolute() {
            base_path
        } else {
            std::env::current_dir()
                .map_err(|e| Error::Config(format!("Failed to resolve base path: {}", e)))?
                .join(base_path)
        };

        if options.create_base_path {
            create_dir_all_sync(&base_path, options.dir_mode).map_err(|e| {
                Error::Config(format!(
                    "Failed to create base path {}: {}",
                    base_path.display(),
                    e
                ))
            })?;
        } else {
            let metadata = std::fs::metadata(&base_path).map_err(|e| {
                Error::Config(format!(
                    "Base path {} does not exist: {}",
                    base_path.display(),
                    e
                ))
            })?;
            if !metadata.is_dir() {
                return Err(Error::Config(format!(
                    "Base path {} is not a directory",
                    base_path.display()
                )));
            }
        }

        info!("Filesystem blob store initialized at {}", base_path.display());

        Ok(Self {
            base_path,
            dir_mode: options.dir_mode,
            lock: RwLock::new(()),
        })
    }

    /// Root directory of the store
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Sanitize a key and map it to its file path
    fn key_to_path(&self, key: &str) -> Result<(String, PathBuf)> {
        let key = sanitize_key(key)?;
        let path = self.base_path.join(&key);
        Ok((key, path))
    }

    /// Convert a file path under the root back to a `/`-separated key
    fn path_to_key(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.base_path).ok()?;
        let parts = relative
            .components()
            .map(|c| match c {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()?;
        Some(parts.join("/"))
    }

    /// Shared lock, abandoned if `ctx` finishes first.
    async fn read_lock(&self, ctx: &OpContext) -> Result<RwLockReadGuard<'_, ()>> {
        ctx.run(async { Ok(self.lock.read().await) }).await
    }

    /// Exclusive lock, abandoned if `ctx` finishes first.
    async fn write_lock(&self, ctx: &OpContext) -> Result<RwLockWriteGuard<'_, ()>> {
        ctx.run(async { Ok(self.lock.write().await) }).await
    }

    async fn create_dirs(&self, dir: &Path) -> io::Result<()> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(self.dir_mode);
        builder.create(dir).await
    }

    /// Open an object file, treating directories as missing.
    async fn open_object(&self, key: &str, path: &Path) -> Result<fs::File> {
        let file = fs::File::open(path)
            .await
            .map_err(|e| classify_io(key, e, |k, e| Error::download(k, e)))?;
        let metadata = file
            .metadata()
            .await
            .map_err(|e| Error::download(key, e))?;
        if metadata.is_dir() {
            return Err(Error::NotFound(key.to_string()));
        }
        Ok(file)
    }

    /// Stream `reader` into a temp file beside `path` and rename it over `path`.
    ///
    /// Returns the byte count and SHA-256 of what was written. The temp file
    /// is removed on every failure path. Read errors are mapped with
    /// `read_err`, write errors become `UploadFailed` for `key`.
    async fn write_atomic(
        &self,
        ctx: &OpContext,
        key: &str,
        path: &Path,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        read_err: impl Fn(io::Error) -> Error + Send + Sync,
    ) -> Result<(u64, String)> {
        let dir = path.parent().unwrap_or(&self.base_path);
        self.create_dirs(dir).await.map_err(|e| {
            error!("Failed to create directory {}: {}", dir.display(), e);
            Error::upload(key, e)
        })?;

        let (file, temp_path) = tempfile::Builder::new()
            .prefix(TEMP_FILE_PREFIX)
            .tempfile_in(dir)
            .map_err(|e| Error::upload(key, e))?
            .into_parts();
        let mut file = fs::File::from_std(file);

        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
        let mut written = 0u64;
        loop {
            // A stalled body must not outlive the deadline
            let n = ctx
                .run(async { reader.read(&mut buffer).await.map_err(&read_err) })
                .await?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
            file.write_all(&buffer[..n])
                .await
                .map_err(|e| Error::upload(key, e))?;
            written += n as u64;
        }

        file.flush().await.map_err(|e| Error::upload(key, e))?;
        file.sync_all().await.map_err(|e| Error::upload(key, e))?;
        drop(file);

        temp_path
            .persist(path)
            .map_err(|e| Error::upload(key, e.error))?;

        Ok((written, hex::encode(hasher.finalize())))
    }

    async fn remove_file(&self, key: &str, path: &Path) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => {
                debug!("Deleted {}", key);
                Ok(())
            }
            // Already deleted
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                error!("Failed to delete file {}: {}", path.display(), e);
                Err(Error::delete(key, e))
            }
        }
    }

    async fn hash_file(&self, ctx: &OpContext, key: &str, path: &Path) -> Result<String> {
        let mut file = fs::File::open(path)
            .await
            .map_err(|e| classify_io(key, e, |k, e| Error::internal(format!("Failed to open {}", k), e)))?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
        loop {
            ctx.check()?;
            let n = file
                .read(&mut buffer)
                .await
                .map_err(|e| Error::internal(format!("Failed to read {}", key), e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }
        Ok(hex::encode(hasher.finalize()))
    }
}

#[async_trait]
impl Store for FilesystemStore {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    async fn upload(&self, ctx: &OpContext, input: UploadInput) -> Result<UploadOutput> {
        let (key, path) = self.key_to_path(&input.key)?;
        ctx.check()?;

        let mut body = input.body;
        let _guard = self.write_lock(ctx).await?;

        let (written, etag) = self
            .write_atomic(ctx, &key, &path, body.as_mut(), |e| Error::upload(key.as_str(), e))
            .await
            .inspect_err(|e| {
                if !e.is_cancelled() {
                    error!("Failed to upload {}: {}", key, e);
                }
            })?;

        debug!("Uploaded {} ({} bytes)", key, written);

        Ok(UploadOutput {
            location: path.display().to_string(),
            version_id: None,
            etag,
        })
    }

    /// Reads the whole object into memory before writing it to `sink`, so
    /// object size is bounded by available memory on this backend.
    async fn download(
        &self,
        ctx: &OpContext,
        key: &str,
        sink: &mut dyn DownloadSink,
    ) -> Result<u64> {
        let (key, path) = self.key_to_path(key)?;
        ctx.check()?;

        let data = {
            let _guard = self.read_lock(ctx).await?;
            let mut file = self.open_object(&key, &path).await?;
            ctx.check()?;
            let mut data = Vec::new();
            file.read_to_end(&mut data).await.map_err(|e| {
                error!("Failed to read file {}: {}", path.display(), e);
                Error::download(key.as_str(), e)
            })?;
            data
        };

        sink.seek(SeekFrom::Start(0))
            .await
            .map_err(|e| Error::download(key.as_str(), e))?;
        sink.write_all(&data)
            .await
            .map_err(|e| Error::download(key.as_str(), e))?;
        sink.flush()
            .await
            .map_err(|e| Error::download(key.as_str(), e))?;

        debug!("Downloaded {} ({} bytes)", key, data.len());
        Ok(data.len() as u64)
    }

    async fn get_object(&self, ctx: &OpContext, key: &str) -> Result<ObjectReader> {
        let (key, path) = self.key_to_path(key)?;
        ctx.check()?;

        let _guard = self.read_lock(ctx).await?;
        let file = self.open_object(&key, &path).await?;
        Ok(Box::new(file))
    }

    async fn head_object(&self, ctx: &OpContext, key: &str) -> Result<ObjectInfo> {
        let (key, path) = self.key_to_path(key)?;
        ctx.check()?;

        let _guard = self.read_lock(ctx).await?;
        let metadata = fs::metadata(&path).await.map_err(|e| {
            classify_io(&key, e, |k, e| {
                Error::internal(format!("Failed to get object info for {}", k), e)
            })
        })?;
        if metadata.is_dir() {
            return Err(Error::NotFound(key));
        }

        let etag = self.hash_file(ctx, &key, &path).await?;
        let content_type = content_type_for(&key).to_string();

        Ok(ObjectInfo {
            key,
            size: metadata.len(),
            content_type,
            etag: Some(etag),
            last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            metadata: HashMap::new(),
        })
    }

    async fn delete(&self, ctx: &OpContext, key: &str) -> Result<()> {
        let (key, path) = self.key_to_path(key)?;
        ctx.check()?;

        let _guard = self.write_lock(ctx).await?;
        self.remove_file(&key, &path).await
    }

    async fn delete_multiple(&self, ctx: &OpContext, keys: &[String]) -> DeleteMultipleOutput {
        if keys.is_empty() {
            return DeleteMultipleOutput::default();
        }

        // Reject the whole batch before touching the filesystem
        let mut resolved = Vec::with_capacity(keys.len());
        for raw in keys {
            match self.key_to_path(raw) {
                Ok(entry) => resolved.push(entry),
                Err(err) => {
                    return DeleteMultipleOutput {
                        failed_keys: keys.to_vec(),
                        error: Some(err),
                    }
                }
            }
        }

        let mut failed_keys = Vec::new();
        for (i, (key, path)) in resolved.iter().enumerate() {
            if let Err(err) = ctx.check() {
                failed_keys.extend(keys[i..].iter().cloned());
                return DeleteMultipleOutput {
                    failed_keys,
                    error: Some(err),
                };
            }

            let _guard = match self.write_lock(ctx).await {
                Ok(guard) => guard,
                Err(err) => {
                    failed_keys.extend(keys[i..].iter().cloned());
                    return DeleteMultipleOutput {
                        failed_keys,
                        error: Some(err),
                    };
                }
            };
            if let Err(err) = self.remove_file(key, path).await {
                warn!("Failed to delete {} in batch: {}", key, err);
                failed_keys.push(keys[i].clone());
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

    /// Walks the whole tree, then sorts the filtered set before cutting the
    /// page. No snapshot is taken: concurrent writers may or may not be seen.
    async fn list(&self, ctx: &OpContext, input: &ListInput) -> Result<ListOutput> {
        ctx.check()?;
        let max_keys = input.effective_max_keys();

        let _guard = self.read_lock(ctx).await?;
        let mut objects = Vec::new();
        let mut stack = vec![self.base_path.clone()];

        while let Some(dir) = stack.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    error!("Failed to read directory {}: {}", dir.display(), e);
                    return Err(Error::internal(
                        format!("Failed to read directory {}", dir.display()),
                        e,
                    ));
                }
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| Error::internal("Failed to read directory entry", e))?
            {
                ctx.check()?;

                let file_type = match entry.file_type().await {
                    Ok(file_type) => file_type,
                    Err(_) => continue,
                };
                let entry_path = entry.path();
                if file_type.is_dir() {
                    stack.push(entry_path);
                    continue;
                }
                if !file_type.is_file() {
                    continue;
                }

                // Leftovers of an interrupted upload
                if entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.starts_with(TEMP_FILE_PREFIX))
                {
                    continue;
                }

                let Some(key) = self.path_to_key(&entry_path) else {
                    continue;
                };
                if !input.matches(&key) {
                    continue;
                }

                // Skip files removed or unreadable mid-walk
                let Ok(metadata) = entry.metadata().await else {
                    continue;
                };

                let content_type = content_type_for(&key).to_string();
                objects.push(ObjectInfo {
                    key,
                    size: metadata.len(),
                    content_type,
                    etag: None,
                    last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
                    metadata: HashMap::new(),
                });
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(ListOutput::page(objects, max_keys))
    }

    async fn exists(&self, ctx: &OpContext, key: &str) -> Result<bool> {
        let (key, path) = self.key_to_path(key)?;
        ctx.check()?;

        let _guard = self.read_lock(ctx).await?;
        match fs::metadata(&path).await {
            Ok(metadata) => Ok(!metadata.is_dir()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::internal(
                format!("Failed to get object info for {}", key),
                e,
            )),
        }
    }

    async fn copy(&self, ctx: &OpContext, source_key: &str, dest_key: &str) -> Result<()> {
        let (source_key, source_path) = self.key_to_path(source_key)?;
        let (dest_key, dest_path) = self.key_to_path(dest_key)?;
        ctx.check()?;

        let _guard = self.write_lock(ctx).await?;
        let mut source = self.open_object(&source_key, &source_path).await?;

        self.write_atomic(ctx, &dest_key, &dest_path, &mut source, |e| {
            Error::download(source_key.as_str(), e)
        })
        .await
        .inspect_err(|e| {
            if !e.is_cancelled() {
                error!("Failed to copy {} to {}: {}", source_key, dest_key, e);
            }
        })?;

        debug!("Copied {} to {}", source_key, dest_key);
        Ok(())
    }
}

/// Map a missing path to `NotFound`, anything else through `wrap`.
fn classify_io(key: &str, err: io::Error, wrap: fn(&str, io::Error) -> Error) -> Error {
    if err.kind() == io::ErrorKind::NotFound {
        Error::NotFound(key.to_string())
    } else {
        wrap(key, err)
    }
}

fn create_dir_all_sync(path: &Path, mode: u32) -> io::Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    builder.create(path)
}
