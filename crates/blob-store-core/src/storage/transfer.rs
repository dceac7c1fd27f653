//! Multipart upload and ranged parallel download over `object_store`.

use std::io::SeekFrom;
use std::ops::Range;

use bytes::Bytes;
use futures::{stream, StreamExt};
use object_store::path::Path;
use object_store::{
    Attributes, ObjectStore, PutMultipartOpts, PutOptions, PutPayload, PutResult, WriteMultipart,
};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, warn};

use super::backend::DownloadSink;
use super::network::classify;
use crate::context::OpContext;
use crate::error::{Error, Result};

/// Smallest part size accepted by S3 multipart uploads (5 MiB).
pub const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// Default part size for both directions (10 MiB).
pub const DEFAULT_PART_SIZE: usize = 10 * 1024 * 1024;

/// Default number of parts in flight.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Part sizes and concurrency for networked transfers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Bytes per uploaded part; values under 5 MiB are ignored
    pub upload_part_size: usize,
    /// Uploaded parts in flight
    pub upload_concurrency: usize,
    /// Bytes per ranged GET; values under 5 MiB are ignored
    pub download_part_size: usize,
    /// Ranged GETs in flight
    pub download_concurrency: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            upload_part_size: DEFAULT_PART_SIZE,
            upload_concurrency: DEFAULT_CONCURRENCY,
            download_part_size: DEFAULT_PART_SIZE,
            download_concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl TransferConfig {
    /// Replace out-of-range values with defaults, warning about each.
    pub fn normalized(self) -> Self {
        let defaults = Self::default();
        let part_size = |name: &str, value: usize, default: usize| {
            if value < MIN_PART_SIZE {
                warn!(
                    "Ignoring {} of {} bytes (minimum {}), using {}",
                    name, value, MIN_PART_SIZE, default
                );
                default
            } else {
                value
            }
        };
        let concurrency = |name: &str, value: usize, default: usize| {
            if value == 0 {
                warn!("Ignoring {} of 0, using {}", name, default);
                default
            } else {
                value
            }
        };

        Self {
            upload_part_size: part_size(
                "upload_part_size",
                self.upload_part_size,
                defaults.upload_part_size,
            ),
            upload_concurrency: concurrency(
                "upload_concurrency",
                self.upload_concurrency,
                defaults.upload_concurrency,
            ),
            download_part_size: part_size(
                "download_part_size",
                self.download_part_size,
                defaults.download_part_size,
            ),
            download_concurrency: concurrency(
                "download_concurrency",
                self.download_concurrency,
                defaults.download_concurrency,
            ),
        }
    }
}

/// Streams a body into an object, switching to multipart past one part.
pub(crate) struct Uploader<'a> {
    store: &'a dyn ObjectStore,
    part_size: usize,
    concurrency: usize,
}

impl<'a> Uploader<'a> {
    pub(crate) fn new(store: &'a dyn ObjectStore, config: &TransferConfig) -> Self {
        Self {
            store,
            part_size: config.upload_part_size,
            concurrency: config.upload_concurrency,
        }
    }

    #[cfg(test)]
    fn with_part_size(mut self, part_size: usize) -> Self {
        self.part_size = part_size;
        self
    }

    /// Upload `body` to `location`, returning the put result and byte count.
    pub(crate) async fn upload(
        &self,
        ctx: &OpContext,
        key: &str,
        location: &Path,
        body: &mut (dyn AsyncRead + Unpin + Send),
        attributes: Attributes,
    ) -> Result<(PutResult, u64)> {
        let mut part = Vec::new();
        self.read_part(ctx, key, body, &mut part).await?;

        if part.len() < self.part_size {
            let size = part.len() as u64;
            let payload = PutPayload::from(Bytes::from(part));
            let opts = PutOptions {
                attributes,
                ..Default::default()
            };
            debug!("PUT {} ({} bytes)", location, size);
            let result = ctx
                .run(async {
                    self.store
                        .put_opts(location, payload, opts)
                        .await
                        .map_err(|e| Error::upload(key, e))
                })
                .await?;
            return Ok((result, size));
        }

        let opts = PutMultipartOpts {
            attributes,
            ..Default::default()
        };
        let upload = ctx
            .run(async {
                self.store
                    .put_multipart_opts(location, opts)
                    .await
                    .map_err(|e| Error::upload(key, e))
            })
            .await?;
        debug!("Started multipart upload for {}", location);

        let mut writer = WriteMultipart::new_with_chunk_size(upload, self.part_size);
        let size = match self.write_parts(ctx, key, body, &mut writer, part).await {
            Ok(size) => size,
            Err(err) => {
                warn!("Aborting multipart upload for {}: {}", key, err);
                if let Err(abort_err) = writer.abort().await {
                    warn!("Failed to abort multipart upload for {}: {}", key, abort_err);
                }
                return Err(err);
            }
        };

        // A cancel while completing leaves cleanup to the bucket lifecycle
        let result = ctx
            .run(async { writer.finish().await.map_err(|e| Error::upload(key, e)) })
            .await?;
        debug!("Completed multipart upload for {} ({} bytes)", location, size);
        Ok((result, size))
    }

    async fn write_parts(
        &self,
        ctx: &OpContext,
        key: &str,
        body: &mut (dyn AsyncRead + Unpin + Send),
        writer: &mut WriteMultipart,
        first: Vec<u8>,
    ) -> Result<u64> {
        let mut part = first;
        let mut total = 0u64;
        loop {
            writer.write(&part);
            total += part.len() as u64;
            ctx.run(async {
                writer
                    .wait_for_capacity(self.concurrency)
                    .await
                    .map_err(|e| Error::upload(key, e))
            })
            .await?;

            part.clear();
            self.read_part(ctx, key, body, &mut part).await?;
            if part.is_empty() {
                return Ok(total);
            }
        }
    }

    /// Fill `buf` with up to one part, short only at end of stream.
    async fn read_part(
        &self,
        ctx: &OpContext,
        key: &str,
        body: &mut (dyn AsyncRead + Unpin + Send),
        buf: &mut Vec<u8>,
    ) -> Result<()> {
        let mut reader = (&mut *body).take(self.part_size as u64);
        ctx.run(async {
            reader
                .read_to_end(buf)
                .await
                .map(|_| ())
                .map_err(|e| Error::upload(key, e))
        })
        .await
    }
}

/// Fetches an object as concurrent ranged GETs into a seekable sink.
pub(crate) struct Downloader<'a> {
    store: &'a dyn ObjectStore,
    part_size: usize,
    concurrency: usize,
}

impl<'a> Downloader<'a> {
    pub(crate) fn new(store: &'a dyn ObjectStore, config: &TransferConfig) -> Self {
        Self {
            store,
            part_size: config.download_part_size,
            concurrency: config.download_concurrency,
        }
    }

    #[cfg(test)]
    fn with_part_size(mut self, part_size: usize) -> Self {
        self.part_size = part_size;
        self
    }

    /// Download `location` into `sink`, returning the number of bytes written.
    pub(crate) async fn download(
        &self,
        ctx: &OpContext,
        key: &str,
        location: &Path,
        sink: &mut dyn DownloadSink,
    ) -> Result<u64> {
        let meta = ctx
            .run(async {
                self.store
                    .head(location)
                    .await
                    .map_err(|e| classify(key, e, |k, e| Error::download(k, e)))
            })
            .await?;

        let ranges = split_ranges(meta.size, self.part_size);
        debug!(
            "GET {} ({} bytes in {} parts)",
            location,
            meta.size,
            ranges.len()
        );

        let store = self.store;
        let mut parts = stream::iter(ranges)
            .map(|range| async move {
                let offset = range.start;
                (offset, store.get_range(location, range).await)
            })
            .buffer_unordered(self.concurrency);

        let mut written = 0u64;
        while let Some((offset, data)) = ctx.run(async { Ok(parts.next().await) }).await? {
            let data = data.map_err(|e| classify(key, e, |k, e| Error::download(k, e)))?;
            sink.seek(SeekFrom::Start(offset as u64))
                .await
                .map_err(|e| Error::download(key, e))?;
            sink.write_all(&data)
                .await
                .map_err(|e| Error::download(key, e))?;
            written += data.len() as u64;
        }

        sink.flush().await.map_err(|e| Error::download(key, e))?;
        Ok(written)
    }
}

/// Split `0..size` into consecutive ranges of at most `part_size` bytes.
fn split_ranges(size: usize, part_size: usize) -> Vec<Range<usize>> {
    (0..size)
        .step_by(part_size.max(1))
        .map(|start| start..(start + part_size).min(size))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;
    use object_store::{Attribute, GetOptions};
    use std::io::Cursor;

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_split_ranges() {
        assert_eq!(split_ranges(0, 4), Vec::<Range<usize>>::new());
        assert_eq!(split_ranges(4, 4), vec![0..4]);
        assert_eq!(split_ranges(10, 4), vec![0..4, 4..8, 8..10]);
    }

    #[test]
    fn test_small_part_sizes_are_ignored() {
        let config = TransferConfig {
            upload_part_size: 1024,
            upload_concurrency: 0,
            download_part_size: 8 * 1024 * 1024,
            download_concurrency: 2,
        }
        .normalized();

        assert_eq!(config.upload_part_size, DEFAULT_PART_SIZE);
        assert_eq!(config.upload_concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.download_part_size, 8 * 1024 * 1024);
        assert_eq!(config.download_concurrency, 2);
    }

    #[tokio::test]
    async fn test_small_body_is_single_put() {
        let store = InMemory::new();
        let ctx = OpContext::background();
        let location = Path::from("small.txt");
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, "text/plain".into());

        let mut body = Cursor::new(b"tiny".to_vec());
        let (_, size) = Uploader::new(&store, &TransferConfig::default())
            .upload(&ctx, "small.txt", &location, &mut body, attributes)
            .await
            .unwrap();

        assert_eq!(size, 4);
        let opts = GetOptions {
            head: true,
            ..Default::default()
        };
        let result = store.get_opts(&location, opts).await.unwrap();
        assert_eq!(
            result.attributes.get(&Attribute::ContentType).map(|v| v.to_string()),
            Some("text/plain".to_string())
        );
    }

    #[tokio::test]
    async fn test_multipart_upload_round_trips() {
        let store = InMemory::new();
        let ctx = OpContext::background();
        let location = Path::from("big.bin");
        let data = payload(10_000);

        let mut body = Cursor::new(data.clone());
        let (_, size) = Uploader::new(&store, &TransferConfig::default())
            .with_part_size(1024)
            .upload(&ctx, "big.bin", &location, &mut body, Attributes::new())
            .await
            .unwrap();

        assert_eq!(size, 10_000);
        let stored = store.get(&location).await.unwrap().bytes().await.unwrap();
        assert_eq!(stored.as_ref(), data.as_slice());
    }

    #[tokio::test]
    async fn test_cancelled_upload_writes_nothing() {
        let store = InMemory::new();
        let ctx = OpContext::background();
        ctx.cancel();
        let location = Path::from("never.bin");

        let mut body = Cursor::new(payload(4096));
        let err = Uploader::new(&store, &TransferConfig::default())
            .with_part_size(1024)
            .upload(&ctx, "never.bin", &location, &mut body, Attributes::new())
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(store.head(&location).await.is_err());
    }

    #[tokio::test]
    async fn test_ranged_download_reassembles() {
        let store = InMemory::new();
        let ctx = OpContext::background();
        let location = Path::from("parts.bin");
        let data = payload(9_999);
        store
            .put(&location, PutPayload::from(data.clone()))
            .await
            .unwrap();

        let mut sink = Cursor::new(Vec::new());
        let written = Downloader::new(&store, &TransferConfig::default())
            .with_part_size(100)
            .download(&ctx, "parts.bin", &location, &mut sink)
            .await
            .unwrap();

        assert_eq!(written, 9_999);
        assert_eq!(sink.into_inner(), data);
    }

    #[tokio::test]
    async fn test_download_missing_object() {
        let store = InMemory::new();
        let ctx = OpContext::background();

        let mut sink = Cursor::new(Vec::new());
        let err = Downloader::new(&store, &TransferConfig::default())
            .download(&ctx, "gone", &Path::from("gone"), &mut sink)
            .await
            .unwrap_err();

        assert!(err.is_not_found());
    }
}
