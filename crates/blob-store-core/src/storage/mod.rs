//! Blob storage abstraction and implementations.
//!
//! One [`Store`] contract with two backends:
//!
//! - **Filesystem**: objects as files under a root directory
//! - **Network**: any `object_store` implementation, used for S3 and
//!   S3-compatible services (MinIO, Ceph RGW, etc.) and for in-memory testing
//!
//! The S3 backend additionally implements [`PresignedUrlGenerator`], reachable
//! through [`Store::presigner`].

mod backend;
mod config;
mod content_type;
mod filesystem;
mod key;
mod memory;
mod network;
mod s3;
mod transfer;

pub use backend::{
    DeleteMultipleOutput, DownloadSink, ListInput, ListOutput, ObjectInfo, ObjectReader,
    PresignedUrlGenerator, Store, UploadInput, UploadOutput, DEFAULT_MAX_KEYS,
};
pub use config::StorageBackendConfig;
pub use content_type::{content_type_for, DEFAULT_CONTENT_TYPE};
pub use filesystem::{FilesystemOptions, FilesystemStore, TEMP_FILE_PREFIX};
pub use key::sanitize_key;
pub use network::{is_not_found, NetworkStore, DELETE_BATCH_SIZE, MAX_PRESIGN_EXPIRATION};
pub use s3::S3Config;
pub use transfer::{TransferConfig, DEFAULT_CONCURRENCY, DEFAULT_PART_SIZE, MIN_PART_SIZE};

use crate::Result;
use std::sync::Arc;

/// Create a store from configuration.
///
/// # Example
///
/// ```rust,ignore
/// use blob_store_core::storage::{create_store, StorageBackendConfig};
///
/// let config = StorageBackendConfig::Memory;
/// let store = create_store(&config)?;
/// ```
pub fn create_store(config: &StorageBackendConfig) -> Result<Arc<dyn Store>> {
    match config {
        StorageBackendConfig::S3 {
            bucket,
            region,
            endpoint,
            access_key,
            secret_key,
            prefix,
            path_style,
            allow_http,
            max_retries,
            transfer,
        } => {
            let s3_config = S3Config {
                bucket: bucket.clone(),
                region: region.clone(),
                endpoint: endpoint.clone(),
                access_key_id: access_key.clone(),
                secret_access_key: secret_key.clone(),
                prefix: prefix.clone(),
                path_style: *path_style,
                allow_http: *allow_http,
                max_retries: *max_retries,
                transfer: *transfer,
            };
            Ok(Arc::new(NetworkStore::s3(s3_config)?))
        }

        StorageBackendConfig::Filesystem {
            path,
            create_base_path,
            dir_mode,
        } => {
            let options = FilesystemOptions {
                create_base_path: *create_base_path,
                dir_mode: *dir_mode,
            };
            Ok(Arc::new(FilesystemStore::with_options(path.clone(), options)?))
        }

        StorageBackendConfig::Memory => Ok(Arc::new(NetworkStore::in_memory())),
    }
}
