//! S3-compatible storage backend using object_store.

use object_store::aws::AmazonS3Builder;
use object_store::RetryConfig;
use std::sync::Arc;
use tracing::info;

use super::network::NetworkStore;
use super::transfer::TransferConfig;
use crate::error::{Error, Result};

/// S3 storage backend configuration
#[derive(Debug, Clone)]
pub struct S3Config {
    /// S3 bucket name
    pub bucket: String,
    /// AWS region
    pub region: Option<String>,
    /// Custom endpoint (for S3-compatible services like MinIO)
    pub endpoint: Option<String>,
    /// Access key ID
    pub access_key_id: Option<String>,
    /// Secret access key
    pub secret_access_key: Option<String>,
    /// Key prefix for all operations
    pub prefix: Option<String>,
    /// Use path-style requests instead of virtual-hosted buckets
    pub path_style: bool,
    /// Allow HTTP (insecure) connections
    pub allow_http: bool,
    /// Retries for transient failures; 0 disables retrying
    pub max_retries: usize,
    /// Multipart part sizes and concurrency
    pub transfer: TransferConfig,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: Some("us-east-1".to_string()),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            prefix: None,
            path_style: false,
            allow_http: false,
            max_retries: 0,
            transfer: TransferConfig::default(),
        }
    }
}

impl NetworkStore {
    /// Create an S3 store that can also presign URLs.
    ///
    /// Unset credentials and region fall back to the standard `AWS_*`
    /// environment variables.
    pub fn s3(config: S3Config) -> Result<Self> {
        if config.bucket.is_empty() {
            return Err(Error::Config("S3 bucket is required".to_string()));
        }

        let mut builder = AmazonS3Builder::from_env().with_bucket_name(&config.bucket);

        if let Some(region) = &config.region {
            builder = builder.with_region(region);
        }

        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }

        if let Some(access_key) = &config.access_key_id {
            builder = builder.with_access_key_id(access_key);
        }

        if let Some(secret_key) = &config.secret_access_key {
            builder = builder.with_secret_access_key(secret_key);
        }

        builder = builder
            .with_virtual_hosted_style_request(!config.path_style)
            .with_allow_http(config.allow_http)
            .with_retry(RetryConfig {
                max_retries: config.max_retries,
                ..Default::default()
            });

        let s3 = Arc::new(
            builder
                .build()
                .map_err(|e| Error::Config(format!("Failed to create S3 client: {}", e)))?,
        );

        info!(
            "Created S3 store for bucket: {}, prefix: {:?}",
            config.bucket, config.prefix
        );

        let store = Self::new("s3", s3.clone(), format!("s3://{}", config.bucket))
            .with_signer(s3)
            .with_transfer_config(config.transfer);

        match &config.prefix {
            Some(prefix) => store.with_prefix(prefix),
            None => Ok(store),
        }
    }
}
