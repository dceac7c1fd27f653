//! Storage configuration types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::transfer::TransferConfig;
use crate::error::{Error, Result};

/// Storage backend configuration using tagged enum for type-safe configuration.
///
/// Supports:
/// - S3 and S3-compatible (MinIO, Ceph RGW, etc.)
/// - Local filesystem
/// - In-memory (for testing)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend")]
pub enum StorageBackendConfig {
    /// AWS S3 or S3-compatible storage (MinIO, Ceph RGW, DigitalOcean Spaces, etc.)
    #[serde(rename = "s3")]
    S3 {
        /// S3 bucket name
        bucket: String,
        /// AWS region (e.g., "us-east-1")
        #[serde(default)]
        region: Option<String>,
        /// Custom endpoint URL (for S3-compatible services like MinIO)
        #[serde(default)]
        endpoint: Option<String>,
        /// Access key ID (falls back to AWS_ACCESS_KEY_ID env var)
        #[serde(default)]
        access_key: Option<String>,
        /// Secret access key (falls back to AWS_SECRET_ACCESS_KEY env var)
        #[serde(default)]
        secret_key: Option<String>,
        /// Key prefix for all operations
        #[serde(default)]
        prefix: Option<String>,
        /// Use path-style requests (required for MinIO/Ceph RGW)
        #[serde(default)]
        path_style: bool,
        /// Allow HTTP (insecure) connections
        #[serde(default)]
        allow_http: bool,
        /// Retries for transient failures (default: none)
        #[serde(default)]
        max_retries: usize,
        /// Multipart part sizes and concurrency
        #[serde(default)]
        transfer: TransferConfig,
    },

    /// Local filesystem storage
    #[serde(rename = "filesystem")]
    Filesystem {
        /// Base path for storage
        path: PathBuf,
        /// Create the base path if missing (default: true)
        #[serde(default = "default_create_base_path")]
        create_base_path: bool,
        /// Permission bits for created directories (default: 0o755)
        #[serde(default = "default_dir_mode")]
        dir_mode: u32,
    },

    /// In-memory storage (for testing)
    #[serde(rename = "memory")]
    Memory,
}

fn default_create_base_path() -> bool {
    true
}

fn default_dir_mode() -> u32 {
    0o755
}

impl StorageBackendConfig {
    /// Filesystem configuration with default options
    pub fn filesystem(path: impl Into<PathBuf>) -> Self {
        Self::Filesystem {
            path: path.into(),
            create_base_path: default_create_base_path(),
            dir_mode: default_dir_mode(),
        }
    }

    /// Parse configuration from a URL string
    ///
    /// Supported URL formats:
    /// - `s3://bucket-name/optional/prefix?region=us-east-1&endpoint=http://localhost:9000&path_style=true`
    /// - `file:///path/to/data`
    /// - `memory://`
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed =
            url::Url::parse(url).map_err(|e| Error::Config(format!("Invalid storage URL: {}", e)))?;

        match parsed.scheme() {
            "s3" | "s3a" => {
                let bucket = parsed.host_str().unwrap_or_default().to_string();
                if bucket.is_empty() {
                    return Err(Error::Config(format!("Missing bucket in URL: {}", url)));
                }
                let query = |name: &str| {
                    parsed
                        .query_pairs()
                        .find(|(k, _)| k == name)
                        .map(|(_, v)| v.to_string())
                };
                let flag = |name: &str| query(name).is_some_and(|v| v == "true");

                let endpoint = query("endpoint");
                let allow_http = flag("allow_http")
                    || endpoint.as_ref().is_some_and(|e| e.starts_with("http://"));
                let max_retries = match query("max_retries") {
                    Some(v) => v
                        .parse()
                        .map_err(|_| Error::Config(format!("Invalid max_retries: {}", v)))?,
                    None => 0,
                };
                let prefix = Some(parsed.path().trim_matches('/').to_string())
                    .filter(|p| !p.is_empty());

                Ok(Self::S3 {
                    bucket,
                    region: query("region"),
                    endpoint,
                    access_key: std::env::var("AWS_ACCESS_KEY_ID").ok(),
                    secret_key: std::env::var("AWS_SECRET_ACCESS_KEY").ok(),
                    prefix,
                    path_style: flag("path_style"),
                    allow_http,
                    max_retries,
                    transfer: TransferConfig::default(),
                })
            }
            "file" => Ok(Self::filesystem(parsed.path())),
            "memory" => Ok(Self::Memory),
            scheme => Err(Error::Config(format!("Unknown storage scheme: {}", scheme))),
        }
    }

    /// Short backend name
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::S3 { .. } => "s3",
            Self::Filesystem { .. } => "filesystem",
            Self::Memory => "memory",
        }
    }

    /// Get the prefix for this storage configuration
    pub fn prefix(&self) -> Option<&str> {
        match self {
            Self::S3 { prefix, .. } => prefix.as_deref(),
            Self::Filesystem { .. } => None,
            Self::Memory => None,
        }
    }
}
