//! Top-level configuration file.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::storage::StorageBackendConfig;

/// Main configuration structure
///
/// ```yaml
/// storage:
///   backend: s3
///   bucket: media-assets
///   region: us-east-1
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Storage configuration (supports S3, Filesystem, Memory)
    pub storage: StorageBackendConfig,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_yaml() {
        let config = Config::from_yaml(
            r#"
storage:
  backend: filesystem
  path: /data/blobs
  create_base_path: false
"#,
        )
        .unwrap();

        match config.storage {
            StorageBackendConfig::Filesystem {
                path,
                create_base_path,
                ..
            } => {
                assert_eq!(path, std::path::PathBuf::from("/data/blobs"));
                assert!(!create_base_path);
            }
            _ => panic!("Expected Filesystem config"),
        }
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "storage:\n  backend: memory").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.storage, StorageBackendConfig::Memory);
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let err = Config::from_yaml("storage:\n  backend: ftp").unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = Config::from_file("/nonexistent/blob-store.yaml").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
