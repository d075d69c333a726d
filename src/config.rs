//! Store configuration
//!
//! Loaded from YAML; every field is optional and falls back to its default.
//!
//! ```yaml
//! snapshot_path: graph/directory.json
//! share_mode: true
//! lease_duration_secs: 30
//! cache:
//!   ttl_secs: 600
//!   path_prefix: nodes/
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Graph map store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphStoreConfig {
    /// Blob path of the serialized graph
    pub snapshot_path: String,
    /// Time-boxed lease per operation instead of one exclusive lease
    pub share_mode: bool,
    /// Refuse checkpoints and first-use initialisation
    pub read_only: bool,
    /// Duration of a scoped lease
    pub lease_duration_secs: u64,
    pub cache: CacheConfig,
}

impl Default for GraphStoreConfig {
    fn default() -> Self {
        Self {
            snapshot_path: "graph/directory.json".to_string(),
            share_mode: false,
            read_only: false,
            lease_duration_secs: 60,
            cache: CacheConfig::default(),
        }
    }
}

impl GraphStoreConfig {
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let config: GraphStoreConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.snapshot_path.trim().is_empty() || self.snapshot_path.ends_with('/') {
            return Err(ConfigError::Invalid(format!(
                "snapshot_path {:?} does not name a blob",
                self.snapshot_path
            )));
        }
        if self.lease_duration_secs == 0 {
            return Err(ConfigError::Invalid(
                "lease_duration_secs must be positive".to_string(),
            ));
        }
        self.cache.validate()
    }

    pub fn lease_duration(&self) -> Duration {
        Duration::from_secs(self.lease_duration_secs)
    }
}

/// Cache adapter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Sliding expiration
    pub ttl_secs: u64,
    /// Maximum cached blobs
    pub capacity: usize,
    /// Only cache paths under this prefix; `None` caches every path
    pub path_prefix: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 30 * 60,
            capacity: 1024,
            path_prefix: Some("nodes/".to_string()),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.enabled && self.capacity == 0 {
            return Err(ConfigError::Invalid(
                "cache capacity must be positive when the cache is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = GraphStoreConfig::default();
        assert_eq!(config.snapshot_path, "graph/directory.json");
        assert!(!config.share_mode);
        assert!(!config.read_only);
        assert_eq!(config.lease_duration(), Duration::from_secs(60));
        assert_eq!(config.cache.ttl(), Duration::from_secs(1800));
        assert_eq!(config.cache.path_prefix.as_deref(), Some("nodes/"));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = GraphStoreConfig::from_yaml_str(
            "share_mode: true\ncache:\n  ttl_secs: 60\n  path_prefix: null\n",
        )
        .unwrap();
        assert!(config.share_mode);
        assert_eq!(config.lease_duration_secs, 60);
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.cache.capacity, 1024);
        assert!(config.cache.path_prefix.is_none());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            GraphStoreConfig::from_yaml_str("lease_duration_secs: 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            GraphStoreConfig::from_yaml_str("snapshot_path: graph/"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            GraphStoreConfig::from_yaml_str("cache:\n  capacity: 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            GraphStoreConfig::from_yaml_str("share_mode: [1, 2]"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "snapshot_path: tenants/a/graph.json").unwrap();
        writeln!(file, "read_only: true").unwrap();

        let config = GraphStoreConfig::from_file(file.path()).unwrap();
        assert_eq!(config.snapshot_path, "tenants/a/graph.json");
        assert!(config.read_only);

        assert!(matches!(
            GraphStoreConfig::from_file("/nonexistent/graph.yaml"),
            Err(ConfigError::Io { .. })
        ));
    }
}
