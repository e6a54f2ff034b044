//! Configuration for indexsync

use crate::SyncError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration as TOML
pub const DEFAULT_CONFIG: &str = r#"# Indexsync Configuration

[repository]
# Path to the SQLite copy of the repository catalog
catalog_path = "catalog.db"
# Zone assumed for ACL entries that do not name one
zone = "tempZone"
# How long a session waits on a locked catalog before failing (milliseconds)
busy_timeout_ms = 5000

[store]
# Document store backend: "sqlite" (embedded) or "http" (Elasticsearch-compatible)
backend = "sqlite"
# Database file for the sqlite backend
path = "index.db"
# Base URL and index name for the http backend
url = "http://localhost:9200"
index = "data"
# Request timeout for the http backend (seconds)
timeout_secs = 30

[consumer]
# Worker threads used when replaying event logs
workers = 4
# Bounded queue between the reader and the workers
queue_capacity = 64

[logging]
# Filter directive, overridden by RUST_LOG
filter = "info"
"#;

/// Indexsync configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub repository: RepositoryConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub consumer: ConsumerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection settings handed to every repository session open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,
    #[serde(default = "default_zone")]
    pub zone: String,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sqlite,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackend,
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(default = "default_store_url")]
    pub url: String,
    #[serde(default = "default_store_index")]
    pub index: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_filter")]
    pub filter: String,
}

// Default value functions
fn default_catalog_path() -> PathBuf {
    PathBuf::from("catalog.db")
}
fn default_zone() -> String {
    "tempZone".to_string()
}
fn default_busy_timeout_ms() -> u64 {
    5000
}
fn default_store_backend() -> StoreBackend {
    StoreBackend::Sqlite
}
fn default_store_path() -> PathBuf {
    PathBuf::from("index.db")
}
fn default_store_url() -> String {
    "http://localhost:9200".to_string()
}
fn default_store_index() -> String {
    "data".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_workers() -> usize {
    4
}
fn default_queue_capacity() -> usize {
    64
}
fn default_filter() -> String {
    "info".to_string()
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            catalog_path: default_catalog_path(),
            zone: default_zone(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: default_store_path(),
            url: default_store_url(),
            index: default_store_index(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl RepositoryConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load config if the file exists, otherwise fall back to defaults
    pub fn load_or_default(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from TOML string
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| SyncError::ConfigParse(e.to_string()))
    }

    /// Write the default config to `path`, refusing to overwrite unless `force`
    pub fn write_default(path: &Path, force: bool) -> crate::Result<()> {
        if path.exists() && !force {
            return Err(SyncError::ConfigExists(path.to_path_buf()));
        }
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, DEFAULT_CONFIG)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config = Config::from_toml(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.repository.zone, "tempZone");
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.store.index, "data");
        assert_eq!(config.consumer.workers, 4);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = Config::from_toml("[store]\nbackend = \"http\"\n").unwrap();
        assert_eq!(config.store.backend, StoreBackend::Http);
        assert_eq!(config.store.url, "http://localhost:9200");
        assert_eq!(config.repository.busy_timeout(), Duration::from_millis(5000));
        assert_eq!(config.consumer.queue_capacity, 64);
    }

    #[test]
    fn test_invalid_backend_is_parse_error() {
        let err = Config::from_toml("[store]\nbackend = \"redis\"\n").unwrap_err();
        assert!(matches!(err, SyncError::ConfigParse(_)));
    }

    #[test]
    fn test_write_default_refuses_overwrite() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("indexsync.toml");
        Config::write_default(&path, false).unwrap();
        assert!(matches!(
            Config::write_default(&path, false),
            Err(SyncError::ConfigExists(_))
        ));
        Config::write_default(&path, true).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.store.timeout(), Duration::from_secs(30));
    }
}
