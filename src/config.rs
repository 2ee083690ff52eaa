//! Configuration for memory-wall

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::FeedError;

/// Default storage directory
pub fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("memory-wall")
}

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the SQLite database and config file
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// SQLite database file name inside `storage_dir`
    #[serde(default = "default_database_file")]
    pub database_file: String,

    /// HTTP API port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Maximum pooled SQLite connections
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Attempts for a write unit that hits lock contention
    #[serde(default = "default_write_retry_attempts")]
    pub write_retry_attempts: u32,

    /// Public base URL media object keys are served from
    #[serde(default = "default_media_public_url")]
    pub media_public_url: String,

    /// Optional TOML file with users and group members for the in-process gate
    #[serde(default)]
    pub directory_file: Option<PathBuf>,

    /// Optional endpoint that receives new-post notifications
    #[serde(default)]
    pub notify_webhook_url: Option<String>,

    /// Page size used when a list request omits one
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    /// Upper bound applied to every requested page size
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

fn default_database_file() -> String {
    "feed.db".to_string()
}

fn default_http_port() -> u16 {
    8095
}

fn default_pool_size() -> u32 {
    8
}

fn default_write_retry_attempts() -> u32 {
    3
}

fn default_media_public_url() -> String {
    "http://localhost:9000/media".to_string()
}

fn default_page_size() -> u32 {
    20
}

fn default_max_page_size() -> u32 {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            database_file: default_database_file(),
            http_port: default_http_port(),
            pool_size: default_pool_size(),
            write_retry_attempts: default_write_retry_attempts(),
            media_public_url: default_media_public_url(),
            directory_file: None,
            notify_webhook_url: None,
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, FeedError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| FeedError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), FeedError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| FeedError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<(), FeedError> {
        if self.max_page_size == 0 {
            return Err(FeedError::Config("max_page_size must be > 0".into()));
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(FeedError::Config(format!(
                "default_page_size must be between 1 and {}",
                self.max_page_size
            )));
        }
        if self.pool_size == 0 {
            return Err(FeedError::Config("pool_size must be > 0".into()));
        }
        if self.write_retry_attempts == 0 {
            return Err(FeedError::Config("write_retry_attempts must be > 0".into()));
        }
        Ok(())
    }

    /// Get database path
    pub fn database_path(&self) -> PathBuf {
        self.storage_dir.join(&self.database_file)
    }

    /// Get config file path
    pub fn config_path(&self) -> PathBuf {
        self.storage_dir.join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("http_port = 9000\nmax_page_size = 50\n").unwrap();
        assert_eq!(config.http_port, 9000);
        assert_eq!(config.max_page_size, 50);
        assert_eq!(config.default_page_size, 20);
        assert_eq!(config.database_file, "feed.db");
        assert!(config.notify_webhook_url.is_none());
    }

    #[test]
    fn test_validate_rejects_bad_page_sizes() {
        let config = Config {
            default_page_size: 200,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            max_page_size: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = Config {
            storage_dir: dir.path().to_path_buf(),
            notify_webhook_url: Some("http://hooks.local/new-post".into()),
            ..Config::default()
        };
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.database_path(), dir.path().join("feed.db"));
        assert_eq!(loaded.notify_webhook_url.as_deref(), Some("http://hooks.local/new-post"));
    }

    #[test]
    fn test_demo_config_is_valid() {
        let config: Config = toml::from_str(include_str!("../demos/config.toml")).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.directory_file.as_deref(),
            Some(Path::new("demos/directory.toml"))
        );
    }
}
