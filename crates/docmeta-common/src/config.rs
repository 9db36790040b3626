//! Configuration types for docmeta
//!
//! Loaded from an optional TOML file; every field has a default so an empty
//! or missing file yields a working configuration.

use crate::dirs::{self, DEFAULT_APP_NAME};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the backing file inside the cache directory
pub const METADATA_FILE: &str = "gedit-metadata.xml";

/// Maximum number of documents kept after a flush
pub const MAX_ITEMS: usize = 50;

/// Debounce delay between the first mutation and the flush
pub const FLUSH_DELAY_MS: u64 = 2000;

/// Root configuration for docmeta
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Metadata store configuration
    #[serde(default)]
    pub store: StoreConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::configuration(e.to_string()))
    }

    /// Load configuration from `path`, falling back to defaults if it does not exist
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|e| Error::configuration(format!("{}: {}", path.display(), e)))
    }
}

/// Metadata store configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the backing file (default: user cache dir)
    pub cache_dir: Option<PathBuf>,
    /// Backing file name
    pub file_name: String,
    /// Maximum number of documents kept after a flush
    pub max_items: usize,
    /// Debounce delay in milliseconds
    pub flush_delay_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            file_name: METADATA_FILE.to_string(),
            max_items: MAX_ITEMS,
            flush_delay_ms: FLUSH_DELAY_MS,
        }
    }
}

impl StoreConfig {
    /// Store configuration rooted at an explicit directory
    #[must_use]
    pub fn with_cache_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: Some(dir.into()),
            ..Self::default()
        }
    }

    /// Debounce delay as a `Duration`
    #[must_use]
    pub const fn flush_delay(&self) -> Duration {
        Duration::from_millis(self.flush_delay_ms)
    }

    /// Full path of the backing file, or `None` if no cache dir can be resolved
    #[must_use]
    pub fn metadata_path(&self) -> Option<PathBuf> {
        self.cache_dir
            .clone()
            .or_else(|| dirs::user_cache_dir(DEFAULT_APP_NAME))
            .map(|dir| dir.join(&self.file_name))
    }

    /// Check the configuration for values the store cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.max_items == 0 {
            return Err(Error::configuration("store.max_items must be at least 1"));
        }
        if self.file_name.is_empty() || self.file_name.contains(['/', '\\']) {
            return Err(Error::configuration(format!(
                "store.file_name must be a plain file name, got {:?}",
                self.file_name
            )));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.store.file_name, "gedit-metadata.xml");
        assert_eq!(config.store.max_items, 50);
        assert_eq!(config.store.flush_delay(), Duration::from_secs(2));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml_str(
            r#"
            [store]
            cache_dir = "/tmp/docmeta"
            max_items = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.store.max_items, 10);
        assert_eq!(config.store.flush_delay_ms, 2000);
        assert_eq!(
            config.store.metadata_path(),
            Some(PathBuf::from("/tmp/docmeta/gedit-metadata.xml"))
        );
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_bad_toml() {
        let err = Config::from_toml_str("[store]\nmax_items = \"many\"").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.store.max_items, MAX_ITEMS);
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docmeta.toml");
        std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();
        let config = Config::load_or_default(&path).unwrap();
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_validate() {
        assert!(StoreConfig::default().validate().is_ok());

        let zero = StoreConfig {
            max_items: 0,
            ..StoreConfig::default()
        };
        assert!(zero.validate().is_err());

        let nested = StoreConfig {
            file_name: "sub/meta.xml".to_string(),
            ..StoreConfig::default()
        };
        assert!(nested.validate().is_err());
    }
}
