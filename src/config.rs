//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\book-minder\config.toml
//! - macOS: ~/Library/Application Support/book-minder/config.toml
//! - Linux: ~/.config/book-minder/config.toml
//!
//! The config file is human-readable and editable. Settings are loaded at
//! startup; a missing or broken file falls back to defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API credentials (keep separate for potential future encryption)
    pub credentials: Credentials,

    /// Database location
    pub database: DatabaseConfig,

    /// Where covers and backups live on disk
    pub storage: StorageConfig,

    /// Refresh behavior defaults
    pub refresh: RefreshConfig,
}

/// Database location
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file (default: book_minder.db in the working directory)
    pub path: Option<PathBuf>,
}

/// API credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// Google Books API key; requests work without one but at a lower quota
    pub google_books_api_key: Option<String>,
}

/// Storage locations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for downloaded cover images (default: data dir)
    pub cover_dir: Option<PathBuf>,

    /// Directory for one-time metadata backups (default: data dir)
    pub backup_dir: Option<PathBuf>,
}

/// Refresh defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Provider used for every field by the `quick` flag
    pub quick_provider: String,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            quick_provider: "google".to_string(),
        }
    }
}

impl StorageConfig {
    /// Resolved covers directory.
    pub fn covers(&self) -> PathBuf {
        self.cover_dir.clone().unwrap_or_else(|| data_dir().join("covers"))
    }

    /// Resolved backups directory.
    pub fn backups(&self) -> PathBuf {
        self.backup_dir.clone().unwrap_or_else(|| data_dir().join("backups"))
    }
}

/// Get the data directory path (covers, backups)
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("book-minder")
}

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("book-minder"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from disk
///
/// Returns default config if file doesn't exist or can't be parsed.
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        tracing::warn!("Could not determine config directory, using defaults");
        return Config::default();
    };

    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!("Failed to parse config file {:?}: {}", path, e);
                tracing::warn!("Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file {:?}: {}", path, e);
            Config::default()
        }
    }
}

/// Save configuration to disk
///
/// Creates the config directory if it doesn't exist.
pub fn save(config: &Config) -> Result<(), ConfigError> {
    let dir = config_dir().ok_or(ConfigError::NoConfigDir)?;
    let path = dir.join("config.toml");

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::CreateDir(dir.clone(), e))?;

    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    // Write atomically (write to temp, then rename)
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, &path)
        .map_err(|e| ConfigError::Rename(temp_path, path.clone(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_roundtrips() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.refresh.quick_provider, "google");
        assert!(parsed.credentials.google_books_api_key.is_none());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [credentials]
            google_books_api_key = "abc123"
            "#,
        )
        .unwrap();
        assert_eq!(config.credentials.google_books_api_key.as_deref(), Some("abc123"));
        assert_eq!(config.refresh.quick_provider, "google");
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let config: Config = toml::from_str(
            r#"
            some_future_setting = true
            "#,
        )
        .unwrap();
        assert!(config.storage.cover_dir.is_none());
    }

    #[test]
    fn test_storage_dir_overrides() {
        let config: Config = toml::from_str(
            r#"
            [storage]
            cover_dir = "/srv/covers"
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.covers(), PathBuf::from("/srv/covers"));
        assert!(config.storage.backups().ends_with("backups"));
    }

    #[test]
    fn test_database_path_override() {
        let config: Config = toml::from_str(
            r#"
            [database]
            path = "/srv/books.db"
            "#,
        )
        .unwrap();
        assert_eq!(config.database.path, Some(PathBuf::from("/srv/books.db")));
    }
}
