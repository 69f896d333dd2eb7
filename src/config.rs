use leaderbook_core::{EngineOptions, DEFAULT_COLLECTIONS};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Hosted data store connection
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RemoteConfig {
    /// Base URL (e.g., "https://abc.supabase.co")
    pub url: Option<String>,
    /// API key sent as `apikey` and bearer token
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl RemoteConfig {
    /// Returns true if both url and api_key are set
    pub fn is_configured(&self) -> bool {
        self.url.is_some() && self.api_key.is_some()
    }
}

/// Sync section as written in the config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SyncFile {
    interval_secs: Option<u64>,
    timeout_secs: Option<u64>,
    collections: Option<Vec<String>>,
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Path to the SQLite database
    pub database_path: ConfigValue<PathBuf>,
    /// Seconds between background sync passes
    pub sync_interval_secs: ConfigValue<u64>,
    /// Upper bound on a single remote call, in seconds
    pub sync_timeout_secs: ConfigValue<u64>,
    /// Collections reconciled on every pass
    pub collections: ConfigValue<Vec<String>>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    pub remote: RemoteConfig,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    database_path: Option<PathBuf>,
    remote: Option<RemoteConfig>,
    sync: Option<SyncFile>,
}

pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_SYNC_TIMEOUT_SECS: u64 = 30;

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let default_db_path = Self::default_data_dir().join("leaderbook.db");

        let mut database_path = ConfigValue::new(default_db_path, ConfigSource::Default);
        let mut sync_interval_secs =
            ConfigValue::new(DEFAULT_SYNC_INTERVAL_SECS, ConfigSource::Default);
        let mut sync_timeout_secs =
            ConfigValue::new(DEFAULT_SYNC_TIMEOUT_SECS, ConfigSource::Default);
        let mut collections = ConfigValue::new(
            DEFAULT_COLLECTIONS.iter().map(|c| c.to_string()).collect(),
            ConfigSource::Default,
        );
        let mut config_file = None;
        let mut remote = RemoteConfig::default();

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(db_path) = file_config.database_path {
                // Resolve relative paths against config file's directory
                let resolved_path = if db_path.is_relative() {
                    path.parent().map(|p| p.join(&db_path)).unwrap_or(db_path)
                } else {
                    db_path
                };
                database_path = ConfigValue::new(resolved_path, ConfigSource::File);
            }
            if let Some(remote_config) = file_config.remote {
                remote = remote_config;
            }
            if let Some(sync) = file_config.sync {
                if let Some(secs) = sync.interval_secs {
                    sync_interval_secs = ConfigValue::new(secs, ConfigSource::File);
                }
                if let Some(secs) = sync.timeout_secs {
                    sync_timeout_secs = ConfigValue::new(secs, ConfigSource::File);
                }
                if let Some(list) = sync.collections {
                    collections = ConfigValue::new(list, ConfigSource::File);
                }
            }
        }

        // Apply environment variable overrides
        if let Ok(db_path) = std::env::var("LEADERBOOK_DATABASE_PATH") {
            database_path = ConfigValue::new(PathBuf::from(db_path), ConfigSource::Environment);
        }
        if let Ok(url) = std::env::var("LEADERBOOK_REMOTE_URL") {
            remote.url = Some(url);
        }
        if let Ok(key) = std::env::var("LEADERBOOK_REMOTE_API_KEY") {
            remote.api_key = Some(key);
        }

        Ok(Self {
            database_path,
            sync_interval_secs,
            sync_timeout_secs,
            collections,
            config_file,
            remote,
        })
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs.value.max(1))
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_timeout_secs.value.max(1))
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            collections: self.collections.value.clone(),
            remote_timeout: self.remote_timeout(),
        }
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/leaderbook/
    /// - macOS: ~/Library/Application Support/leaderbook/
    /// - Windows: %APPDATA%/leaderbook/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("leaderbook")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/leaderbook/
    /// - macOS: ~/Library/Application Support/leaderbook/
    /// - Windows: %APPDATA%/leaderbook/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("leaderbook")
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
