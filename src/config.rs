//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\lyric-harvest\config.toml
//! - macOS: ~/Library/Application Support/lyric-harvest/config.toml
//! - Linux: ~/.config/lyric-harvest/config.toml
//!
//! The config file is human-readable and editable. Credentials may also come
//! from the environment (`GENIUS_API_KEY`), which takes precedence over the
//! file. Stages that need a credential fail fast at startup if it is absent.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API credentials (keep separate for potential future encryption)
    pub credentials: Credentials,

    /// Database settings
    pub database: DatabaseConfig,

    /// Ingestion tunables (thresholds, batch size, search seed)
    pub ingest: IngestConfig,

    /// Retry/backoff tunables
    pub retry: RetryConfig,
}

/// API credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// Genius API token for song search and lyric pages
    pub genius_api_key: Option<String>,
}

/// Database settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("lyric_harvest.db"),
        }
    }
}

/// Ingestion tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Seed query for artist discovery
    pub search_query: String,

    /// Page size for paginated artist search
    pub page_limit: u32,

    /// Minimum artist rows before the song stage may start
    pub artist_threshold: i64,

    /// Minimum song rows before the lyric stage may start
    pub song_threshold: i64,

    /// Seconds between stage-gate polls
    pub poll_interval_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            search_query: "a".to_string(),
            page_limit: 100,
            artist_threshold: 100,
            song_threshold: 10,
            poll_interval_secs: 10,
        }
    }
}

/// Retry/backoff tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per operation, including the first
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds
    pub initial_delay_ms: u64,

    /// Multiplier applied to the delay after each failure
    pub backoff: f64,

    /// Lower bound of the randomized rate-limit wait, in seconds
    pub rate_limit_min_secs: u64,

    /// Upper bound of the randomized rate-limit wait, in seconds
    pub rate_limit_max_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay_ms: 1000,
            backoff: 2.0,
            rate_limit_min_secs: 30,
            rate_limit_max_secs: 60,
        }
    }
}

impl RetryConfig {
    /// Build the retry policy used by all stage operations.
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            backoff: self.backoff,
            rate_limit_wait: Duration::from_secs(self.rate_limit_min_secs)
                ..=Duration::from_secs(self.rate_limit_max_secs),
        }
    }
}

impl Config {
    /// Genius API key, with the environment taking precedence over the file.
    ///
    /// Checked before a stage starts; a missing key is a startup error, not
    /// a mid-run authentication failure.
    pub fn require_genius_api_key(&self) -> Result<String, ConfigError> {
        if let Ok(key) = std::env::var("GENIUS_API_KEY")
            && !key.is_empty()
        {
            return Ok(key);
        }
        self.credentials
            .genius_api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingKey("GENIUS_API_KEY"))
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("lyric-harvest"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from an explicit path, or the default location.
///
/// Returns default config if no file exists. A file that exists but does not
/// parse is an error - a silently ignored typo in retry tunables is worse
/// than a startup failure.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match config_path() {
            Some(p) => p,
            None => {
                tracing::warn!("Could not determine config directory, using defaults");
                return Ok(Config::default());
            }
        },
    };

    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Ok(Config::default());
    }

    let contents =
        std::fs::read_to_string(&path).map_err(|e| ConfigError::Read(path.clone(), e))?;
    let config = toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.clone(), e))?;
    tracing::info!("Loaded config from {:?}", path);
    Ok(config)
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Required configuration value missing: {0}")]
    MissingKey(&'static str),

    #[error("Failed to read config file {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("Failed to parse config file {0}: {1}")]
    Parse(PathBuf, toml::de::Error),
}

// ============================================================================
// Tests
// ============================================================================
