//! Configuration types for Vinoteca components.
//!
//! Defaults are compiled in and may be overridden by an optional TOML file,
//! by default `<config_dir>/vinoteca/config.toml`:
//!
//! ```toml
//! [research]
//! model = "gemini-2.5-flash"
//! timeout_secs = 60
//!
//! [http]
//! timeout_secs = 30
//! max_retries = 3
//! retry_base_delay_ms = 500
//!
//! [database]
//! max_connections = 5
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::AppError;

/// Database connection pool configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self { max_connections: 5 }
    }
}

/// HTTP client configuration for external API calls.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            retry_base_delay_ms: 500,
        }
    }
}

/// Research lookup configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    /// Gemini model used for research and recommendations.
    pub model: String,
    /// Upper bound on a single research lookup.
    pub timeout_secs: u64,
}

impl ResearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Whole configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    pub research: ResearchConfig,
    pub http: HttpConfig,
    pub database: DbConfig,
}

/// Default config file location, if the platform has a config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("vinoteca").join("config.toml"))
}

/// Loads the configuration file at `path`.
///
/// A missing file yields the defaults; an unreadable or malformed file is a
/// `ConfigError`.
pub fn load_journal_config(path: &Path) -> Result<JournalConfig, AppError> {
    if !path.exists() {
        debug!("No config file at {}, using defaults", path.display());
        return Ok(JournalConfig::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        AppError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
    })?;

    toml::from_str(&content)
        .map_err(|e| AppError::ConfigError(format!("Invalid config {}: {}", path.display(), e)))
}
