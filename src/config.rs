//! Configuration management.
//!
//! Handles loading, saving, and validating configuration from
//! platform-specific config directories.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application name used for config directory.
const APP_NAME: &str = "Mangapdf";

/// Default config filename.
const CONFIG_FILENAME: &str = "config.toml";

/// Browser-like identifier sent with every request.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which series to index.
    pub series: SeriesConfig,

    /// Image download settings.
    pub download: DownloadConfig,

    /// Index and chapter page scraping settings.
    pub scraping: ScrapingConfig,

    /// File paths.
    pub paths: PathsConfig,
}

/// Series configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesConfig {
    /// Root page of the series on the reader site.
    pub url: String,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            url: "https://www.mangaread.org/manga/jujutsu-kaisen/".to_string(),
        }
    }
}

/// Image download configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Number of images fetched concurrently within a chapter.
    pub workers: usize,

    /// Per-request timeout in seconds.
    pub timeout_sec: u64,

    /// User-Agent header for all requests.
    pub user_agent: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            timeout_sec: 15,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Web scraping configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    /// How long to wait for the chapter index before proceeding without it.
    pub index_timeout_sec: u64,
    /// Enable scraper debug logging.
    pub debug: bool,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            index_timeout_sec: 15,
            debug: false,
        }
    }
}

/// File path configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory receiving one PDF per chapter.
    pub output_directory: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from("Manga_Library"),
        }
    }
}

impl Config {
    /// Returns the platform-specific config directory path.
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|p| p.join(APP_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Returns the full path to the config file.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join(CONFIG_FILENAME))
    }

    /// Loads configuration from the default location.
    ///
    /// If the config file doesn't exist, creates a default one.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Config::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        Ok(config)
    }

    /// Saves configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.series.url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "series.url".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        if self.download.workers == 0 {
            return Err(ConfigError::InvalidValue {
                key: "download.workers".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        if self.download.timeout_sec == 0 {
            return Err(ConfigError::InvalidValue {
                key: "download.timeout_sec".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        if self.scraping.index_timeout_sec == 0 {
            return Err(ConfigError::InvalidValue {
                key: "scraping.index_timeout_sec".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}
