//! Configuration management for opinion-miner
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Scraping configuration
    #[serde(default)]
    pub scrape: ScrapeConfig,

    /// Chart rendering configuration
    #[serde(default)]
    pub charts: ChartConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Review site scraping configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Site root; product pages live at `{base_url}/{code}#tab=reviews`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Timeout for a single page fetch in seconds
    #[serde(default = "default_page_timeout")]
    pub page_timeout_secs: u64,

    /// Timeout for a whole multi-page extraction in seconds
    #[serde(default = "default_overall_timeout")]
    pub overall_timeout_secs: u64,

    /// Maximum number of review pages followed for one product
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

/// Chart image dimensions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    #[serde(default = "default_chart_width")]
    pub width: u32,

    #[serde(default = "default_chart_height")]
    pub height: u32,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for opinion-miner data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            page_timeout_secs: default_page_timeout(),
            overall_timeout_secs: default_overall_timeout(),
            max_pages: default_max_pages(),
        }
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: default_chart_width(),
            height: default_chart_height(),
        }
    }
}

impl Config {
    /// Get the default base directory (~/.opinion-miner)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".opinion-miner")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("reviews.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("reviews.db"),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a base directory, falling back to defaults
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Check if opinion-miner is initialized (config and DB exist)
    pub fn is_initialized(&self) -> bool {
        self.paths.config_file.exists() && self.paths.db_file.exists()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let base = url::Url::parse(&self.scrape.base_url)
            .map_err(|e| Error::Config(format!("scrape.base_url is not a valid URL: {}", e)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(Error::Config(
                "scrape.base_url must use http or https".to_string(),
            ));
        }

        if self.scrape.page_timeout_secs == 0 || self.scrape.overall_timeout_secs == 0 {
            return Err(Error::Config(
                "scrape timeouts must be positive".to_string(),
            ));
        }

        if self.scrape.page_timeout_secs > self.scrape.overall_timeout_secs {
            return Err(Error::Config(
                "scrape.page_timeout_secs must be <= scrape.overall_timeout_secs".to_string(),
            ));
        }

        if self.scrape.max_pages == 0 {
            return Err(Error::Config("scrape.max_pages must be >= 1".to_string()));
        }

        if self.charts.width < 100 || self.charts.height < 100 {
            return Err(Error::Config(
                "charts.width and charts.height must be at least 100 pixels".to_string(),
            ));
        }

        Ok(())
    }
}
