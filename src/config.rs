//! Configuration management for rfp-link-validator
//!
//! All configuration is loaded from `./config/rfp-link-validator.toml`.
//! No hardcoded defaults exist in source code - all defaults are in the config template.

use serde::Deserialize;
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration file path relative to working directory
pub const CONFIG_PATH: &str = "./config/rfp-link-validator.toml";

/// Default configuration file content - this is the ONLY place defaults exist
pub const DEFAULT_CONFIG: &str = include_str!("../config/rfp-link-validator.toml");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Configuration field '{field}' cannot be empty")]
    EmptyRequired { field: String },

    #[error("Configuration field '{field}' must be greater than zero")]
    ZeroValue { field: String },

    #[error("Invalid path suffix in '{field}': {value} (must start with '/')")]
    InvalidSuffix { field: String, value: String },

    #[error("Invalid CSS selector in '{field}': {selector}")]
    InvalidSelector { field: String, selector: String },
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub input: InputConfig,
    pub output: OutputConfig,
    pub http: HttpConfig,
    pub browser: BrowserConfig,
    pub platforms: PlatformsConfig,
}

/// Input sheet location and required column names
#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    pub path: String,
    pub url_column: String,
    pub platform_column: String,
}

/// Output placement; empty directories fall back to the user's Desktop / home
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub preferred_dir: String,
    #[serde(default)]
    pub fallback_dir: String,
    pub file_stem: String,
}

impl OutputConfig {
    pub fn preferred_dir(&self) -> Option<PathBuf> {
        if self.preferred_dir.is_empty() {
            dirs::desktop_dir()
        } else {
            Some(PathBuf::from(&self.preferred_dir))
        }
    }

    pub fn fallback_dir(&self) -> PathBuf {
        if self.fallback_dir.is_empty() {
            dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
        } else {
            PathBuf::from(&self.fallback_dir)
        }
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub user_agent: String,
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

fn default_max_redirects() -> usize {
    10
}

/// Headless browser configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    pub render_timeout_secs: u64,
    pub settle_delay_ms: u64,
    #[serde(default = "default_sandbox")]
    pub sandbox: bool,
    #[serde(default)]
    pub chrome_path: Option<String>,
}

fn default_sandbox() -> bool {
    true
}

impl BrowserConfig {
    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Per-platform expectations
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformsConfig {
    pub demandstar: DemandStarRules,
    pub bonfire: BonfireRules,
    pub ionwave: IonWaveRules,
    pub listing: ListingRules,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DemandStarRules {
    /// Literal the first heading must contain
    pub expected_header: String,
    /// Container that signals the listing has rendered
    pub content_selector: String,
    pub heading_selector: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BonfireRules {
    pub portal_suffix: String,
    #[serde(default)]
    pub verify_content: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct IonWaveRules {
    pub sourcing_suffix: String,
    #[serde(default)]
    pub verify_content: bool,
    pub header_span_id: String,
    pub expected_header: String,
}

/// Rules shared by BidNetDirect and the generic fallback
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ListingRules {
    pub expected_title: String,
}

impl AppConfig {
    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// The embedded default configuration
    pub fn default_template() -> Result<Self, ConfigError> {
        Self::from_toml_str(DEFAULT_CONFIG)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty("input.path", &self.input.path)?;
        require_non_empty("input.url_column", &self.input.url_column)?;
        require_non_empty("input.platform_column", &self.input.platform_column)?;
        require_non_empty("output.file_stem", &self.output.file_stem)?;
        require_non_empty("http.user_agent", &self.http.user_agent)?;

        if self.http.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroValue {
                field: "http.request_timeout_secs".to_string(),
            });
        }
        if self.browser.render_timeout_secs == 0 {
            return Err(ConfigError::ZeroValue {
                field: "browser.render_timeout_secs".to_string(),
            });
        }

        let demandstar = &self.platforms.demandstar;
        require_non_empty("platforms.demandstar.expected_header", &demandstar.expected_header)?;
        validate_selector("platforms.demandstar.content_selector", &demandstar.content_selector)?;
        validate_selector("platforms.demandstar.heading_selector", &demandstar.heading_selector)?;

        validate_suffix("platforms.bonfire.portal_suffix", &self.platforms.bonfire.portal_suffix)?;

        let ionwave = &self.platforms.ionwave;
        validate_suffix("platforms.ionwave.sourcing_suffix", &ionwave.sourcing_suffix)?;
        require_non_empty("platforms.ionwave.header_span_id", &ionwave.header_span_id)?;
        require_non_empty("platforms.ionwave.expected_header", &ionwave.expected_header)?;

        require_non_empty("platforms.listing.expected_title", &self.platforms.listing.expected_title)?;

        Ok(())
    }

    pub fn create_default_config_at(path: &Path) -> Result<PathBuf, ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_CONFIG.as_bytes())?;

        Ok(path.to_path_buf())
    }

    /// Check if stdin is a TTY (interactive terminal)
    pub fn is_interactive() -> bool {
        io::stdin().is_terminal()
    }

    /// Prompt user to create default config (only in interactive mode)
    pub fn prompt_create_config(path: &Path) -> Result<Option<PathBuf>, ConfigError> {
        if !Self::is_interactive() {
            return Ok(None);
        }

        print!("Configuration file not found. Create default config? [Y/n] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim().to_lowercase();

        if input.is_empty() || input == "y" || input == "yes" {
            let path = Self::create_default_config_at(path)?;
            Ok(Some(path))
        } else {
            Ok(None)
        }
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::EmptyRequired {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn validate_suffix(field: &str, value: &str) -> Result<(), ConfigError> {
    if !value.starts_with('/') {
        return Err(ConfigError::InvalidSuffix {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

fn validate_selector(field: &str, selector: &str) -> Result<(), ConfigError> {
    scraper::Selector::parse(selector).map_err(|_| ConfigError::InvalidSelector {
        field: field.to_string(),
        selector: selector.to_string(),
    })?;
    Ok(())
}
