use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::challenge::DEFAULT_QUOTE;
use crate::utils;

/// Current configuration version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// First day of the week for the "this week" period
    #[serde(default = "default_week_start")]
    pub week_start: String,
    /// Quote used when the quote list is empty
    #[serde(default = "default_quote")]
    pub default_quote: String,
    #[serde(default = "default_bell_interval_ms")]
    pub bell_interval_ms: u64,
    /// The evening alarm stops by itself after this long
    #[serde(default = "default_evening_safety_timeout_secs")]
    pub evening_safety_timeout_secs: u64,
    /// Pause on the success message before the morning screen closes
    #[serde(default = "default_success_close_delay_ms")]
    pub success_close_delay_ms: u64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Let Enter check the morning answer; otherwise it is only matched as typed
    #[serde(default)]
    pub show_submit: bool,
    #[serde(default = "default_current_theme")]
    pub current_theme: String,
    #[serde(default)]
    pub themes: HashMap<String, Theme>,
    #[serde(default = "default_config_version")]
    pub config_version: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    #[serde(default = "default_fg")]
    pub fg: String,
    #[serde(default = "default_bg")]
    pub bg: String,
    #[serde(default = "default_accent")]
    pub accent: String,
    #[serde(default = "default_success")]
    pub success: String,
    #[serde(default = "default_error")]
    pub error: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            week_start: default_week_start(),
            default_quote: default_quote(),
            bell_interval_ms: default_bell_interval_ms(),
            evening_safety_timeout_secs: default_evening_safety_timeout_secs(),
            success_close_delay_ms: default_success_close_delay_ms(),
            poll_interval_secs: default_poll_interval_secs(),
            show_submit: false,
            current_theme: default_current_theme(),
            themes: HashMap::new(),
            config_version: Some(CURRENT_CONFIG_VERSION),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            fg: default_fg(),
            bg: default_bg(),
            accent: default_accent(),
            success: default_success(),
            error: default_error(),
        }
    }
}

impl Theme {
    fn preset(fg: &str, bg: &str, accent: &str, success: &str, error: &str) -> Theme {
        Theme {
            fg: fg.to_string(),
            bg: bg.to_string(),
            accent: accent.to_string(),
            success: success.to_string(),
            error: error.to_string(),
        }
    }

    /// Get preset themes that are always available
    pub fn get_preset_themes() -> HashMap<String, Theme> {
        let mut themes = HashMap::new();
        themes.insert("default".to_string(), Theme::default());
        themes.insert(
            "dark".to_string(),
            Theme::preset("white", "black", "#8E24AA", "#4CAF50", "#F44336"),
        );
        themes.insert(
            "light".to_string(),
            Theme::preset("black", "white", "#1976D2", "#388E3C", "#D32F2F"),
        );
        themes.insert(
            "monochrome".to_string(),
            Theme::preset("white", "black", "white", "white", "white"),
        );
        themes
    }
}

// Default value functions
fn default_database_path() -> String {
    // This is a fallback - actual profile will be determined at load time
    if let Some(data_dir) = utils::get_data_dir(utils::Profile::Prod) {
        data_dir.join("riselog.db").to_string_lossy().to_string()
    } else {
        "~/.local/share/riselog/riselog.db".to_string()
    }
}

fn default_week_start() -> String {
    "saturday".to_string()
}

fn default_quote() -> String {
    DEFAULT_QUOTE.to_string()
}

fn default_bell_interval_ms() -> u64 {
    1500
}

fn default_evening_safety_timeout_secs() -> u64 {
    300
}

fn default_success_close_delay_ms() -> u64 {
    2000
}

fn default_poll_interval_secs() -> u64 {
    15
}

fn default_current_theme() -> String {
    "default".to_string()
}

fn default_fg() -> String {
    "white".to_string()
}

fn default_bg() -> String {
    "reset".to_string()
}

fn default_accent() -> String {
    "#8E24AA".to_string()
}

fn default_success() -> String {
    "green".to_string()
}

fn default_error() -> String {
    "red".to_string()
}

fn default_config_version() -> Option<u32> {
    Some(CURRENT_CONFIG_VERSION)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config directory: {0}")]
    ConfigDirError(String),
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to write config file: {0}")]
    WriteError(String),
    #[error("Theme not found: {0}")]
    ThemeNotFound(String),
    #[error("Unknown weekday for week_start: {0}")]
    InvalidWeekStart(String),
}

impl Config {
    /// Load configuration from file, or create default if missing
    /// Uses the provided profile to determine config and database paths
    pub fn load_with_profile(profile: utils::Profile) -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path(profile)?;
        Self::load_from_path(&config_path, profile)
    }

    /// Load from an explicit file, writing defaults there when it does not exist
    pub fn load_from_path(config_path: &Path, profile: utils::Profile) -> Result<Self, ConfigError> {
        if config_path.exists() {
            let contents = fs::read_to_string(config_path)
                .map_err(|e| ConfigError::ReadError(e.to_string()))?;
            let mut config: Config = toml::from_str(&contents)?;
            if config.database_path.trim().is_empty() {
                config.database_path = Self::default_database_path_for_profile(profile);
            }
            config.week_start_day()?;
            tracing::debug!(path = %config_path.display(), "config loaded");
            Ok(config)
        } else {
            let mut config = Config::default();
            config.database_path = Self::default_database_path_for_profile(profile);
            if let Err(e) = config.save_to_path(config_path) {
                tracing::error!(path = %config_path.display(), error = %e, "failed to save config file");
                return Err(e);
            }
            tracing::info!(path = %config_path.display(), "default config created");
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save_with_profile(&mut self, profile: utils::Profile) -> Result<(), ConfigError> {
        let config_path = Self::get_config_path(profile)?;
        self.save_to_path(&config_path)
    }

    pub fn save_to_path(&mut self, config_path: &Path) -> Result<(), ConfigError> {
        // Ensure config version is set before saving
        self.config_version = Some(CURRENT_CONFIG_VERSION);

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::WriteError(format!("Failed to serialize config: {}", e)))?;

        fs::write(config_path, toml_string).map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the config file
    pub fn get_config_path(profile: utils::Profile) -> Result<PathBuf, ConfigError> {
        let config_dir = utils::get_config_dir(profile)
            .ok_or_else(|| ConfigError::ConfigDirError("Could not determine config directory".to_string()))?;
        Ok(config_dir.join("config.toml"))
    }

    /// Get default database path for a specific profile
    fn default_database_path_for_profile(profile: utils::Profile) -> String {
        if let Some(data_dir) = utils::get_data_dir(profile) {
            data_dir.join("riselog.db").to_string_lossy().to_string()
        } else {
            match profile {
                utils::Profile::Dev => "~/.local/share/riselog-dev/riselog.db".to_string(),
                utils::Profile::Prod => "~/.local/share/riselog/riselog.db".to_string(),
            }
        }
    }

    /// Get the expanded database path (with ~ expansion)
    pub fn get_database_path(&self) -> PathBuf {
        utils::expand_path(&self.database_path)
    }

    pub fn week_start_day(&self) -> Result<Weekday, ConfigError> {
        self.week_start
            .trim()
            .parse::<Weekday>()
            .map_err(|_| ConfigError::InvalidWeekStart(self.week_start.clone()))
    }

    pub fn bell_interval(&self) -> Duration {
        Duration::from_millis(self.bell_interval_ms.max(100))
    }

    pub fn evening_safety_timeout(&self) -> Duration {
        Duration::from_secs(self.evening_safety_timeout_secs)
    }

    pub fn success_close_delay(&self) -> Duration {
        Duration::from_millis(self.success_close_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    /// Get the currently active theme, falling back to the default preset
    pub fn get_active_theme(&self) -> Theme {
        self.themes
            .get(&self.current_theme)
            .cloned()
            .or_else(|| Theme::get_preset_themes().remove(&self.current_theme))
            .unwrap_or_default()
    }

    /// Set the active theme by name
    pub fn set_theme(&mut self, name: &str) -> Result<(), ConfigError> {
        if !self.themes.contains_key(name) && !Theme::get_preset_themes().contains_key(name) {
            return Err(ConfigError::ThemeNotFound(name.to_string()));
        }
        self.current_theme = name.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config::load_from_path(&path, utils::Profile::Dev).unwrap();
        assert!(path.exists());
        assert_eq!(config.week_start_day().unwrap(), Weekday::Sat);
        assert_eq!(config.evening_safety_timeout(), Duration::from_secs(300));
        assert_eq!(config.success_close_delay(), Duration::from_millis(2000));
        assert_eq!(config.config_version, Some(CURRENT_CONFIG_VERSION));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "week_start = \"Monday\"\ndatabase_path = \"/tmp/x.db\"\n").unwrap();
        let config = Config::load_from_path(&path, utils::Profile::Dev).unwrap();
        assert_eq!(config.week_start_day().unwrap(), Weekday::Mon);
        assert_eq!(config.database_path, "/tmp/x.db");
        assert_eq!(config.default_quote, DEFAULT_QUOTE);
    }

    #[test]
    fn bad_week_start_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "week_start = \"someday\"\n").unwrap();
        assert!(matches!(
            Config::load_from_path(&path, utils::Profile::Dev),
            Err(ConfigError::InvalidWeekStart(_))
        ));
    }

    #[test]
    fn unknown_theme_falls_back() {
        let mut config = Config::default();
        assert!(config.set_theme("nope").is_err());
        config.set_theme("light").unwrap();
        assert_eq!(config.get_active_theme().bg, "white");
        config.current_theme = "gone".into();
        assert_eq!(config.get_active_theme(), Theme::default());
    }
}
