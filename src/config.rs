//! Configuration management for the watcher.
//!
//! Loads configuration from a TOML file, layers environment overrides on top,
//! and validates the credentials needed before the watch loop may start.

use crate::types::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Placeholder shipped in example env files
const PLACEHOLDER_OCR_KEY: &str = "YOUR_CLAUDE_API_KEY";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub ocr: OcrConfig,

    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base URL of the Supabase project
    #[serde(default = "default_store_url")]
    pub url: String,

    /// Anon/public API key
    #[serde(default)]
    pub api_key: Option<String>,

    /// Table receiving the records
    #[serde(default = "default_store_table")]
    pub table: String,

    #[serde(default = "default_store_timeout")]
    pub timeout_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            api_key: None,
            table: default_store_table(),
            timeout_seconds: default_store_timeout(),
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Anthropic API key
    #[serde(default)]
    pub api_key: Option<String>,

    /// Vision model used for table extraction
    #[serde(default = "default_ocr_model")]
    pub model: String,

    /// Messages endpoint
    #[serde(default = "default_ocr_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_ocr_api_version")]
    pub api_version: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_ocr_timeout")]
    pub timeout_seconds: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_ocr_model(),
            endpoint: default_ocr_endpoint(),
            api_version: default_ocr_api_version(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_ocr_timeout(),
        }
    }
}

impl OcrConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device serial; auto-selected when exactly one device is attached
    #[serde(default)]
    pub serial: Option<String>,

    /// Path to the adb binary
    #[serde(default = "default_adb_path")]
    pub adb_path: String,

    /// Device-side path the screenshot is written to before pulling
    #[serde(default = "default_remote_path")]
    pub remote_path: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            serial: None,
            adb_path: default_adb_path(),
            remote_path: default_remote_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Delay between cycles in seconds
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,

    /// Directory receiving screenshots and debug artifacts
    #[serde(default = "default_screenshot_dir")]
    pub screenshot_dir: PathBuf,

    /// Skip OCR when the capture is byte-identical to the previous one
    #[serde(default = "default_true")]
    pub change_detection: bool,

    /// Write a CSV rendering of each parsed table next to the screenshot
    #[serde(default = "default_true")]
    pub write_csv: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval(),
            screenshot_dir: default_screenshot_dir(),
            change_detection: true,
            write_csv: true,
        }
    }
}

impl WatchConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_store_url() -> String {
    "https://zaljfpagjzndgudnyggu.supabase.co".to_string()
}

fn default_store_table() -> String {
    "qb_weekly_data".to_string()
}

fn default_store_timeout() -> u64 {
    30
}

fn default_ocr_model() -> String {
    "claude-3-5-sonnet-20241022".to_string()
}

fn default_ocr_endpoint() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}

fn default_ocr_api_version() -> String {
    "2023-06-01".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_ocr_timeout() -> u64 {
    60
}

fn default_adb_path() -> String {
    "adb".to_string()
}

fn default_remote_path() -> String {
    "/sdcard/pff_screenshot.png".to_string()
}

fn default_interval() -> u64 {
    30
}

fn default_screenshot_dir() -> PathBuf {
    PathBuf::from("./screenshots")
}

impl Config {
    /// Load configuration from a specific path
    pub fn load_from_path(path: PathBuf) -> Self {
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config file: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("No config file found at {:?}, using defaults", path);
                Self::default()
            }
        }
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("emulator-watcher")
            .join("config.toml")
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides using the given variable lookup
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SUPABASE_URL") {
            self.store.url = url;
        }
        if let Some(key) = lookup("SUPABASE_ANON_KEY") {
            self.store.api_key = Some(key);
        }
        if let Some(table) = lookup("SUPABASE_TABLE") {
            self.store.table = table;
        }
        if let Some(key) = lookup("CLAUDE_API_KEY") {
            self.ocr.api_key = Some(key);
        }
        if let Some(model) = lookup("CLAUDE_MODEL") {
            self.ocr.model = model;
        }
        if let Some(serial) = lookup("ADB_DEVICE") {
            if !serial.trim().is_empty() {
                self.device.serial = Some(serial);
            }
        }
        if let Some(interval) = lookup("WATCH_INTERVAL") {
            match interval.trim().parse() {
                Ok(secs) => self.watch.interval_seconds = secs,
                Err(_) => warn!("Ignoring invalid WATCH_INTERVAL {:?}", interval),
            }
        }
        if let Some(dir) = lookup("SCREENSHOT_DIR") {
            self.watch.screenshot_dir = PathBuf::from(dir);
        }
        if let Some(flag) = lookup("ENABLE_CHANGE_DETECTION") {
            self.watch.change_detection = flag.trim().eq_ignore_ascii_case("true");
        }
    }

    /// Check that everything the loop needs is present
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.store.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => {}
            _ => return Err(ConfigError::MissingStoreKey),
        }

        match self.ocr.api_key.as_deref().map(str::trim) {
            Some(PLACEHOLDER_OCR_KEY) => return Err(ConfigError::PlaceholderOcrKey),
            Some(key) if !key.is_empty() => {}
            _ => return Err(ConfigError::MissingOcrKey),
        }

        if self.watch.interval_seconds == 0 {
            return Err(ConfigError::ZeroInterval);
        }

        Ok(())
    }
}
