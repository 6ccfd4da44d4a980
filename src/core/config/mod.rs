//! Defines the core runtime `Config` struct, its defaults, and related utilities.
//! Submodules handle loading and validation.

pub(crate) mod file;
pub(crate) mod loading;
pub(crate) mod validation;

pub use file::ConfigFile;
pub use loading::load_config_file;
pub use validation::Requirements;

use chrono::FixedOffset;
use std::path::PathBuf;
use std::str::FromStr;

use crate::core::error::AppError;

/// Which WebDriver implementation `driver_path` points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriverKind {
    #[default]
    Firefox,
    Chrome,
}

impl FromStr for DriverKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "firefox" => Ok(DriverKind::Firefox),
            "chrome" => Ok(DriverKind::Chrome),
            other => Err(AppError::Config(format!("Unknown driver type: {}", other))),
        }
    }
}

/// Where the booking flow starts and which options it picks.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulingConfig {
    pub url: String,
    /// Visa application centre. Skipped when the site has a single centre.
    pub city: Option<String>,
    pub category: String,
}

#[derive(Clone, PartialEq)]
pub struct TelegramConfig {
    pub chat_id: String,
    pub bot_api_token: String,
    pub status_message_id: Option<i64>,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("chat_id", &self.chat_id)
            .field("bot_api_token", &"<redacted>")
            .field("status_message_id", &self.status_message_id)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProxySettings {
    pub command: String,
    pub script_path: PathBuf,
    pub port: u16,
}

/// Runtime configuration settings, validated once at startup.
#[derive(Clone)]
pub struct Config {
    pub driver_path: PathBuf,
    pub driver_kind: DriverKind,
    pub webdriver_port: u16,

    pub scheduling: Option<SchedulingConfig>,
    pub anticaptcha_api_key: Option<String>,
    pub telegram: Option<TelegramConfig>,

    pub proxy: ProxySettings,
    pub artifacts_dir: PathBuf,
    pub cookies_path: PathBuf,
    pub status_offset: FixedOffset,

    pub loaded_config_path: Option<String>,
}

pub(crate) const DEFAULT_WEBDRIVER_PORT: u16 = 4444;
pub(crate) const DEFAULT_PROXY_PORT: u16 = 8080;
pub(crate) const DEFAULT_STATUS_OFFSET_HOURS: i32 = 3;

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("driver_path", &self.driver_path)
            .field("driver_kind", &self.driver_kind)
            .field("webdriver_port", &self.webdriver_port)
            .field("scheduling", &self.scheduling)
            .field(
                "anticaptcha_api_key",
                &self.anticaptcha_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("telegram", &self.telegram)
            .field("proxy", &self.proxy)
            .field("artifacts_dir", &self.artifacts_dir)
            .field("cookies_path", &self.cookies_path)
            .field("status_offset", &self.status_offset)
            .field("loaded_config_path", &self.loaded_config_path)
            .finish()
    }
}

impl Config {
    /// Returns the scheduling block or a configuration error naming the missing key.
    pub fn require_scheduling(&self) -> crate::core::error::Result<&SchedulingConfig> {
        self.scheduling
            .as_ref()
            .ok_or_else(|| AppError::Config("\"scheduling_url\" config key expected".to_string()))
    }

    pub fn require_telegram(&self) -> crate::core::error::Result<&TelegramConfig> {
        self.telegram
            .as_ref()
            .ok_or_else(|| AppError::Config("\"telegram_chat_id\" config key expected".to_string()))
    }
}
