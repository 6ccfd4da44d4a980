//! Turns a parsed `ConfigFile` into a validated `Config`.

use super::file::ConfigFile;
use super::{
    Config, DriverKind, ProxySettings, SchedulingConfig, TelegramConfig,
    DEFAULT_PROXY_PORT, DEFAULT_STATUS_OFFSET_HOURS, DEFAULT_WEBDRIVER_PORT,
};
use crate::core::error::{AppError, Result};
use chrono::FixedOffset;
use std::path::PathBuf;

/// What the selected command needs from the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirements {
    /// `check` and `monitor`: driver, booking flow and notification channel.
    FullCheck,
    /// `bot-test`: only the browser.
    DriverOnly,
}

fn require<T>(value: Option<T>, key: &str) -> Result<T> {
    value.ok_or_else(|| AppError::Config(format!("\"{}\" config key expected", key)))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Validates `file` for the given command. Fails on the first missing required key.
    pub fn from_file(file: ConfigFile, requirements: Requirements) -> Result<Config> {
        let driver_path = PathBuf::from(require(non_empty(file.driver_path), "driver_path")?);
        let driver_kind = match file.driver_type {
            Some(kind) => kind.parse::<DriverKind>()?,
            None => DriverKind::default(),
        };

        let (scheduling, telegram) = match requirements {
            Requirements::FullCheck => {
                let scheduling = SchedulingConfig {
                    url: require(non_empty(file.scheduling_url), "scheduling_url")?,
                    city: non_empty(require(file.scheduling_city, "scheduling_city")?),
                    category: require(non_empty(file.scheduling_category), "scheduling_category")?,
                };
                url::Url::parse(&scheduling.url)?;

                let telegram = TelegramConfig {
                    chat_id: require(file.telegram_chat_id, "telegram_chat_id")?.into_string(),
                    bot_api_token: require(
                        non_empty(file.telegram_bot_api_token),
                        "telegram_bot_api_token",
                    )?,
                    status_message_id: file.telegram_status_message_id,
                };
                (Some(scheduling), Some(telegram))
            }
            Requirements::DriverOnly => (None, None),
        };

        let offset_hours = file
            .status_utc_offset_hours
            .unwrap_or(DEFAULT_STATUS_OFFSET_HOURS);
        let status_offset = FixedOffset::east_opt(offset_hours * 3600).ok_or_else(|| {
            AppError::Config(format!(
                "status_utc_offset_hours out of range: {}",
                offset_hours
            ))
        })?;

        Ok(Config {
            driver_path,
            driver_kind,
            webdriver_port: file.webdriver_port.unwrap_or(DEFAULT_WEBDRIVER_PORT),
            scheduling,
            anticaptcha_api_key: non_empty(file.anticaptcha_api_key),
            telegram,
            proxy: ProxySettings {
                command: file.proxy_command.unwrap_or_else(|| "mitmdump".to_string()),
                script_path: PathBuf::from(
                    file.proxy_script_path
                        .unwrap_or_else(|| "proxy.py".to_string()),
                ),
                port: file.proxy_port.unwrap_or(DEFAULT_PROXY_PORT),
            },
            artifacts_dir: PathBuf::from(file.artifacts_dir.unwrap_or_else(|| "artifacts".into())),
            cookies_path: PathBuf::from(file.cookies_path.unwrap_or_else(|| "cookies.json".into())),
            status_offset,
            loaded_config_path: None,
        })
    }
}
