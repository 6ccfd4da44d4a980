//! Defines the structure mirroring the JSON configuration file format.

use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

/// Telegram chat ids are accepted both as JSON numbers and as strings
/// (channel usernames like `@my_channel`).
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub(crate) enum ChatIdValue {
    Number(i64),
    Text(String),
}

impl ChatIdValue {
    pub(crate) fn into_string(self) -> String {
        match self {
            ChatIdValue::Number(n) => n.to_string(),
            ChatIdValue::Text(s) => s,
        }
    }
}

/// Marks a key as present even when its value is `null`, so an absent key
/// (`None`) differs from an empty one (`Some(None)`).
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct ConfigFile {
    pub(crate) driver_path: Option<String>,
    pub(crate) driver_type: Option<String>,

    pub(crate) scheduling_url: Option<String>,
    /// Required for a check; an empty value skips the city step.
    #[serde(default, deserialize_with = "present")]
    pub(crate) scheduling_city: Option<Option<String>>,
    pub(crate) scheduling_category: Option<String>,

    pub(crate) anticaptcha_api_key: Option<String>,

    pub(crate) telegram_chat_id: Option<ChatIdValue>,
    pub(crate) telegram_bot_api_token: Option<String>,
    pub(crate) telegram_status_message_id: Option<i64>,

    pub(crate) webdriver_port: Option<u16>,
    pub(crate) proxy_port: Option<u16>,
    pub(crate) proxy_command: Option<String>,
    pub(crate) proxy_script_path: Option<String>,
    pub(crate) artifacts_dir: Option<String>,
    pub(crate) cookies_path: Option<String>,
    pub(crate) status_utc_offset_hours: Option<i32>,

    /// Keys this version does not recognize. Reported, never fatal.
    #[serde(flatten)]
    pub(crate) unknown: BTreeMap<String, serde_json::Value>,
}
