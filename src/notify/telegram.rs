//! Telegram Bot API client.

use crate::core::config::TelegramConfig;
use crate::core::error::{AppError, Result};
use crate::notify::Notifier;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const API_BASE_URL: &str = "https://api.telegram.org";
/// Upper bound the Bot API accepts for one media group.
const MAX_ALBUM_SIZE: usize = 10;

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    error_code: Option<i64>,
    description: Option<String>,
}

fn check_response(method: &str, body: &str) -> Result<()> {
    let response: ApiResponse = serde_json::from_str(body).map_err(|e| {
        AppError::Notification(format!("{}: unreadable response ({}): {}", method, e, body))
    })?;
    if response.ok {
        return Ok(());
    }
    Err(AppError::Notification(format!(
        "{} failed with {}: {}",
        method,
        response.error_code.unwrap_or_default(),
        response.description.unwrap_or_default()
    )))
}

/// The `media` field of `sendMediaGroup`; photos are attached as `photo<i>` parts.
fn media_payload(count: usize, caption: Option<&str>) -> Value {
    let items: Vec<Value> = (0..count)
        .map(|i| {
            let mut item = json!({
                "type": "photo",
                "media": format!("attach://photo{}", i),
            });
            if let (0, Some(caption)) = (i, caption) {
                item["caption"] = json!(caption);
            }
            item
        })
        .collect();
    Value::Array(items)
}

pub struct TelegramNotifier {
    client: Client,
    token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Initialization(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            token: config.bot_api_token.clone(),
            chat_id: config.chat_id.clone(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", API_BASE_URL, self.token, method)
    }

    async fn post_json(&self, method: &str, body: Value) -> Result<()> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await?;
        check_response(method, &response.text().await?)
    }

    async fn post_form(&self, method: &str, form: Form) -> Result<()> {
        let response = self
            .client
            .post(self.method_url(method))
            .multipart(form)
            .send()
            .await?;
        check_response(method, &response.text().await?)
    }

    fn photo_part(index: usize, png: &[u8]) -> Result<Part> {
        Ok(Part::bytes(png.to_vec())
            .file_name(format!("photo{}.png", index))
            .mime_str("image/png")?)
    }

    async fn send_photo(&self, png: &[u8], caption: Option<&str>, silent: bool) -> Result<()> {
        let mut form = Form::new()
            .text("chat_id", self.chat_id.clone())
            .text("disable_notification", silent.to_string())
            .part("photo", Self::photo_part(0, png)?);
        if let Some(caption) = caption {
            form = form.text("caption", caption.to_string());
        }
        self.post_form("sendPhoto", form).await
    }

    async fn send_media_group(
        &self,
        images: &[Vec<u8>],
        caption: Option<&str>,
        silent: bool,
    ) -> Result<()> {
        let mut form = Form::new()
            .text("chat_id", self.chat_id.clone())
            .text("disable_notification", silent.to_string())
            .text("media", media_payload(images.len(), caption).to_string());
        for (i, png) in images.iter().enumerate() {
            form = form.part(format!("photo{}", i), Self::photo_part(i, png)?);
        }
        self.post_form("sendMediaGroup", form).await
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_text(&self, text: &str, silent: bool) -> Result<()> {
        tracing::debug!(target: "notify", "Sending text message");
        self.post_json(
            "sendMessage",
            json!({
                "chat_id": self.chat_id,
                "text": text,
                "disable_notification": silent,
            }),
        )
        .await
    }

    /// The API wants 2 to 10 items per group, so a single image goes out as a
    /// photo and longer lists are split into several groups.
    async fn send_album(&self, images: &[Vec<u8>], caption: &str, silent: bool) -> Result<()> {
        tracing::debug!(target: "notify", "Sending {} images", images.len());
        for (i, chunk) in images.chunks(MAX_ALBUM_SIZE).enumerate() {
            let caption = (i == 0).then_some(caption);
            match chunk {
                [single] => self.send_photo(single, caption, silent).await?,
                _ => self.send_media_group(chunk, caption, silent).await?,
            }
        }
        Ok(())
    }

    async fn edit_text(&self, message_id: i64, text: &str) -> Result<()> {
        self.post_json(
            "editMessageText",
            json!({
                "chat_id": self.chat_id,
                "message_id": message_id,
                "text": text,
            }),
        )
        .await
    }
}
