//! Telegram Bot API notifier.
//!
//! Sends HTML-formatted messages to a single chat via `sendMessage`.
//! Buttons become one row of an inline keyboard. `getMe` doubles as a
//! reachability check.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{Message, Notifier};
use crate::types::BotError;

const BASE_URL: &str = "https://api.telegram.org";
const NOTIFIER_NAME: &str = "telegram";
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Telegram caps message text at 4096 characters.
const MAX_TEXT_CHARS: usize = 4096;

#[derive(Debug, Deserialize)]
struct TgResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

pub struct TelegramNotifier {
    http: Client,
    base_url: String,
    token: SecretString,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(token: SecretString, chat_id: String) -> Result<Self> {
        Self::with_base_url(token, chat_id, BASE_URL)
    }

    /// Point at a different API host (used by tests).
    pub fn with_base_url(token: SecretString, chat_id: String, base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent("valuebet/0.1.0")
            .build()
            .context("Failed to build HTTP client for Telegram")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            chat_id,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token.expose_secret(), method)
    }

    fn payload(&self, message: &Message) -> serde_json::Value {
        let text = truncate_markup(&message.text, MAX_TEXT_CHARS);
        let mut body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });
        if !message.buttons.is_empty() {
            body["reply_markup"] = serde_json::json!({
                "inline_keyboard": [message.buttons],
            });
        }
        body
    }

    fn failure(message: impl Into<String>) -> anyhow::Error {
        BotError::Notify {
            notifier: NOTIFIER_NAME.to_string(),
            message: message.into(),
        }
        .into()
    }
}

/// Shorten HTML text to at most `max` characters without splitting markup.
///
/// Cuts at the last line break that fits. Tags never span lines in the
/// messages we build, so every kept line is well formed. A single oversized
/// line falls back to the last position outside a tag or entity.
fn truncate_markup(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let head: String = text.chars().take(max).collect();
    if let Some(pos) = head.rfind('\n') {
        return head[..pos].to_string();
    }

    let mut safe = 0;
    let mut in_markup = false;
    for (i, c) in head.char_indices() {
        match c {
            '<' | '&' => in_markup = true,
            '>' | ';' if in_markup => {
                in_markup = false;
                safe = i + c.len_utf8();
                continue;
            }
            _ => {}
        }
        if !in_markup {
            safe = i + c.len_utf8();
        }
    }
    head[..safe].to_string()
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &Message) -> Result<()> {
        let resp = self
            .http
            .post(self.method_url("sendMessage"))
            .json(&self.payload(message))
            .send()
            .await
            // The URL path carries the bot token.
            .map_err(|e| Self::failure(e.without_url().to_string()))?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            warn!(%status, "Telegram sendMessage failed");
            return Err(Self::failure(format!(
                "HTTP {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: TgResponse =
            serde_json::from_str(&body).context("Unexpected Telegram response")?;
        if !parsed.ok {
            return Err(Self::failure(
                parsed.description.unwrap_or_else(|| "ok=false".into()),
            ));
        }

        debug!(chars = message.text.chars().count(), "Telegram message sent");
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let resp = self
            .http
            .get(self.method_url("getMe"))
            .send()
            .await
            .map_err(|e| Self::failure(e.without_url().to_string()))?;
        if !resp.status().is_success() {
            return Err(Self::failure(format!("getMe returned HTTP {}", resp.status())));
        }
        Ok(())
    }
}
