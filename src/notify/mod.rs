//! Outbound notifications.
//!
//! A `Notifier` delivers one pre-formatted `Message` per event. Telegram is
//! the production channel; `LogNotifier` is the fallback when no bot token
//! is configured.

pub mod format;
pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

/// Inline keyboard button under a message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
}

impl InlineButton {
    pub fn link(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: Some(url.into()),
            callback_data: None,
        }
    }
}

/// HTML-markup text plus an optional single row of buttons.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message {
    pub text: String,
    pub buttons: Vec<InlineButton>,
}

impl Message {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            buttons: Vec::new(),
        }
    }

    pub fn with_button(mut self, button: InlineButton) -> Self {
        self.buttons.push(button);
        self
    }
}

/// Delivery channel for cycle events.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &Message) -> Result<()>;

    /// Reachability check used by the status snapshot.
    async fn ping(&self) -> Result<()>;
}

/// Writes messages to the tracing log instead of a chat.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &Message) -> Result<()> {
        info!(buttons = message.buttons.len(), text = %message.text, "Notification");
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
