//! Messaging platform transport
//!
//! The dispatcher and the download coordinator only talk to the platform
//! through the [`Transport`] trait. [`TelegramTransport`] implements it over
//! the Telegram Bot API and also provides long polling for inbound updates.

mod telegram;

pub use telegram::{TelegramTransport, Update};

use crate::error::Result;
use crate::types::{ChatId, InlineKeyboard, MessageId};
use async_trait::async_trait;
use std::path::Path;

/// Outbound operations on the messaging platform
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a text message, optionally as a reply and with buttons
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<MessageId>;

    /// Send a photo by URL with a caption
    async fn send_photo(
        &self,
        chat: ChatId,
        photo_url: &str,
        caption: &str,
        reply_to: Option<MessageId>,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<MessageId>;

    /// Upload a local audio file
    async fn send_audio(
        &self,
        chat: ChatId,
        audio: &Path,
        title: &str,
        caption: &str,
    ) -> Result<MessageId>;

    /// Replace the text (and buttons) of a message sent earlier
    async fn edit_text(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<()>;

    /// Delete a message
    async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<()>;

    /// Acknowledge a button press, optionally with a toast or alert
    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<()>;
}
