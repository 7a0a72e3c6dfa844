//! Telegram Bot API transport over reqwest

use super::Transport;
use crate::config::TelegramConfig;
use crate::error::{Error, Result};
use crate::types::{ChatId, ChatKind, InboundEvent, InlineKeyboard, MessageId, Origin, UserId};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Connect timeout for every API request
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Extra time on top of the long-poll timeout before a getUpdates request is abandoned
const POLL_GRACE: Duration = Duration::from_secs(10);

/// Envelope of every Bot API response
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiUser {
    id: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiChat {
    id: i64,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiMessage {
    message_id: i64,
    from: Option<ApiUser>,
    chat: ApiChat,
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiCallbackQuery {
    id: String,
    from: ApiUser,
    message: Option<ApiMessage>,
    data: Option<String>,
}

/// One entry of a getUpdates response
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    /// Monotonic update identifier; the next poll starts after it
    pub update_id: i64,
    message: Option<ApiMessage>,
    callback_query: Option<ApiCallbackQuery>,
}

impl Update {
    /// Convert into an inbound event
    ///
    /// Updates the bot does not handle (non-text messages, callbacks without a
    /// message or payload, messages without a sender) yield `None`.
    pub fn into_event(self) -> Option<InboundEvent> {
        if let Some(message) = self.message {
            let user = message.from?;
            let text = message.text?;
            let origin = Origin {
                user_id: UserId(user.id),
                chat_id: ChatId(message.chat.id),
                chat_kind: ChatKind::from_api(&message.chat.kind),
                message_id: MessageId(message.message_id),
            };
            return Some(InboundEvent::from_message(origin, &text));
        }

        let query = self.callback_query?;
        let message = query.message?;
        Some(InboundEvent::Callback {
            origin: Origin {
                user_id: UserId(query.from.id),
                chat_id: ChatId(message.chat.id),
                chat_kind: ChatKind::from_api(&message.chat.kind),
                message_id: MessageId(message.message_id),
            },
            callback_id: query.id,
            data: query.data?,
        })
    }
}

/// Telegram Bot API client
#[derive(Clone)]
pub struct TelegramTransport {
    client: reqwest::Client,
    api_base: String,
    token: String,
    poll_timeout: Duration,
}

impl std::fmt::Debug for TelegramTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramTransport")
            .field("api_base", &self.api_base)
            .field("poll_timeout", &self.poll_timeout)
            .finish_non_exhaustive()
    }
}

impl TelegramTransport {
    /// Create a client for the bot identified by `token`
    pub fn new(token: impl Into<String>, config: &TelegramConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| Error::Network(e.without_url()))?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: token.into(),
            poll_timeout: config.poll_timeout,
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    /// Decode the API envelope; the token never ends up in the error
    async fn decode<T: DeserializeOwned>(method: &str, response: reqwest::Response) -> Result<T> {
        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| Error::Network(e.without_url()))?;

        match (envelope.ok, envelope.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(Error::Telegram {
                method: method.to_string(),
                description: envelope
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            }),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T> {
        debug!(method, "telegram request");
        let response = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Network(e.without_url()))?;
        Self::decode(method, response).await
    }

    /// Identify the bot (used as a startup credential check)
    pub async fn get_me(&self) -> Result<String> {
        #[derive(Deserialize)]
        struct Me {
            username: Option<String>,
        }
        let me: Me = self.call("getMe", &json!({})).await?;
        Ok(me.username.unwrap_or_default())
    }

    /// Long-poll for updates after `offset`
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        let body = json!({
            "offset": offset,
            "timeout": self.poll_timeout.as_secs(),
            "allowed_updates": ["message", "callback_query"],
        });
        let response = self
            .client
            .post(self.api_url("getUpdates"))
            .timeout(self.poll_timeout + POLL_GRACE)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Network(e.without_url()))?;
        Self::decode("getUpdates", response).await
    }
}

fn with_reply_markup(
    mut body: Value,
    reply_to: Option<MessageId>,
    keyboard: Option<&InlineKeyboard>,
) -> Result<Value> {
    if let Some(reply_to) = reply_to {
        body["reply_to_message_id"] = json!(reply_to.0);
        body["allow_sending_without_reply"] = json!(true);
    }
    if let Some(keyboard) = keyboard {
        body["reply_markup"] = serde_json::to_value(keyboard)?;
    }
    Ok(body)
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<MessageId> {
        let body = with_reply_markup(json!({ "chat_id": chat.0, "text": text }), reply_to, keyboard)?;
        let message: ApiMessage = self.call("sendMessage", &body).await?;
        Ok(MessageId(message.message_id))
    }

    async fn send_photo(
        &self,
        chat: ChatId,
        photo_url: &str,
        caption: &str,
        reply_to: Option<MessageId>,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<MessageId> {
        let body = with_reply_markup(
            json!({ "chat_id": chat.0, "photo": photo_url, "caption": caption }),
            reply_to,
            keyboard,
        )?;
        let message: ApiMessage = self.call("sendPhoto", &body).await?;
        Ok(MessageId(message.message_id))
    }

    async fn send_audio(
        &self,
        chat: ChatId,
        audio: &Path,
        title: &str,
        caption: &str,
    ) -> Result<MessageId> {
        let file_name = audio
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.mp3")
            .to_string();
        let bytes = tokio::fs::read(audio).await?;
        let size = bytes.len();

        let part = Part::bytes(bytes)
            .file_name(file_name.clone())
            .mime_str("audio/mpeg")
            .map_err(|e| Error::Network(e.without_url()))?;
        let form = Form::new()
            .text("chat_id", chat.0.to_string())
            .text("title", title.to_string())
            .text("caption", caption.to_string())
            .part("audio", part);

        let response = self
            .client
            .post(self.api_url("sendAudio"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Network(e.without_url()))?;
        let message: ApiMessage = Self::decode("sendAudio", response).await?;

        info!(chat_id = chat.0, file_name = %file_name, size, "audio sent");
        Ok(MessageId(message.message_id))
    }

    async fn edit_text(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<()> {
        let body = with_reply_markup(
            json!({ "chat_id": chat.0, "message_id": message.0, "text": text }),
            None,
            keyboard,
        )?;
        // Result is the edited message, or `true` for inline messages
        let _: Value = self.call("editMessageText", &body).await?;
        Ok(())
    }

    async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<()> {
        let _: bool = self
            .call(
                "deleteMessage",
                &json!({ "chat_id": chat.0, "message_id": message.0 }),
            )
            .await?;
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<()> {
        let mut body = json!({ "callback_query_id": callback_id, "show_alert": show_alert });
        if let Some(text) = text {
            body["text"] = json!(text);
        }
        let _: bool = self.call("answerCallbackQuery", &body).await?;
        Ok(())
    }
}
