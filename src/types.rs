//! Core types for mp3bot

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::format::format_duration;
use crate::link::{MAX_CALLBACK_URL_LEN, truncate_bytes};

/// Messaging platform user identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

/// Chat (conversation) identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

/// Message identifier, unique within a chat
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

/// Identifier of one download job, unique for the process lifetime
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

macro_rules! display_inner {
    ($($ty:ty),*) => {
        $(impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        })*
    };
}

display_inner!(UserId, ChatId, MessageId, JobId);

/// Whether a chat is one-to-one or shared
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    /// Direct conversation between the user and the bot
    Private,
    /// Group, supergroup or channel
    Group,
}

impl ChatKind {
    /// Map the platform's chat type string
    pub fn from_api(kind: &str) -> Self {
        match kind {
            "private" => ChatKind::Private,
            _ => ChatKind::Group,
        }
    }
}

/// Descriptive metadata of a hosted video
///
/// Built once by the metadata probe and only read afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VideoMeta {
    /// Link the metadata was read from
    pub source_url: String,
    /// Video title
    pub title: String,
    /// Duration in whole seconds (0 when unknown)
    pub duration_seconds: u64,
    /// Duration rendered for display
    pub duration_display: String,
    /// Thumbnail URL, if the host exposes one
    pub thumbnail_ref: Option<String>,
    /// Channel or uploader name
    pub uploader: Option<String>,
}

impl VideoMeta {
    /// Create metadata; negative durations are stored as 0
    pub fn new(
        source_url: impl Into<String>,
        title: impl Into<String>,
        duration_seconds: i64,
        thumbnail_ref: Option<String>,
        uploader: Option<String>,
    ) -> Self {
        let duration_seconds = duration_seconds.max(0);
        Self {
            source_url: source_url.into(),
            title: title.into(),
            duration_seconds: duration_seconds.unsigned_abs(),
            duration_display: format_duration(duration_seconds),
            thumbnail_ref,
            uploader,
        }
    }
}

/// Where an inbound event came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Origin {
    /// Sender
    pub user_id: UserId,
    /// Chat the event belongs to
    pub chat_id: ChatId,
    /// Private or group chat
    pub chat_kind: ChatKind,
    /// The triggering message (for callbacks, the message carrying the button)
    pub message_id: MessageId,
}

/// Inbound event delivered by the transport
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    /// Plain text message
    Text {
        /// Sender and chat
        origin: Origin,
        /// Message text
        text: String,
    },
    /// Message starting with `/`
    Command {
        /// Sender and chat
        origin: Origin,
        /// Command name without the slash or `@bot` suffix, lowercased
        name: String,
        /// Remainder of the message after the command, trimmed
        args: String,
    },
    /// Inline button press
    Callback {
        /// Sender and chat
        origin: Origin,
        /// Callback query id, needed to acknowledge the press
        callback_id: String,
        /// Raw button payload
        data: String,
    },
}

impl InboundEvent {
    /// Turn message text into a command or text event
    pub fn from_message(origin: Origin, text: &str) -> Self {
        let trimmed = text.trim();
        let Some(rest) = trimmed.strip_prefix('/') else {
            return InboundEvent::Text {
                origin,
                text: trimmed.to_string(),
            };
        };

        let (head, args) = match rest.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args.trim()),
            None => (rest, ""),
        };
        let name = head.split('@').next().unwrap_or(head).to_lowercase();

        InboundEvent::Command {
            origin,
            name,
            args: args.to_string(),
        }
    }

    /// Sender and chat of this event
    pub fn origin(&self) -> &Origin {
        match self {
            InboundEvent::Text { origin, .. }
            | InboundEvent::Command { origin, .. }
            | InboundEvent::Callback { origin, .. } => origin,
        }
    }
}

/// Button payloads understood by the dispatcher
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackData {
    /// Show usage help
    Help,
    /// Start waiting for a link from this user
    StartDownload,
    /// Confirm download of the given URL
    Download(String),
}

impl CallbackData {
    const HELP: &'static str = "help";
    const START_DOWNLOAD: &'static str = "start_dl";
    const DOWNLOAD_PREFIX: &'static str = "dl|";

    /// Encode for the platform; the URL part is cut to the payload limit
    pub fn encode(&self) -> String {
        match self {
            CallbackData::Help => Self::HELP.to_string(),
            CallbackData::StartDownload => Self::START_DOWNLOAD.to_string(),
            CallbackData::Download(url) => format!(
                "{}{}",
                Self::DOWNLOAD_PREFIX,
                truncate_bytes(url.trim(), MAX_CALLBACK_URL_LEN)
            ),
        }
    }

    /// Decode a payload; unknown payloads yield `None`
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            Self::HELP => Some(CallbackData::Help),
            Self::START_DOWNLOAD => Some(CallbackData::StartDownload),
            other => other
                .strip_prefix(Self::DOWNLOAD_PREFIX)
                .map(|url| CallbackData::Download(url.trim().to_string())),
        }
    }
}

/// One inline button
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InlineButton {
    /// Label
    pub text: String,
    /// Encoded [`CallbackData`]
    pub callback_data: String,
}

impl InlineButton {
    /// Button carrying the given payload
    pub fn new(text: impl Into<String>, data: &CallbackData) -> Self {
        Self {
            text: text.into(),
            callback_data: data.encode(),
        }
    }
}

/// Inline keyboard attached to a message
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct InlineKeyboard {
    /// Button rows, top to bottom
    #[serde(rename = "inline_keyboard")]
    pub rows: Vec<Vec<InlineButton>>,
}

impl InlineKeyboard {
    /// "Download MP3" (start waiting for a link) and "Help"
    pub fn home() -> Self {
        Self {
            rows: vec![
                vec![InlineButton::new("Download MP3", &CallbackData::StartDownload)],
                vec![InlineButton::new("Help", &CallbackData::Help)],
            ],
        }
    }

    /// "Download MP3" confirming `url`, and "Help"
    pub fn confirm(url: &str) -> Self {
        Self {
            rows: vec![
                vec![InlineButton::new(
                    "Download MP3",
                    &CallbackData::Download(url.to_string()),
                )],
                vec![InlineButton::new("Help", &CallbackData::Help)],
            ],
        }
    }
}

/// Job lifecycle events broadcast by the download coordinator
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// Job accepted, waiting for a free permit
    Waiting {
        /// Job identifier
        id: JobId,
        /// Requested link
        url: String,
    },
    /// Permit acquired and workspace created
    Started {
        /// Job identifier
        id: JobId,
        /// Workspace directory of this job
        workspace: PathBuf,
    },
    /// Audio delivered to the chat
    Delivered {
        /// Job identifier
        id: JobId,
        /// Title used in the caption
        title: String,
    },
    /// Job ended with a failure
    Failed {
        /// Job identifier
        id: JobId,
        /// User-safe failure category
        category: String,
    },
    /// Workspace removed and permit released
    WorkspaceRemoved {
        /// Job identifier
        id: JobId,
        /// Removed directory
        workspace: PathBuf,
    },
}
