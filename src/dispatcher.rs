//! Inbound event routing and the preview-then-confirm flow
//!
//! | Event                          | Behavior                                          |
//! |--------------------------------|---------------------------------------------------|
//! | `/start`, `/help`              | usage text with the home keyboard, state reset    |
//! | `/download_mp3 <link>`         | preview, without touching conversation state      |
//! | other commands                 | state reset; home keyboard in private chats       |
//! | "Download MP3" (`start_dl`)    | user starts awaiting a link                       |
//! | "Help" (`help`)                | usage text, state reset                           |
//! | confirm (`dl\|<link>`)         | link re-checked, then a download job              |
//! | free text                      | see [`Dispatcher::handle`]                        |
//!
//! Handler failures are logged and never escape [`Dispatcher::handle`].

use crate::coordinator::{DownloadCoordinator, JobRequest};
use crate::error::{JobError, Result};
use crate::format::card_text;
use crate::link::{MAX_CALLBACK_URL_LEN, is_candidate_link};
use crate::probe::MetadataProbe;
use crate::state::{ConversationState, TextDecision};
use crate::transport::Transport;
use crate::types::{CallbackData, ChatKind, InboundEvent, InlineKeyboard, Origin, VideoMeta};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const START_TEXT: &str = "YouTube MP3 Downloader\n\n\
    Group: /download_mp3 <url>\n\
    Private: Tap Download MP3, then send URL";

const HELP_TEXT: &str = "How to use\n\n\
    Group:\n\
    /download_mp3 https://youtu.be/xxxx\n\n\
    Private:\n\
    1) Tap Download MP3\n\
    2) Send YouTube URL\n\n\
    Then press Download MP3 button.";

const USAGE_TEXT: &str = "Use: /download_mp3 <youtube_url>";
const LINK_TOO_LONG_TEXT: &str = "This link is too long. Send a shorter YouTube URL.";
const ANALYZING_TEXT: &str = "Analyzing URL…";
const SEND_LINK_TEXT: &str = "Send a YouTube URL now.";
const RESEND_LINK_TEXT: &str = "Send a valid YouTube URL.";
const TAP_DOWNLOAD_TEXT: &str = "Tap Download MP3.";
const STARTING_TEXT: &str = "Starting…";
const DOWNLOADING_TEXT: &str = "Downloading…";
const SHUTTING_DOWN_TEXT: &str = "The bot is shutting down. Send the link again later.";

/// Routes inbound events to the state machine, the probe and the coordinator
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    probe: MetadataProbe,
    coordinator: Arc<DownloadCoordinator>,
    state: ConversationState,
    shutdown: CancellationToken,
}

impl Dispatcher {
    /// Create a dispatcher with every user idle
    pub fn new(
        transport: Arc<dyn Transport>,
        probe: MetadataProbe,
        coordinator: Arc<DownloadCoordinator>,
    ) -> Self {
        Self {
            transport,
            probe,
            coordinator,
            state: ConversationState::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Abandon in-flight previews once `token` is cancelled
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Per-user conversation state
    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    /// Handle one inbound event to completion
    ///
    /// Free text is read in this order: a user awaiting a link gets a preview
    /// (or is asked again); otherwise a link in a private chat gets a preview;
    /// group chats stay silent; other private text gets the home keyboard.
    ///
    /// Confirmed downloads run inside this call, so callers spawn one task per event.
    pub async fn handle(&self, event: InboundEvent) {
        let origin = *event.origin();
        if let Err(e) = self.route(event).await {
            warn!(
                chat_id = %origin.chat_id,
                user_id = %origin.user_id,
                error = %e,
                "failed to handle event"
            );
        }
    }

    async fn route(&self, event: InboundEvent) -> Result<()> {
        match event {
            InboundEvent::Command { origin, name, args } => {
                self.on_command(&origin, &name, &args).await
            }
            InboundEvent::Text { origin, text } => self.on_text(&origin, &text).await,
            InboundEvent::Callback {
                origin,
                callback_id,
                data,
            } => self.on_callback(&origin, &callback_id, &data).await,
        }
    }

    async fn on_command(&self, origin: &Origin, name: &str, args: &str) -> Result<()> {
        debug!(user_id = %origin.user_id, command = name, "command");
        match name {
            "start" => self.send_home(origin, START_TEXT).await,
            "help" => self.send_home(origin, HELP_TEXT).await,
            "download_mp3" => {
                if !is_candidate_link(args) {
                    self.transport
                        .send_text(origin.chat_id, USAGE_TEXT, Some(origin.message_id), None)
                        .await?;
                    return Ok(());
                }
                self.preview(origin, args).await.map(|_| ())
            }
            _ => {
                self.state.reset(origin.user_id);
                if origin.chat_kind == ChatKind::Private {
                    self.transport
                        .send_text(
                            origin.chat_id,
                            TAP_DOWNLOAD_TEXT,
                            None,
                            Some(&InlineKeyboard::home()),
                        )
                        .await?;
                }
                Ok(())
            }
        }
    }

    async fn on_text(&self, origin: &Origin, text: &str) -> Result<()> {
        match self.state.on_text(origin.user_id, text) {
            TextDecision::Preview(url) => self.preview(origin, &url).await.map(|_| ()),
            TextDecision::ResendLink => {
                self.transport
                    .send_text(origin.chat_id, RESEND_LINK_TEXT, None, None)
                    .await?;
                Ok(())
            }
            TextDecision::NotAwaiting => match origin.chat_kind {
                ChatKind::Private if is_candidate_link(text) => {
                    self.preview(origin, text.trim()).await.map(|_| ())
                }
                ChatKind::Private => {
                    self.transport
                        .send_text(
                            origin.chat_id,
                            TAP_DOWNLOAD_TEXT,
                            None,
                            Some(&InlineKeyboard::home()),
                        )
                        .await?;
                    Ok(())
                }
                ChatKind::Group => Ok(()),
            },
        }
    }

    async fn on_callback(&self, origin: &Origin, callback_id: &str, data: &str) -> Result<()> {
        match CallbackData::parse(data) {
            Some(CallbackData::Help) => {
                self.state.reset(origin.user_id);
                self.transport.answer_callback(callback_id, None, false).await?;
                self.transport
                    .send_text(
                        origin.chat_id,
                        HELP_TEXT,
                        None,
                        Some(&InlineKeyboard::home()),
                    )
                    .await?;
            }
            Some(CallbackData::StartDownload) => {
                self.state.begin_awaiting(origin.user_id);
                self.transport.answer_callback(callback_id, None, false).await?;
                self.transport
                    .send_text(origin.chat_id, SEND_LINK_TEXT, None, None)
                    .await?;
            }
            Some(CallbackData::Download(url)) => {
                self.confirm(origin, callback_id, url).await?;
            }
            None => {
                debug!(data, "unknown callback payload");
                self.transport.answer_callback(callback_id, None, false).await?;
            }
        }
        Ok(())
    }

    /// Usage text with the home keyboard; the user goes back to idle
    async fn send_home(&self, origin: &Origin, text: &str) -> Result<()> {
        self.state.reset(origin.user_id);
        self.transport
            .send_text(origin.chat_id, text, None, Some(&InlineKeyboard::home()))
            .await?;
        Ok(())
    }

    /// Confirm pressed: re-check the link and run the download job
    async fn confirm(&self, origin: &Origin, callback_id: &str, url: String) -> Result<()> {
        if !is_candidate_link(&url) {
            self.transport
                .answer_callback(callback_id, Some(&JobError::InvalidLink.user_message()), true)
                .await?;
            return Ok(());
        }

        if let Err(e) = self
            .transport
            .answer_callback(callback_id, Some(STARTING_TEXT), false)
            .await
        {
            debug!(error = %e, "could not acknowledge confirm press");
        }
        let status = self
            .transport
            .send_text(origin.chat_id, DOWNLOADING_TEXT, None, None)
            .await?;

        info!(user_id = %origin.user_id, chat_id = %origin.chat_id, url = %url, "download confirmed");
        let outcome = self
            .coordinator
            .run_job(JobRequest {
                chat: origin.chat_id,
                url,
                status_message: Some(status),
            })
            .await;
        if let Err(e) = outcome {
            debug!(category = e.category(), "download job ended without delivery");
        }
        Ok(())
    }

    /// Show the preview card for `url` with a confirm control
    ///
    /// Returns the metadata when a card was shown. Links too long to fit in the
    /// confirm payload are refused before probing. A lookup still running at
    /// shutdown is dropped and the user is told to retry.
    pub async fn preview(&self, origin: &Origin, url: &str) -> Result<Option<VideoMeta>> {
        let url = url.trim();
        if url.len() > MAX_CALLBACK_URL_LEN {
            debug!(len = url.len(), "link too long for confirm payload");
            self.transport
                .send_text(
                    origin.chat_id,
                    LINK_TOO_LONG_TEXT,
                    Some(origin.message_id),
                    None,
                )
                .await?;
            return Ok(None);
        }

        let processing = self
            .transport
            .send_text(origin.chat_id, ANALYZING_TEXT, Some(origin.message_id), None)
            .await?;

        let lookup = tokio::select! {
            meta = self.probe.fetch_meta(url) => meta,
            _ = self.shutdown.cancelled() => {
                info!(user_id = %origin.user_id, "preview abandoned for shutdown");
                self.transport
                    .edit_text(origin.chat_id, processing, SHUTTING_DOWN_TEXT, None)
                    .await?;
                return Ok(None);
            }
        };
        let Some(meta) = lookup else {
            self.transport
                .edit_text(
                    origin.chat_id,
                    processing,
                    &JobError::MetadataUnavailable.user_message(),
                    None,
                )
                .await?;
            return Ok(None);
        };

        let card = card_text(&meta);
        let keyboard = InlineKeyboard::confirm(&meta.source_url);
        let shown = match &meta.thumbnail_ref {
            Some(thumbnail) => {
                self.transport
                    .send_photo(
                        origin.chat_id,
                        thumbnail,
                        &card,
                        Some(origin.message_id),
                        Some(&keyboard),
                    )
                    .await
            }
            None => {
                self.transport
                    .send_text(
                        origin.chat_id,
                        &card,
                        Some(origin.message_id),
                        Some(&keyboard),
                    )
                    .await
            }
        };

        match shown {
            Ok(_) => {
                if let Err(e) = self
                    .transport
                    .delete_message(origin.chat_id, processing)
                    .await
                {
                    debug!(error = %e, "could not remove processing message");
                }
            }
            Err(e) => {
                warn!(error = %e, "preview card not sent, editing processing message");
                self.transport
                    .edit_text(origin.chat_id, processing, &card, Some(&keyboard))
                    .await?;
            }
        }
        Ok(Some(meta))
    }
}
