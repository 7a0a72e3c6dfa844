//! Shared test doubles for the extraction and transport collaborators.

use crate::error::{Error, Result};
use crate::extractor::{Extractor, ProbeInfo};
use crate::transport::Transport;
use crate::types::{ChatId, InlineKeyboard, MessageId};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

/// What a scripted `fetch_audio` call does
#[derive(Clone, Debug)]
pub(crate) enum FetchScript {
    /// Write `<id>.mp3` and report it
    Produce { id: String },
    /// Write a differently named mp3, report `<id>.mp3`
    ProduceUnexpectedName { id: String, file_name: String },
    /// Report `<id>.mp3` without writing anything
    ProduceNothing { id: String },
    /// Fail like a crashed extractor
    Fail(String),
}

/// Extractor with canned answers and concurrency bookkeeping
pub(crate) struct ScriptedExtractor {
    probe: Option<ProbeInfo>,
    probe_failure: String,
    probe_delay: Duration,
    fetch: FetchScript,
    fetch_delay: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
    probe_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    seen_dirs: Mutex<Vec<PathBuf>>,
}

impl ScriptedExtractor {
    pub(crate) fn new() -> Self {
        Self {
            probe: Some(ProbeInfo {
                id: Some("abc123".into()),
                title: Some("Test Song".into()),
                duration_seconds: 65,
                thumbnail: None,
                uploader: Some("Tester".into()),
            }),
            probe_failure: String::new(),
            probe_delay: Duration::ZERO,
            fetch: FetchScript::Produce {
                id: "abc123".into(),
            },
            fetch_delay: Duration::ZERO,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            probe_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            seen_dirs: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_probe(mut self, info: ProbeInfo) -> Self {
        self.probe = Some(info);
        self
    }

    pub(crate) fn with_probe_failure(mut self, cause: &str) -> Self {
        self.probe = None;
        self.probe_failure = cause.to_string();
        self
    }

    /// Every `probe` call sleeps this long before answering
    pub(crate) fn with_probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = delay;
        self
    }

    pub(crate) fn with_fetch(mut self, script: FetchScript) -> Self {
        self.fetch = script;
        self
    }

    pub(crate) fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    /// Highest number of simultaneous `fetch_audio` calls observed
    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub(crate) fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Every workspace directory handed to `fetch_audio`
    pub(crate) fn seen_dirs(&self) -> Vec<PathBuf> {
        self.seen_dirs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    async fn probe(&self, _url: &str) -> Result<ProbeInfo> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.probe_delay).await;
        self.probe
            .clone()
            .ok_or_else(|| Error::ExternalTool(self.probe_failure.clone()))
    }

    async fn fetch_audio(&self, _url: &str, dest: &Path, _bitrate: &str) -> Result<PathBuf> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_dirs.lock().unwrap().push(dest.to_path_buf());

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.fetch_delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        match &self.fetch {
            FetchScript::Produce { id } => {
                let path = dest.join(format!("{id}.mp3"));
                std::fs::write(&path, b"ID3")?;
                Ok(path)
            }
            FetchScript::ProduceUnexpectedName { id, file_name } => {
                std::fs::write(dest.join(file_name), b"ID3")?;
                Ok(dest.join(format!("{id}.mp3")))
            }
            FetchScript::ProduceNothing { id } => Ok(dest.join(format!("{id}.mp3"))),
            FetchScript::Fail(cause) => Err(Error::ExternalTool(cause.clone())),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// One call made on the recording transport
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Sent {
    Text {
        chat: ChatId,
        text: String,
        reply_to: Option<MessageId>,
        keyboard: Option<InlineKeyboard>,
    },
    Photo {
        chat: ChatId,
        photo_url: String,
        caption: String,
        keyboard: Option<InlineKeyboard>,
    },
    Audio {
        chat: ChatId,
        file_name: String,
        title: String,
        caption: String,
        file_existed: bool,
    },
    Edit {
        chat: ChatId,
        message: MessageId,
        text: String,
        keyboard: Option<InlineKeyboard>,
    },
    Delete {
        chat: ChatId,
        message: MessageId,
    },
    Answer {
        callback_id: String,
        text: Option<String>,
        show_alert: bool,
    },
}

/// Transport that records every call instead of talking to a platform
#[derive(Default)]
pub(crate) struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
    next_id: AtomicI64,
    fail_audio: AtomicBool,
    fail_photo: AtomicBool,
    fail_answer: AtomicBool,
}

impl RecordingTransport {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1000),
            ..Default::default()
        }
    }

    pub(crate) fn failing_audio(self) -> Self {
        self.fail_audio.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn failing_photo(self) -> Self {
        self.fail_photo.store(true, Ordering::SeqCst);
        self
    }

    /// Every `answer_callback` fails like an expired query
    pub(crate) fn failing_answer(self) -> Self {
        self.fail_answer.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    /// Texts of sent and edited messages, in order
    pub(crate) fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { text, .. } | Sent::Edit { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    fn record(&self, sent: Sent) -> MessageId {
        self.sent.lock().unwrap().push(sent);
        MessageId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<MessageId> {
        Ok(self.record(Sent::Text {
            chat,
            text: text.to_string(),
            reply_to,
            keyboard: keyboard.cloned(),
        }))
    }

    async fn send_photo(
        &self,
        chat: ChatId,
        photo_url: &str,
        caption: &str,
        _reply_to: Option<MessageId>,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<MessageId> {
        if self.fail_photo.load(Ordering::SeqCst) {
            return Err(Error::Telegram {
                method: "sendPhoto".into(),
                description: "Bad Request: wrong file identifier/HTTP URL specified".into(),
            });
        }
        Ok(self.record(Sent::Photo {
            chat,
            photo_url: photo_url.to_string(),
            caption: caption.to_string(),
            keyboard: keyboard.cloned(),
        }))
    }

    async fn send_audio(
        &self,
        chat: ChatId,
        audio: &Path,
        title: &str,
        caption: &str,
    ) -> Result<MessageId> {
        if self.fail_audio.load(Ordering::SeqCst) {
            return Err(Error::Telegram {
                method: "sendAudio".into(),
                description: "Request Entity Too Large".into(),
            });
        }
        Ok(self.record(Sent::Audio {
            chat,
            file_name: audio
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            title: title.to_string(),
            caption: caption.to_string(),
            file_existed: audio.is_file(),
        }))
    }

    async fn edit_text(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<()> {
        self.record(Sent::Edit {
            chat,
            message,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(())
    }

    async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<()> {
        self.record(Sent::Delete { chat, message });
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<()> {
        if self.fail_answer.load(Ordering::SeqCst) {
            return Err(Error::Telegram {
                method: "answerCallbackQuery".into(),
                description: "Bad Request: query is too old and response timeout expired".into(),
            });
        }
        self.record(Sent::Answer {
            callback_id: callback_id.to_string(),
            text: text.map(str::to_string),
            show_alert,
        });
        Ok(())
    }
}
