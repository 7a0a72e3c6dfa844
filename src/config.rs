//! Configuration types for mp3bot

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Download behavior configuration (concurrency, audio quality, workspaces)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Maximum concurrent download jobs, the size of the permit pool (default: 3)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// Target MP3 bitrate in kbps, passed to the transcoder (default: "192")
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Directory under which per-job workspaces are created (default: system temp dir)
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: default_max_concurrent(),
            audio_bitrate: default_audio_bitrate(),
            workspace_root: default_workspace_root(),
        }
    }
}

/// External tool paths (yt-dlp, ffmpeg)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub yt_dlp_path: Option<PathBuf>,

    /// Path to ffmpeg, forwarded to yt-dlp as `--ffmpeg-location` when set
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Whether to search PATH for external binaries if explicit paths not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            yt_dlp_path: None,
            ffmpeg_path: None,
            search_path: true,
        }
    }
}

/// Messaging platform connection settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot API base URL (default: "https://api.telegram.org")
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Long-poll timeout for getUpdates (default: 60 seconds)
    #[serde(default = "default_poll_timeout", with = "duration_serde")]
    pub poll_timeout: Duration,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            poll_timeout: default_poll_timeout(),
        }
    }
}

/// Main configuration for the bot
///
/// `Debug` output redacts the token.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Bot credential token (required)
    pub bot_token: String,

    /// Download behavior settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// External tool paths
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Messaging platform settings
    #[serde(default)]
    pub telegram: TelegramConfig,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let token = if self.bot_token.is_empty() { "" } else { "<redacted>" };
        f.debug_struct("Config")
            .field("bot_token", &token)
            .field("download", &self.download)
            .field("tools", &self.tools)
            .field("telegram", &self.telegram)
            .finish()
    }
}

impl Config {
    /// Build a configuration from process environment variables
    ///
    /// `BOT_TOKEN` is required. Optional: `MAX_CONCURRENT_DOWNLOADS`, `AUDIO_BITRATE`,
    /// `WORKSPACE_DIR`, `YT_DLP_PATH`, `FFMPEG_PATH`, `TELEGRAM_API_BASE`,
    /// `POLL_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup, then validate it
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bot_token = get("BOT_TOKEN")
            .ok_or_else(|| Error::config("bot_token", "BOT_TOKEN must be set"))?;

        let mut config = Config {
            bot_token,
            ..Default::default()
        };

        if let Some(raw) = get("MAX_CONCURRENT_DOWNLOADS") {
            config.download.max_concurrent_downloads = raw.parse().map_err(|_| {
                Error::config(
                    "max_concurrent_downloads",
                    format!("MAX_CONCURRENT_DOWNLOADS is not a number: {raw}"),
                )
            })?;
        }
        if let Some(raw) = get("AUDIO_BITRATE") {
            config.download.audio_bitrate = raw;
        }
        if let Some(raw) = get("WORKSPACE_DIR") {
            config.download.workspace_root = PathBuf::from(raw);
        }
        if let Some(raw) = get("YT_DLP_PATH") {
            config.tools.yt_dlp_path = Some(PathBuf::from(raw));
        }
        if let Some(raw) = get("FFMPEG_PATH") {
            config.tools.ffmpeg_path = Some(PathBuf::from(raw));
        }
        if let Some(raw) = get("TELEGRAM_API_BASE") {
            config.telegram.api_base = raw.trim_end_matches('/').to_string();
        }
        if let Some(raw) = get("POLL_TIMEOUT_SECS") {
            let secs: u64 = raw.parse().map_err(|_| {
                Error::config(
                    "poll_timeout",
                    format!("POLL_TIMEOUT_SECS is not a number: {raw}"),
                )
            })?;
            config.telegram.poll_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde defaults cannot express
    pub fn validate(&self) -> Result<()> {
        if self.bot_token.trim().is_empty() {
            return Err(Error::config("bot_token", "bot token must not be empty"));
        }
        if self.download.max_concurrent_downloads == 0 {
            return Err(Error::config(
                "max_concurrent_downloads",
                "at least one concurrent download is required",
            ));
        }
        let bitrate = self.download.audio_bitrate.as_str();
        if bitrate.is_empty() || !bitrate.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::config(
                "audio_bitrate",
                format!("audio bitrate must be a number of kbps, got {bitrate:?}"),
            ));
        }
        if url::Url::parse(&self.telegram.api_base).is_err() {
            return Err(Error::config(
                "api_base",
                format!("not a valid URL: {}", self.telegram.api_base),
            ));
        }
        Ok(())
    }
}

fn default_max_concurrent() -> usize {
    3
}

fn default_audio_bitrate() -> String {
    "192".to_string()
}

fn default_workspace_root() -> PathBuf {
    std::env::temp_dir()
}

fn default_true() -> bool {
    true
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout() -> Duration {
    Duration::from_secs(60)
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
