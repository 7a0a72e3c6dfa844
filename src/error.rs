//! Error types for mp3bot
//!
//! Two layers of errors live here:
//! - [`Error`] covers infrastructure failures (I/O, HTTP, the yt-dlp child process,
//!   configuration) and carries full detail for logs.
//! - [`JobError`] is the closed set of outcomes a user can see when a preview or a
//!   download does not succeed. Only its category ever reaches the chat.

use thiserror::Error;

/// Result type alias for mp3bot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for mp3bot
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "bot_token")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error talking to the messaging platform
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The Bot API answered with `ok: false`
    #[error("telegram {method} failed: {description}")]
    Telegram {
        /// API method that was called (e.g., "sendAudio")
        method: String,
        /// Description returned by the API
        description: String,
    },

    /// External tool execution failed (yt-dlp, ffmpeg)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Operation not supported (missing binary, etc.)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Shutdown in progress - running jobs are interrupted
    #[error("shutdown in progress")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Machine-readable error category
    ///
    /// This is the only part of an infrastructure error that may be shown to a
    /// chat user; the full message stays in the logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Telegram { .. } => "telegram_error",
            Error::ExternalTool(_) => "external_tool_error",
            Error::NotSupported(_) => "not_supported",
            Error::ShuttingDown => "shutting_down",
            Error::Other(_) => "internal_error",
        }
    }

    /// Shorthand for a configuration error tied to a key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

/// User-facing failure of a preview or download job
///
/// Every failure inside a job is converted into one of these at the job boundary.
#[derive(Debug, Error)]
pub enum JobError {
    /// Text did not pass the link classifier (or is too long to confirm)
    #[error("invalid link")]
    InvalidLink,

    /// Metadata probe failed; the job does not proceed
    #[error("metadata unavailable")]
    MetadataUnavailable,

    /// Extraction finished but no audio file was found in the workspace
    #[error("audio artifact missing after extraction")]
    ArtifactMissing,

    /// The artifact exists but the transport refused it
    #[error("delivery failed: {0}")]
    DeliveryFailed(#[source] Error),

    /// Anything else that went wrong while the job ran
    #[error("job failed: {0}")]
    Unclassified(#[source] Error),
}

impl JobError {
    /// Short category safe to show to users
    pub fn category(&self) -> &'static str {
        match self {
            JobError::InvalidLink => "invalid_link",
            JobError::MetadataUnavailable => "metadata_unavailable",
            JobError::ArtifactMissing => "artifact_missing",
            JobError::DeliveryFailed(_) => "delivery_failed",
            JobError::Unclassified(e) => e.error_code(),
        }
    }

    /// Text shown in the chat for this failure
    pub fn user_message(&self) -> String {
        match self {
            JobError::InvalidLink => "Invalid URL.".to_string(),
            JobError::MetadataUnavailable => {
                "Could not read video info. Try another link.".to_string()
            }
            other => format!("Download failed: {}", other.category()),
        }
    }
}

impl From<Error> for JobError {
    fn from(error: Error) -> Self {
        JobError::Unclassified(error)
    }
}
