//! # mp3bot
//!
//! Chat bot that turns YouTube links into MP3 files.
//!
//! A user sends a link (or `/download_mp3 <link>` in a group), gets a preview
//! card with title, duration and uploader, and presses "Download MP3". The
//! download runs as a job under a fixed-size permit pool (3 by default), in its
//! own scratch directory that is removed when the job ends, whatever the outcome.
//!
//! ## Components
//!
//! - [`link`]: cheap check whether text looks like a supported link
//! - [`probe`]: metadata lookups for previews and captions
//! - [`coordinator`]: bounded-concurrency download jobs
//! - [`state`]: per-user "awaiting a link" flag
//! - [`dispatcher`]: routes commands, text and button presses
//! - [`bot`]: long-polling runner
//!
//! ## Quick Start
//!
//! ```no_run
//! use mp3bot::{Bot, Config, run_with_shutdown};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let bot = Bot::new(&config)?;
//!
//!     // Watch jobs
//!     let mut events = bot.coordinator().subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     run_with_shutdown(bot).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Long-polling bot runner
pub mod bot;
/// Configuration types
pub mod config;
/// Bounded-concurrency download jobs
pub mod coordinator;
/// Inbound event routing and previews
pub mod dispatcher;
/// Error types
pub mod error;
/// Media extraction collaborator
pub mod extractor;
/// Display formatting for previews and captions
pub mod format;
/// Link classification and truncation helpers
pub mod link;
/// Metadata probe
pub mod probe;
/// Per-user conversation state
pub mod state;
/// Messaging platform transport
pub mod transport;
/// Core types and events
pub mod types;
/// Per-job scratch directories
pub mod workspace;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use bot::Bot;
pub use config::{Config, DownloadConfig, TelegramConfig, ToolsConfig};
pub use coordinator::{Delivery, DownloadCoordinator, JobRequest};
pub use dispatcher::Dispatcher;
pub use error::{Error, JobError, Result};
pub use extractor::{Extractor, ProbeInfo, YtDlpExtractor};
pub use link::is_candidate_link;
pub use probe::MetadataProbe;
pub use state::{ConversationState, TextDecision, UserState};
pub use transport::{TelegramTransport, Transport};
pub use types::{
    CallbackData, ChatId, ChatKind, Event, InboundEvent, InlineKeyboard, JobId, MessageId,
    Origin, UserId, VideoMeta,
};

/// Run the bot until a termination signal arrives, then shut it down.
///
/// Polling stops, running jobs are interrupted (their chats get a failure
/// message and their workspaces are removed) and handler tasks are awaited.
/// An error from the bot itself (e.g. a rejected token) ends the run early.
///
/// - **Unix:** listens for SIGTERM and SIGINT; SIGINT falls back to `ctrl_c` if it cannot be registered.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown(bot: Bot) -> Result<()> {
    let result = tokio::select! {
        result = bot.run() => result,
        _ = wait_for_signal() => Ok(()),
    };
    bot.shutdown().await;
    result
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::SignalKind;

    tokio::select! {
        _ = unix_signal(SignalKind::terminate(), "SIGTERM") => {}
        _ = unix_signal(SignalKind::interrupt(), "SIGINT") => {}
    }
}

/// Resolves on the first delivery of `kind`. If the handler cannot be
/// registered, SIGINT falls back to `ctrl_c` and SIGTERM never resolves.
#[cfg(unix)]
async fn unix_signal(kind: tokio::signal::unix::SignalKind, name: &'static str) {
    match tokio::signal::unix::signal(kind) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) if name == "SIGINT" => {
            tracing::warn!(signal = name, error = %e, "signal handler unavailable, using ctrl_c");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "no interrupt handler could be installed");
                std::future::pending::<()>().await;
            }
        }
        Err(e) => {
            tracing::warn!(signal = name, error = %e, "signal handler unavailable");
            std::future::pending::<()>().await;
        }
    }
    tracing::info!(signal = name, "shutdown signal received");
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!(signal = "ctrl_c", "shutdown signal received"),
        Err(e) => {
            tracing::error!(error = %e, "no interrupt handler could be installed");
            std::future::pending::<()>().await;
        }
    }
}
