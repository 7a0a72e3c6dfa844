//! Long-polling bot runner
//!
//! [`Bot`] wires the transport, the extractor, the coordinator and the
//! dispatcher together, polls for updates and hands every event to its own
//! task. Shutdown interrupts running jobs and metadata lookups, then waits
//! for every handler task.

use crate::config::Config;
use crate::coordinator::DownloadCoordinator;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::extractor::{Extractor, YtDlpExtractor};
use crate::probe::MetadataProbe;
use crate::transport::{TelegramTransport, Transport};
use crate::types::InboundEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Pause after a failed poll before trying again
const POLL_ERROR_DELAY: Duration = Duration::from_secs(5);

/// The running bot
pub struct Bot {
    transport: Arc<TelegramTransport>,
    coordinator: Arc<DownloadCoordinator>,
    dispatcher: Arc<Dispatcher>,
    cancel: CancellationToken,
    tasks: TaskTracker,
}

impl Bot {
    /// Build a bot that drives the `yt-dlp` binary
    ///
    /// Fails when the configuration is invalid or no `yt-dlp` binary is found.
    pub fn new(config: &Config) -> Result<Self> {
        let extractor = YtDlpExtractor::from_config(&config.tools)?;
        info!(
            extractor = extractor.name(),
            binary = ?extractor.binary_path(),
            "extractor ready"
        );
        Self::with_extractor(config, Arc::new(extractor))
    }

    /// Build a bot around any extractor
    pub fn with_extractor(config: &Config, extractor: Arc<dyn Extractor>) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(TelegramTransport::new(
            config.bot_token.clone(),
            &config.telegram,
        )?);
        let shared: Arc<dyn Transport> = transport.clone();
        let cancel = CancellationToken::new();

        let coordinator = Arc::new(DownloadCoordinator::new(
            &config.download,
            Arc::clone(&extractor),
            Arc::clone(&shared),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            shared,
            MetadataProbe::new(extractor),
            Arc::clone(&coordinator),
        )
        .with_shutdown(cancel.child_token()));

        Ok(Self {
            transport,
            coordinator,
            dispatcher,
            cancel,
            tasks: TaskTracker::new(),
        })
    }

    /// Download coordinator (e.g. to subscribe to job events)
    pub fn coordinator(&self) -> &Arc<DownloadCoordinator> {
        &self.coordinator
    }

    /// Event dispatcher
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Poll for updates until [`shutdown`](Self::shutdown) is called
    ///
    /// Checks the credential and sweeps stale workspaces first. A failed
    /// credential check ends the run with an error; failed polls are logged
    /// and retried after a pause.
    pub async fn run(&self) -> Result<()> {
        let username = self.transport.get_me().await?;
        info!(bot = %username, "connected to telegram");

        match self.coordinator.sweep_stale_workspaces().await {
            Ok(removed) => debug!(removed, "stale workspace sweep done"),
            Err(e) => warn!(error = %e, "stale workspace sweep failed"),
        }

        let mut offset = 0;
        loop {
            let polled = tokio::select! {
                _ = self.cancel.cancelled() => break,
                polled = self.transport.get_updates(offset) => polled,
            };

            match polled {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        if let Some(event) = update.into_event() {
                            self.spawn_event(event);
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "polling updates failed");
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(POLL_ERROR_DELAY) => {}
                    }
                }
            }
        }

        info!("stopped polling updates");
        Ok(())
    }

    fn spawn_event(&self, event: InboundEvent) {
        let dispatcher = Arc::clone(&self.dispatcher);
        self.tasks.spawn(async move {
            dispatcher.handle(event).await;
        });
    }

    /// Stop polling, interrupt running jobs and previews, and wait for every
    /// handler task
    pub async fn shutdown(&self) {
        info!("shutting down bot");
        self.cancel.cancel();
        self.coordinator.shutdown();
        self.tasks.close();
        self.tasks.wait().await;
        info!("shutdown complete");
    }
}
