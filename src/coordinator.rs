//! Download coordinator: bounded-concurrency MP3 jobs
//!
//! Every confirmed request becomes one job. A job:
//! 1. waits for a permit from the pool (at most `max_concurrent_downloads` run at once)
//! 2. creates its own [`Workspace`]
//! 3. runs the extractor into the workspace while re-probing metadata for the caption
//! 4. locates the produced MP3
//! 5. delivers it to the chat
//! 6. reports any failure to the chat by category only
//! 7. removes the workspace and releases the permit, on every path
//!
//! The permit is held through delivery, so at most N workspaces exist at any
//! moment.

use crate::config::DownloadConfig;
use crate::error::{Error, JobError, Result};
use crate::extractor::Extractor;
use crate::format::{FALLBACK_TITLE, UNKNOWN_DURATION, audio_caption, display_title};
use crate::probe::MetadataProbe;
use crate::transport::Transport;
use crate::types::{ChatId, Event, JobId, MessageId};
use crate::workspace::{self, Workspace};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Capacity of the lifecycle event channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A confirmed download request
#[derive(Clone, Debug)]
pub struct JobRequest {
    /// Chat the audio is delivered to
    pub chat: ChatId,
    /// Link confirmed by the user
    pub url: String,
    /// "Downloading…" message to update on failure and remove on success
    pub status_message: Option<MessageId>,
}

/// Outcome of a delivered job
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    /// Job identifier
    pub job_id: JobId,
    /// Title used for the audio (already cut to the display limit)
    pub title: String,
    /// Duration shown in the caption
    pub duration: String,
    /// Message carrying the audio
    pub message: MessageId,
}

/// A running job: owns its workspace and its permit
struct Job {
    id: JobId,
    url: String,
    workspace: Workspace,
    _permit: OwnedSemaphorePermit,
}

/// Produced audio plus the caption fields
struct Artifact {
    path: PathBuf,
    title: String,
    duration: String,
}

/// Runs download jobs under a fixed-size permit pool
pub struct DownloadCoordinator {
    permits: Arc<Semaphore>,
    max_concurrent: usize,
    extractor: Arc<dyn Extractor>,
    probe: MetadataProbe,
    transport: Arc<dyn Transport>,
    workspace_root: PathBuf,
    audio_bitrate: String,
    event_tx: broadcast::Sender<Event>,
    next_id: AtomicU64,
    shutdown: CancellationToken,
}

impl DownloadCoordinator {
    /// Create a coordinator with `config.max_concurrent_downloads` permits
    pub fn new(
        config: &DownloadConfig,
        extractor: Arc<dyn Extractor>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            permits: Arc::new(Semaphore::new(config.max_concurrent_downloads)),
            max_concurrent: config.max_concurrent_downloads,
            probe: MetadataProbe::new(Arc::clone(&extractor)),
            extractor,
            transport,
            workspace_root: config.workspace_root.clone(),
            audio_bitrate: config.audio_bitrate.clone(),
            event_tx,
            next_id: AtomicU64::new(1),
            shutdown: CancellationToken::new(),
        }
    }

    /// Subscribe to job lifecycle events
    ///
    /// Receivers that fall behind miss events (see [`broadcast`]).
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Size of the permit pool
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Number of jobs currently holding a permit
    pub fn active_jobs(&self) -> usize {
        self.max_concurrent
            .saturating_sub(self.permits.available_permits())
    }

    /// Remove workspaces left under the workspace root by an earlier process
    pub async fn sweep_stale_workspaces(&self) -> Result<usize> {
        workspace::sweep_stale(&self.workspace_root).await
    }

    /// Interrupt running jobs and refuse new ones
    ///
    /// Interrupted jobs still remove their workspace and report to the chat.
    pub fn shutdown(&self) {
        info!("download coordinator shutting down");
        self.shutdown.cancel();
        self.permits.close();
    }

    /// Run one job to completion
    ///
    /// Waits for a permit first. The failure, if any, has already been shown
    /// in the chat when this returns; the returned error is for logging and tests.
    pub async fn run_job(&self, request: JobRequest) -> std::result::Result<Delivery, JobError> {
        let id = JobId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.emit(Event::Waiting {
            id,
            url: request.url.clone(),
        });

        let result = match self.start(id, &request).await {
            Ok(job) => self.run_started(job, &request).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(delivery) => {
                info!(job_id = %id, title = %delivery.title, "audio delivered");
                self.emit(Event::Delivered {
                    id,
                    title: delivery.title.clone(),
                });
            }
            Err(e) => {
                error!(job_id = %id, url = %request.url, category = e.category(), error = %e, "job failed");
                self.report_failure(&request, e).await;
                self.emit(Event::Failed {
                    id,
                    category: e.category().to_string(),
                });
            }
        }
        result
    }

    /// Acquire a permit and create the workspace
    async fn start(&self, id: JobId, request: &JobRequest) -> std::result::Result<Job, JobError> {
        let permit = tokio::select! {
            permit = Arc::clone(&self.permits).acquire_owned() => {
                permit.map_err(|_| Error::ShuttingDown)?
            }
            _ = self.shutdown.cancelled() => return Err(Error::ShuttingDown.into()),
        };

        let workspace = Workspace::create(&self.workspace_root).await?;
        debug!(job_id = %id, workspace = ?workspace.path(), "job started");
        self.emit(Event::Started {
            id,
            workspace: workspace.path().to_path_buf(),
        });

        Ok(Job {
            id,
            url: request.url.clone(),
            workspace,
            _permit: permit,
        })
    }

    /// Run a started job, then remove its workspace and release its permit
    async fn run_started(
        &self,
        job: Job,
        request: &JobRequest,
    ) -> std::result::Result<Delivery, JobError> {
        let result = tokio::select! {
            result = self.execute(&job, request) => result,
            _ = self.shutdown.cancelled() => Err(Error::ShuttingDown.into()),
        };

        let Job {
            id,
            workspace,
            _permit: permit,
            ..
        } = job;
        match workspace.close().await {
            Ok(path) => self.emit(Event::WorkspaceRemoved {
                id,
                workspace: path,
            }),
            Err(e) => warn!(job_id = %id, error = %e, "failed to remove workspace"),
        }
        drop(permit);

        result
    }

    async fn execute(&self, job: &Job, request: &JobRequest) -> std::result::Result<Delivery, JobError> {
        let artifact = self.produce(job).await?;
        let message = self.deliver(request, &artifact).await?;
        Ok(Delivery {
            job_id: job.id,
            title: artifact.title,
            duration: artifact.duration,
            message,
        })
    }

    /// Extract into the workspace and find the result
    async fn produce(&self, job: &Job) -> std::result::Result<Artifact, JobError> {
        let (fetched, meta) = tokio::join!(
            self.extractor
                .fetch_audio(&job.url, job.workspace.path(), &self.audio_bitrate),
            self.probe.fetch_meta(&job.url),
        );
        let expected = fetched?;

        let path = job
            .workspace
            .locate_audio(&expected)
            .await?
            .ok_or(JobError::ArtifactMissing)?;

        let (title, duration) = match meta {
            Some(meta) => (display_title(&meta.title).to_string(), meta.duration_display),
            None => (FALLBACK_TITLE.to_string(), UNKNOWN_DURATION.to_string()),
        };
        debug!(job_id = %job.id, audio = ?path, "audio located");
        Ok(Artifact {
            path,
            title,
            duration,
        })
    }

    /// Send the audio; fall back to showing the caption in the status message
    async fn deliver(
        &self,
        request: &JobRequest,
        artifact: &Artifact,
    ) -> std::result::Result<MessageId, JobError> {
        let caption = audio_caption(&artifact.title, &artifact.duration);
        match self
            .transport
            .send_audio(request.chat, &artifact.path, &artifact.title, &caption)
            .await
        {
            Ok(message) => {
                if let Some(status) = request.status_message {
                    if let Err(e) = self.transport.delete_message(request.chat, status).await {
                        debug!(error = %e, "could not remove status message");
                    }
                }
                Ok(message)
            }
            Err(e) => {
                if let Some(status) = request.status_message {
                    let edited = self
                        .transport
                        .edit_text(request.chat, status, &caption, None)
                        .await;
                    if let Err(edit_err) = edited {
                        warn!(error = %edit_err, "could not show caption after failed delivery");
                    }
                }
                Err(JobError::DeliveryFailed(e))
            }
        }
    }

    /// Show the failure category in the chat
    async fn report_failure(&self, request: &JobRequest, err: &JobError) {
        // The caption fallback already replaced the status message
        if matches!(err, JobError::DeliveryFailed(_)) {
            return;
        }
        let text = err.user_message();
        let sent = match request.status_message {
            Some(status) => {
                self.transport
                    .edit_text(request.chat, status, &text, None)
                    .await
            }
            None => self
                .transport
                .send_text(request.chat, &text, None, None)
                .await
                .map(|_| ()),
        };
        if let Err(e) = sent {
            warn!(chat_id = %request.chat, error = %e, "could not report job failure");
        }
    }

    fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::ProbeInfo;
    use crate::test_helpers::{FetchScript, RecordingTransport, ScriptedExtractor, Sent};
    use std::time::Duration;
    use tempfile::TempDir;

    const URL: &str = "https://youtu.be/abc123";
    const CHAT: ChatId = ChatId(42);
    const STATUS: MessageId = MessageId(7);

    struct Harness {
        root: TempDir,
        extractor: Arc<ScriptedExtractor>,
        transport: Arc<RecordingTransport>,
        coordinator: Arc<DownloadCoordinator>,
    }

    fn harness(extractor: ScriptedExtractor, transport: RecordingTransport) -> Harness {
        let root = tempfile::tempdir().unwrap();
        let config = DownloadConfig {
            max_concurrent_downloads: 3,
            audio_bitrate: "192".into(),
            workspace_root: root.path().to_path_buf(),
        };
        let extractor = Arc::new(extractor);
        let transport = Arc::new(transport);
        let coordinator = Arc::new(DownloadCoordinator::new(
            &config,
            extractor.clone(),
            transport.clone(),
        ));
        Harness {
            root,
            extractor,
            transport,
            coordinator,
        }
    }

    fn request() -> JobRequest {
        JobRequest {
            chat: CHAT,
            url: URL.into(),
            status_message: Some(STATUS),
        }
    }

    fn workspace_count(root: &TempDir) -> usize {
        std::fs::read_dir(root.path()).unwrap().count()
    }

    #[tokio::test]
    async fn successful_job_delivers_and_cleans_up() {
        let h = harness(ScriptedExtractor::new(), RecordingTransport::new());
        let mut events = h.coordinator.subscribe();

        let delivery = h.coordinator.run_job(request()).await.unwrap();
        assert_eq!(delivery.title, "Test Song");
        assert_eq!(delivery.duration, "1:05");

        let sent = h.transport.sent();
        assert!(sent.iter().any(|s| matches!(
            s,
            Sent::Audio { file_name, caption, file_existed: true, .. }
                if file_name == "abc123.mp3" && caption == "Title: Test Song\nDuration: 1:05"
        )));
        assert!(sent.contains(&Sent::Delete {
            chat: CHAT,
            message: STATUS
        }));

        assert_eq!(workspace_count(&h.root), 0);
        for dir in h.extractor.seen_dirs() {
            assert!(!dir.exists());
        }
        assert_eq!(h.coordinator.active_jobs(), 0);

        let mut kinds = Vec::new();
        while let Ok(event) = events.try_recv() {
            kinds.push(match event {
                Event::Waiting { .. } => "waiting",
                Event::Started { .. } => "started",
                Event::WorkspaceRemoved { .. } => "removed",
                Event::Delivered { .. } => "delivered",
                Event::Failed { .. } => "failed",
            });
        }
        assert_eq!(kinds, ["waiting", "started", "removed", "delivered"]);
    }

    #[tokio::test]
    async fn never_more_than_three_jobs_at_once() {
        let h = harness(
            ScriptedExtractor::new().with_fetch_delay(Duration::from_millis(50)),
            RecordingTransport::new(),
        );

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let coordinator = Arc::clone(&h.coordinator);
                tokio::spawn(async move { coordinator.run_job(request()).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(h.extractor.fetch_calls(), 10);
        assert!(h.extractor.peak() <= 3, "peak was {}", h.extractor.peak());
        assert!(h.extractor.peak() >= 2);
        assert_eq!(workspace_count(&h.root), 0);

        let audio = h
            .transport
            .sent()
            .into_iter()
            .filter(|s| matches!(s, Sent::Audio { .. }))
            .count();
        assert_eq!(audio, 10);
    }

    #[tokio::test]
    async fn unexpected_file_name_is_still_delivered() {
        let h = harness(
            ScriptedExtractor::new().with_fetch(FetchScript::ProduceUnexpectedName {
                id: "abc123".into(),
                file_name: "Test Song [abc123].mp3".into(),
            }),
            RecordingTransport::new(),
        );

        h.coordinator.run_job(request()).await.unwrap();
        assert!(h.transport.sent().iter().any(|s| matches!(
            s,
            Sent::Audio { file_name, .. } if file_name == "Test Song [abc123].mp3"
        )));
    }

    #[tokio::test]
    async fn missing_artifact_is_reported_and_cleaned_up() {
        let h = harness(
            ScriptedExtractor::new().with_fetch(FetchScript::ProduceNothing {
                id: "abc123".into(),
            }),
            RecordingTransport::new(),
        );

        let err = h.coordinator.run_job(request()).await.unwrap_err();
        assert!(matches!(err, JobError::ArtifactMissing));
        assert!(h.transport.sent().contains(&Sent::Edit {
            chat: CHAT,
            message: STATUS,
            text: "Download failed: artifact_missing".into(),
            keyboard: None,
        }));
        assert_eq!(workspace_count(&h.root), 0);
    }

    #[tokio::test]
    async fn extractor_failure_shows_category_only() {
        let h = harness(
            ScriptedExtractor::new().with_fetch(FetchScript::Fail(
                "ERROR: [youtube] abc123: secret internal detail".into(),
            )),
            RecordingTransport::new(),
        );

        let err = h.coordinator.run_job(request()).await.unwrap_err();
        assert!(matches!(err, JobError::Unclassified(Error::ExternalTool(_))));

        let texts = h.transport.texts();
        assert_eq!(texts, ["Download failed: external_tool_error"]);
        assert!(!texts.iter().any(|t| t.contains("secret")));
        assert_eq!(workspace_count(&h.root), 0);
        assert_eq!(h.coordinator.active_jobs(), 0);
    }

    #[tokio::test]
    async fn failure_without_status_message_sends_new_text() {
        let h = harness(
            ScriptedExtractor::new().with_fetch(FetchScript::Fail("boom".into())),
            RecordingTransport::new(),
        );
        let req = JobRequest {
            status_message: None,
            ..request()
        };

        h.coordinator.run_job(req).await.unwrap_err();
        assert!(matches!(
            h.transport.sent().as_slice(),
            [Sent::Text { text, .. }] if text == "Download failed: external_tool_error"
        ));
    }

    #[tokio::test]
    async fn caption_falls_back_when_metadata_fails() {
        let h = harness(
            ScriptedExtractor::new().with_probe_failure("ERROR: network unreachable"),
            RecordingTransport::new(),
        );

        let delivery = h.coordinator.run_job(request()).await.unwrap();
        assert_eq!(delivery.title, "MP3");
        assert_eq!(delivery.duration, "Unknown");
        assert!(h.transport.sent().iter().any(|s| matches!(
            s,
            Sent::Audio { title, caption, .. }
                if title == "MP3" && caption == "Title: MP3\nDuration: Unknown"
        )));
    }

    #[tokio::test]
    async fn long_titles_are_cut_for_the_audio() {
        let long = "x".repeat(100);
        let h = harness(
            ScriptedExtractor::new().with_probe(ProbeInfo {
                title: Some(long),
                duration_seconds: 10,
                ..ProbeInfo::default()
            }),
            RecordingTransport::new(),
        );

        let delivery = h.coordinator.run_job(request()).await.unwrap();
        assert_eq!(delivery.title.chars().count(), 64);
    }

    #[tokio::test]
    async fn delivery_failure_edits_status_with_caption() {
        let h = harness(
            ScriptedExtractor::new(),
            RecordingTransport::new().failing_audio(),
        );

        let err = h.coordinator.run_job(request()).await.unwrap_err();
        assert!(matches!(err, JobError::DeliveryFailed(_)));
        assert_eq!(err.category(), "delivery_failed");
        assert_eq!(h.transport.texts(), ["Title: Test Song\nDuration: 1:05"]);
        assert_eq!(workspace_count(&h.root), 0);
    }

    #[tokio::test]
    async fn shutdown_interrupts_running_job_and_cleans_up() {
        let h = harness(
            ScriptedExtractor::new().with_fetch_delay(Duration::from_secs(30)),
            RecordingTransport::new(),
        );

        let coordinator = Arc::clone(&h.coordinator);
        let job = tokio::spawn(async move { coordinator.run_job(request()).await });

        // Wait until the job is inside the extractor
        while h.extractor.fetch_calls() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(workspace_count(&h.root), 1);

        h.coordinator.shutdown();
        let err = job.await.unwrap().unwrap_err();
        assert_eq!(err.category(), "shutting_down");
        assert_eq!(workspace_count(&h.root), 0);
    }

    #[tokio::test]
    async fn jobs_after_shutdown_are_refused() {
        let h = harness(ScriptedExtractor::new(), RecordingTransport::new());
        h.coordinator.shutdown();

        let err = h.coordinator.run_job(request()).await.unwrap_err();
        assert_eq!(err.category(), "shutting_down");
        assert_eq!(h.extractor.fetch_calls(), 0);
        assert_eq!(workspace_count(&h.root), 0);
    }

    #[tokio::test]
    async fn unusable_workspace_root_fails_job_and_frees_permit() {
        let root = tempfile::tempdir().unwrap();
        let blocked = root.path().join("occupied");
        std::fs::write(&blocked, b"x").unwrap();
        let config = DownloadConfig {
            max_concurrent_downloads: 1,
            audio_bitrate: "192".into(),
            workspace_root: blocked,
        };
        let extractor = Arc::new(ScriptedExtractor::new());
        let transport = Arc::new(RecordingTransport::new());
        let coordinator =
            DownloadCoordinator::new(&config, extractor.clone(), transport.clone());

        for _ in 0..2 {
            let err = coordinator.run_job(request()).await.unwrap_err();
            assert_eq!(err.category(), "io_error");
        }
        assert_eq!(extractor.fetch_calls(), 0);
        assert_eq!(coordinator.active_jobs(), 0);
        assert_eq!(
            transport.texts(),
            ["Download failed: io_error", "Download failed: io_error"]
        );
    }

    #[tokio::test]
    async fn sweep_removes_leftovers_under_root() {
        let h = harness(ScriptedExtractor::new(), RecordingTransport::new());
        std::fs::create_dir(h.root.path().join("ytmp3_old")).unwrap();

        assert_eq!(h.coordinator.sweep_stale_workspaces().await.unwrap(), 1);
        assert_eq!(workspace_count(&h.root), 0);
    }
}
