//! Test fixtures: a fake extractor and configuration helpers

use async_trait::async_trait;
use mp3bot::{Config, Extractor, ProbeInfo};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Link used throughout the integration tests
pub const TEST_LINK: &str = "https://youtu.be/jNQXAC9IVRw";

/// Bot token the mock API is mounted under
pub const TEST_TOKEN: &str = "123:ABC";

/// Extractor that writes a small fake MP3 instead of running yt-dlp
pub struct FakeExtractor {
    pub delay: Duration,
    pub fetches: AtomicUsize,
}

impl FakeExtractor {
    pub fn new() -> Self {
        Self {
            delay: Duration::from_millis(10),
            fetches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn probe(&self, _url: &str) -> mp3bot::Result<ProbeInfo> {
        Ok(ProbeInfo {
            id: Some("jNQXAC9IVRw".to_string()),
            title: Some("Me at the zoo".to_string()),
            duration_seconds: 19,
            thumbnail: None,
            uploader: Some("jawed".to_string()),
        })
    }

    async fn fetch_audio(&self, _url: &str, dest: &Path, _bitrate: &str) -> mp3bot::Result<PathBuf> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let path = dest.join("jNQXAC9IVRw.mp3");
        tokio::fs::write(&path, b"ID3\x04\x00fake").await?;
        Ok(path)
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Configuration pointing at a mock API and a private workspace root
pub fn test_config(api_base: &str, workspace_root: &Path) -> Config {
    let mut config = Config {
        bot_token: TEST_TOKEN.to_string(),
        ..Config::default()
    };
    config.telegram.api_base = api_base.to_string();
    config.telegram.poll_timeout = Duration::from_secs(1);
    config.download.workspace_root = workspace_root.to_path_buf();
    config
}

/// Number of entries left under the workspace root
pub fn leftover_workspaces(root: &Path) -> usize {
    std::fs::read_dir(root).map(|d| d.count()).unwrap_or(0)
}
