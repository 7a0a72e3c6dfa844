//! Traits and types for media extraction

use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Raw metadata reported by the extractor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeInfo {
    /// Stable identifier of the resource on its host
    pub id: Option<String>,
    /// Title, if the host reports one
    pub title: Option<String>,
    /// Duration in whole seconds (0 when unknown)
    pub duration_seconds: i64,
    /// Thumbnail URL
    pub thumbnail: Option<String>,
    /// Uploader, or channel when no uploader is reported
    pub uploader: Option<String>,
}

/// Trait for the extraction and transcoding engine
///
/// Both operations may take arbitrarily long; callers never hold locks across them.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Read metadata without retrieving any media
    async fn probe(&self, url: &str) -> crate::Result<ProbeInfo>;

    /// Download the best audio stream of `url` and transcode it to MP3 at
    /// `bitrate` kbps inside `dest`
    ///
    /// # Returns
    ///
    /// The path the output is expected at, `<dest>/<id>.mp3`. The file is not
    /// guaranteed to exist; callers look for a fallback when it does not.
    async fn fetch_audio(&self, url: &str, dest: &Path, bitrate: &str) -> crate::Result<PathBuf>;

    /// Get the name of this implementation
    fn name(&self) -> &'static str;
}
