//! yt-dlp based extractor using the external binary

use super::parser::{last_error_line, parse_fetch_output, parse_probe_output};
use super::traits::{Extractor, ProbeInfo};
use crate::config::ToolsConfig;
use crate::error::Error;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::debug;

/// Extractor backed by the external `yt-dlp` binary
///
/// Both operations spawn a child process. The child is killed if the awaiting
/// future is dropped, so an interrupted job does not leave a transcoder running
/// in a removed workspace.
///
/// # Examples
///
/// ```no_run
/// use mp3bot::extractor::YtDlpExtractor;
/// use std::path::PathBuf;
///
/// // Create with explicit path
/// let extractor = YtDlpExtractor::new(PathBuf::from("/usr/local/bin/yt-dlp"));
///
/// // Or auto-discover from PATH
/// let extractor = YtDlpExtractor::from_path().expect("yt-dlp not found in PATH");
/// ```
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    binary_path: PathBuf,
    ffmpeg_path: Option<PathBuf>,
}

impl YtDlpExtractor {
    /// Create an extractor with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self {
            binary_path,
            ffmpeg_path: None,
        }
    }

    /// Attempt to find yt-dlp in PATH
    ///
    /// Uses the `which` crate to search for the `yt-dlp` binary in the system PATH.
    pub fn from_path() -> Option<Self> {
        which::which("yt-dlp").ok().map(Self::new)
    }

    /// Resolve the binary from tool configuration
    ///
    /// An explicit `yt_dlp_path` wins; otherwise PATH is searched when allowed.
    pub fn from_config(tools: &ToolsConfig) -> crate::Result<Self> {
        let extractor = match &tools.yt_dlp_path {
            Some(path) => Self::new(path.clone()),
            None if tools.search_path => Self::from_path().ok_or_else(|| {
                Error::NotSupported("yt-dlp binary not found in PATH".to_string())
            })?,
            None => {
                return Err(Error::NotSupported(
                    "yt-dlp path not configured and PATH search disabled".to_string(),
                ));
            }
        };
        Ok(extractor.with_ffmpeg(tools.ffmpeg_path.clone()))
    }

    /// Point yt-dlp at a specific ffmpeg binary
    pub fn with_ffmpeg(mut self, ffmpeg_path: Option<PathBuf>) -> Self {
        self.ffmpeg_path = ffmpeg_path;
        self
    }

    /// Path of the yt-dlp binary in use
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    fn probe_args(url: &str) -> Vec<String> {
        [
            "--dump-single-json",
            "--skip-download",
            "--no-playlist",
            "--no-warnings",
            "--quiet",
            "--",
            url,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn fetch_args(&self, url: &str, dest: &Path, bitrate: &str) -> Vec<String> {
        let template = dest.join("%(id)s.%(ext)s");
        let mut args: Vec<String> = vec![
            "--format".into(),
            "bestaudio/best".into(),
            "--no-playlist".into(),
            "--no-warnings".into(),
            "--no-progress".into(),
            "--extract-audio".into(),
            "--audio-format".into(),
            "mp3".into(),
            "--audio-quality".into(),
            format!("{bitrate}K"),
            "--output".into(),
            template.to_string_lossy().into_owned(),
            "--print".into(),
            "after_move:id".into(),
        ];
        if let Some(ffmpeg) = &self.ffmpeg_path {
            args.push("--ffmpeg-location".into());
            args.push(ffmpeg.to_string_lossy().into_owned());
        }
        args.push("--".into());
        args.push(url.to_string());
        args
    }

    async fn run(&self, args: &[String]) -> crate::Result<Output> {
        debug!(binary = ?self.binary_path, ?args, "running yt-dlp");

        let output = Command::new(&self.binary_path)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::ExternalTool(format!("Failed to execute yt-dlp: {}", e)))?;

        if !output.status.success() {
            return Err(Error::ExternalTool(format!(
                "yt-dlp exited with {}: {}",
                output.status,
                last_error_line(&output.stderr)
            )));
        }
        Ok(output)
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    async fn probe(&self, url: &str) -> crate::Result<ProbeInfo> {
        let output = self.run(&Self::probe_args(url)).await?;
        parse_probe_output(&output.stdout)
    }

    async fn fetch_audio(&self, url: &str, dest: &Path, bitrate: &str) -> crate::Result<PathBuf> {
        tokio::fs::create_dir_all(dest).await?;
        let output = self.run(&self.fetch_args(url, dest, bitrate)).await?;
        Ok(parse_fetch_output(&output.stdout, dest))
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}
