//! Per-job scratch directories
//!
//! A [`Workspace`] is created after a job acquires its permit and is removed when
//! the job ends. [`Workspace::close`] removes it explicitly and reports errors;
//! if a job future is dropped instead (shutdown, panic), the inner
//! [`tempfile::TempDir`] removes the directory on drop.

use crate::error::Result;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Name prefix of every workspace directory
pub const WORKSPACE_PREFIX: &str = "ytmp3_";

/// Extension of the audio files a job produces
const AUDIO_EXTENSION: &str = "mp3";

/// Exclusively owned scratch directory for one job
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh, uniquely named directory under `root`
    ///
    /// Missing parents of `root` are created.
    pub async fn create(root: &Path) -> Result<Self> {
        let root = root.to_path_buf();
        let dir = run_blocking("creation", move || {
            std::fs::create_dir_all(&root)?;
            tempfile::Builder::new()
                .prefix(WORKSPACE_PREFIX)
                .tempdir_in(&root)
        })
        .await?;
        debug!(workspace = ?dir.path(), "workspace created");
        Ok(Self { dir })
    }

    /// Directory of this workspace
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Find the produced audio file
    ///
    /// Prefers `expected` when it exists inside this workspace, otherwise the
    /// first `.mp3` file (by name) in the workspace. `None` if there is none.
    pub async fn locate_audio(&self, expected: &Path) -> Result<Option<PathBuf>> {
        if expected.starts_with(self.path()) && tokio::fs::try_exists(expected).await? {
            return Ok(Some(expected.to_path_buf()));
        }

        let mut candidates = Vec::new();
        let mut entries = tokio::fs::read_dir(self.path()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_audio = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(AUDIO_EXTENSION));
            if is_audio && entry.file_type().await?.is_file() {
                candidates.push(path);
            }
        }
        candidates.sort();

        if let Some(found) = candidates.first() {
            debug!(?expected, ?found, "expected output missing, using fallback");
        }
        Ok(candidates.into_iter().next())
    }

    /// Remove the directory and everything in it
    ///
    /// Returns the removed path.
    pub async fn close(self) -> Result<PathBuf> {
        let Workspace { dir } = self;
        let path = dir.path().to_path_buf();
        run_blocking("removal", move || dir.close()).await?;
        debug!(workspace = ?path, "workspace removed");
        Ok(path)
    }
}

async fn run_blocking<T, F>(what: &str, work: F) -> Result<T>
where
    F: FnOnce() -> std::io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let done = tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| crate::Error::Other(format!("workspace {what} task failed: {e}")))?;
    Ok(done?)
}

/// Remove workspaces left behind by a previous process
///
/// Only directories whose name starts with [`WORKSPACE_PREFIX`] are touched.
/// Returns how many were removed; a missing `root` counts as zero.
pub async fn sweep_stale(root: &Path) -> Result<usize> {
    let mut entries = match tokio::fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let is_workspace = name.to_string_lossy().starts_with(WORKSPACE_PREFIX);
        if !is_workspace || !entry.file_type().await?.is_dir() {
            continue;
        }
        match tokio::fs::remove_dir_all(entry.path()).await {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = ?entry.path(), error = %e, "failed to remove stale workspace"),
        }
    }

    if removed > 0 {
        info!(removed, ?root, "removed stale workspaces");
    }
    Ok(removed)
}
