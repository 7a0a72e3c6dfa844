//! Parser for yt-dlp command output

use super::traits::ProbeInfo;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Name used for the output file when the extractor reports no identifier
const FALLBACK_ID: &str = "audio";

/// Subset of the `--dump-single-json` document we read
#[derive(Debug, Deserialize)]
struct InfoDocument {
    id: Option<String>,
    title: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
}

/// Parse the JSON printed by `yt-dlp --dump-single-json`
///
/// Missing or null durations become 0; fractional durations are truncated.
/// Blank strings are treated as absent.
pub fn parse_probe_output(stdout: &[u8]) -> crate::Result<ProbeInfo> {
    let doc: InfoDocument = serde_json::from_slice(stdout)?;

    let non_blank = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

    let duration_seconds = doc
        .duration
        .filter(|d| d.is_finite() && *d > 0.0)
        .map(|d| d.trunc() as i64)
        .unwrap_or(0);

    Ok(ProbeInfo {
        id: non_blank(doc.id),
        title: non_blank(doc.title),
        duration_seconds,
        thumbnail: non_blank(doc.thumbnail),
        uploader: non_blank(doc.uploader).or_else(|| non_blank(doc.channel)),
    })
}

/// Derive the expected MP3 path from the `--print after_move:id` output
///
/// The last non-empty line is the identifier; without one the output is
/// expected at `<dest>/audio.mp3`.
pub fn parse_fetch_output(stdout: &[u8], dest: &Path) -> PathBuf {
    let output = String::from_utf8_lossy(stdout);
    let id = output
        .lines()
        .map(str::trim)
        .rev()
        .find(|line| !line.is_empty() && *line != "NA")
        .unwrap_or(FALLBACK_ID);
    dest.join(format!("{id}.mp3"))
}

/// Last meaningful stderr line, used as the error summary
pub(crate) fn last_error_line(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .lines()
        .map(str::trim)
        .rev()
        .find(|line| !line.is_empty())
        .unwrap_or("no output")
        .to_string()
}
