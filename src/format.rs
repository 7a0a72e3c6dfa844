//! Text rendering for previews and delivered audio

use crate::link::{MAX_TITLE_LEN, truncate_chars};
use crate::types::VideoMeta;

/// Shown when the duration is unknown or not positive
pub const UNKNOWN_DURATION: &str = "Unknown";

/// Title used when metadata cannot be re-read after a download
pub const FALLBACK_TITLE: &str = "MP3";

/// Render a duration in seconds as `H:MM:SS` or `M:SS`
///
/// # Examples
///
/// ```
/// use mp3bot::format::format_duration;
///
/// assert_eq!(format_duration(0), "Unknown");
/// assert_eq!(format_duration(65), "1:05");
/// assert_eq!(format_duration(3661), "1:01:01");
/// ```
pub fn format_duration(seconds: i64) -> String {
    if seconds <= 0 {
        return UNKNOWN_DURATION.to_string();
    }
    let (minutes, secs) = (seconds / 60, seconds % 60);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

/// Title cut to the display limit
pub fn display_title(title: &str) -> &str {
    truncate_chars(title, MAX_TITLE_LEN)
}

/// Preview card text: title, duration and, when known, uploader
pub fn card_text(meta: &VideoMeta) -> String {
    let mut text = format!("Title: {}\nDuration: {}", meta.title, meta.duration_display);
    if let Some(uploader) = &meta.uploader {
        text.push_str("\nUploader: ");
        text.push_str(uploader);
    }
    text
}

/// Caption attached to the delivered audio file
pub fn audio_caption(title: &str, duration: &str) -> String {
    format!("Title: {}\nDuration: {}", display_title(title), duration)
}
