//! Link heuristics and length limits
//!
//! [`is_candidate_link`] is a cheap gate, not validation: a false positive is
//! rejected later by the metadata probe, a false negative blocks the user, so
//! the host markers are matched case-insensitively anywhere in the text.

use regex::Regex;
use std::sync::LazyLock;

/// Texts shorter than this are never treated as links
pub const MIN_LINK_LEN: usize = 10;

/// Maximum characters of a title used in captions and audio metadata
pub const MAX_TITLE_LEN: usize = 64;

/// Maximum bytes of a URL carried in a confirm-button payload
pub const MAX_CALLBACK_URL_LEN: usize = 170;

#[allow(clippy::expect_used)]
static HOST_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(youtube\.com|youtu\.be|youtube-nocookie\.com)")
        .expect("host marker pattern is valid")
});

/// Decide whether free text plausibly references a downloadable resource
///
/// # Examples
///
/// ```
/// use mp3bot::link::is_candidate_link;
///
/// assert!(is_candidate_link("https://youtu.be/dQw4w9WgXcQ"));
/// assert!(is_candidate_link("  HTTPS://WWW.YOUTUBE.COM/watch?v=abc  "));
/// assert!(!is_candidate_link("youtu.be"));
/// assert!(!is_candidate_link("hello there, friend"));
/// ```
pub fn is_candidate_link(text: &str) -> bool {
    let text = text.trim();
    if text.chars().count() < MIN_LINK_LEN {
        return false;
    }
    HOST_MARKERS.is_match(text)
}

/// Truncate to at most `max` characters
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Truncate to at most `max` bytes without splitting a UTF-8 sequence
pub fn truncate_bytes(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
