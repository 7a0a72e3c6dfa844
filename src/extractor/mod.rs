//! Media extraction collaborator
//!
//! The core abstraction is the [`Extractor`] trait with two operations: a
//! metadata-only [`probe`](Extractor::probe) and a heavy
//! [`fetch_audio`](Extractor::fetch_audio) that downloads and transcodes into a
//! caller-owned directory.
//!
//! - [`YtDlpExtractor`]: drives the external `yt-dlp` binary (ffmpeg does the
//!   MP3 transcode)
//!
//! ## Usage
//!
//! ```no_run
//! use mp3bot::extractor::{Extractor, YtDlpExtractor};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let extractor = YtDlpExtractor::from_path().expect("yt-dlp binary not found");
//!
//!     let info = extractor.probe("https://youtu.be/dQw4w9WgXcQ").await?;
//!     println!("{:?} ({}s)", info.title, info.duration_seconds);
//!
//!     let mp3 = extractor
//!         .fetch_audio("https://youtu.be/dQw4w9WgXcQ", Path::new("/tmp/job"), "192")
//!         .await?;
//!     println!("wrote {}", mp3.display());
//!     Ok(())
//! }
//! ```

mod cli;
mod parser;
mod traits;

pub use cli::YtDlpExtractor;
pub use parser::{parse_fetch_output, parse_probe_output};
pub use traits::{Extractor, ProbeInfo};
