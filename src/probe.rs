//! Metadata probe: read-only lookups used for previews and captions

use crate::extractor::Extractor;
use crate::types::VideoMeta;
use std::sync::Arc;
use tracing::{debug, warn};

/// Title used when the host reports none
const UNKNOWN_TITLE: &str = "Unknown Title";

/// Fetches [`VideoMeta`] through the extraction collaborator
///
/// Probes are never bounded by the download permit pool and may run in
/// parallel with each other and with downloads.
#[derive(Clone)]
pub struct MetadataProbe {
    extractor: Arc<dyn Extractor>,
}

impl MetadataProbe {
    /// Create a probe over the given extractor
    pub fn new(extractor: Arc<dyn Extractor>) -> Self {
        Self { extractor }
    }

    /// Read metadata for `url`
    ///
    /// Any collaborator failure (network, unsupported host, private or
    /// age-gated content, unparseable output) yields `None`. The cause is
    /// logged, never returned.
    pub async fn fetch_meta(&self, url: &str) -> Option<VideoMeta> {
        match self.extractor.probe(url).await {
            Ok(info) => {
                let meta = VideoMeta::new(
                    url,
                    info.title.unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
                    info.duration_seconds,
                    info.thumbnail,
                    info.uploader,
                );
                debug!(url, title = %meta.title, duration = %meta.duration_display, "probe ok");
                Some(meta)
            }
            Err(e) => {
                warn!(url, extractor = self.extractor.name(), error = %e, "metadata probe failed");
                None
            }
        }
    }
}
