//! Media metadata models.
//!
//! `MediaInfo` mirrors the subset of `yt-dlp --dump-single-json` output the
//! bot needs to offer download options.

use std::path::PathBuf;

use serde::Deserialize;

/// Metadata for a single media item.
///
/// # Example
///
/// ```json
/// {
///   "id": "dQw4w9WgXcQ",
///   "title": "Some video",
///   "thumbnail": "https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg",
///   "duration": 212,
///   "webpage_url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
///   "formats": [{ "format_id": "137", "height": 1080, "ext": "mp4" }]
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct MediaInfo {
    pub id: String,

    #[serde(default = "default_title")]
    pub title: String,

    pub thumbnail: Option<String>,

    /// Length in seconds, absent for live streams
    pub duration: Option<f64>,

    pub webpage_url: Option<String>,

    #[serde(default)]
    pub formats: Vec<MediaFormat>,
}

fn default_title() -> String {
    "Unknown Title".to_string()
}

/// One downloadable rendition reported by the extractor.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaFormat {
    /// Frame height in pixels; absent for audio-only formats
    pub height: Option<u32>,
}

impl MediaInfo {
    /// Distinct video heights, highest first, at most `limit` of them.
    pub fn video_heights(&self, limit: usize) -> Vec<u32> {
        let mut heights: Vec<u32> = self
            .formats
            .iter()
            .filter_map(|f| f.height)
            .filter(|h| *h > 0)
            .collect();
        heights.sort_unstable_by(|a, b| b.cmp(a));
        heights.dedup();
        heights.truncate(limit);
        heights
    }
}

/// A file the downloader left on disk.
#[derive(Debug, Clone)]
pub struct DownloadedMedia {
    pub path: PathBuf,

    pub size_bytes: u64,
}
