//! Inline keyboard payloads.
//!
//! Each button carries a pipe-separated `callback_data` string that the Bot
//! API echoes back when it is pressed:
//!
//! - `audio|<key>`
//! - `video|<key>|<height>`
//!
//! The Bot API caps `callback_data` at 64 bytes, so `<key>` is the media id
//! only when it fits; otherwise it is a short digest of the page URL.

use std::{fmt, str::FromStr};

use sha2::{Digest, Sha256};

use crate::error::AppError;

/// Bot API limit on `callback_data`, in bytes.
pub const MAX_CALLBACK_DATA_LEN: usize = 64;

/// Longest payload prefix/suffix around the key: `video|` + `|` + five height digits.
const PAYLOAD_OVERHEAD: usize = "video|".len() + "|99999".len();

const DIGEST_KEY_LEN: usize = 16;

/// Which rendition to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadKind {
    /// Best audio, converted to MP3
    Audio,
    /// Video at exactly this height merged with the best audio
    Video { height: u32 },
}

impl DownloadKind {
    pub fn label(&self) -> &'static str {
        match self {
            DownloadKind::Audio => "audio",
            DownloadKind::Video { .. } => "video",
        }
    }
}

/// A decoded keyboard press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadChoice {
    /// Link cache key (media id or URL digest)
    pub key: String,

    pub kind: DownloadKind,
}

impl DownloadChoice {
    pub fn audio(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: DownloadKind::Audio,
        }
    }

    pub fn video(key: impl Into<String>, height: u32) -> Self {
        Self {
            key: key.into(),
            kind: DownloadKind::Video { height },
        }
    }
}

impl fmt::Display for DownloadChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DownloadKind::Audio => write!(f, "audio|{}", self.key),
            DownloadKind::Video { height } => write!(f, "video|{}|{}", self.key, height),
        }
    }
}

impl FromStr for DownloadChoice {
    type Err = AppError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let invalid = || AppError::InvalidCallback(data.to_string());
        let parts: Vec<&str> = data.split('|').collect();

        match parts.as_slice() {
            ["audio", key] if !key.is_empty() => Ok(DownloadChoice::audio(*key)),
            ["video", key, height] if !key.is_empty() => {
                let height = height.parse::<u32>().map_err(|_| invalid())?;
                Ok(DownloadChoice::video(*key, height))
            }
            _ => Err(invalid()),
        }
    }
}

/// Pick the key that identifies a probed link inside callback payloads.
///
/// Uses the media id when every payload built from it stays within
/// [`MAX_CALLBACK_DATA_LEN`] and it cannot be confused with the separator;
/// otherwise the first 16 hex characters of SHA-256 over the page URL.
pub fn callback_key(media_id: &str, page_url: &str) -> String {
    if !media_id.is_empty()
        && !media_id.contains('|')
        && media_id.len() + PAYLOAD_OVERHEAD <= MAX_CALLBACK_DATA_LEN
    {
        return media_id.to_string();
    }

    let digest = Sha256::digest(page_url.as_bytes());
    let mut key = hex::encode(digest);
    key.truncate(DIGEST_KEY_LEN);
    key
}
