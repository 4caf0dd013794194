//! Remembers which link a keyboard belongs to.
//!
//! Callback payloads only carry a short key, so the page URL and title are
//! kept here between the probe and the button press. The cache is in-memory
//! and bounded; presses on keyboards older than the retained window (or from
//! before a restart) fall back to YouTube id reconstruction when possible.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use tokio::sync::Mutex;

use crate::error::AppError;

/// Default number of links retained.
pub const DEFAULT_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedLink {
    pub url: String,

    /// Extractor id, used to predict output file names
    pub media_id: String,

    pub title: Option<String>,
}

#[derive(Default)]
struct Entries {
    links: HashMap<String, CachedLink>,
    order: VecDeque<String>,
}

/// Shared, bounded key → link map. Cloning shares the same storage.
#[derive(Clone)]
pub struct LinkCache {
    inner: Arc<Mutex<Entries>>,
    capacity: usize,
}

impl Default for LinkCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl LinkCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Entries::default())),
            capacity: capacity.max(1),
        }
    }

    /// Store `link` under `key`, evicting the oldest keys past capacity.
    pub async fn remember(&self, key: &str, link: CachedLink) {
        let mut entries = self.inner.lock().await;

        if entries.links.insert(key.to_string(), link).is_some() {
            entries.order.retain(|k| k != key);
        }
        entries.order.push_back(key.to_string());

        while entries.order.len() > self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                entries.links.remove(&oldest);
            }
        }
    }

    /// Look up the link for `key`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SelectionExpired` when the key is unknown and is not
    /// a YouTube video id.
    pub async fn resolve(&self, key: &str) -> Result<CachedLink, AppError> {
        if let Some(link) = self.inner.lock().await.links.get(key) {
            return Ok(link.clone());
        }

        if is_youtube_id(key) {
            tracing::debug!(key, "Link not cached, assuming YouTube id");
            return Ok(CachedLink {
                url: format!("https://www.youtube.com/watch?v={key}"),
                media_id: key.to_string(),
                title: None,
            });
        }

        Err(AppError::SelectionExpired)
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.inner.lock().await.links.len()
    }
}

fn is_youtube_id(key: &str) -> bool {
    key.len() == 11
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
