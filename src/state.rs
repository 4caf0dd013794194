//! Shared runtime state.
//!
//! - [`HealthState`]: liveness bookkeeping read by the HTTP health listener
//! - [`BotContext`]: everything a chat handler needs, shared across update tasks

use std::{path::PathBuf, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, Semaphore};

use crate::config::Config;
use crate::services::{
    downloader::MediaDownloader, link_cache::LinkCache, telegram_client::BotApi,
};

/// Slack added on top of three poll timeouts before the poller counts as stalled.
const STALE_SLACK: Duration = Duration::from_secs(30);

/// Poller liveness as seen by `/health`.
#[derive(Clone)]
pub struct HealthState {
    pub started_at: DateTime<Utc>,
    last_poll: Arc<RwLock<Option<DateTime<Utc>>>>,
    stale_after: Duration,
}

impl HealthState {
    pub fn new(poll_timeout: Duration) -> Self {
        Self {
            started_at: Utc::now(),
            last_poll: Arc::new(RwLock::new(None)),
            stale_after: poll_timeout * 3 + STALE_SLACK,
        }
    }

    /// Record a successful `getUpdates` round trip.
    pub async fn record_poll(&self) {
        self.record_poll_at(Utc::now()).await;
    }

    pub async fn record_poll_at(&self, at: DateTime<Utc>) {
        *self.last_poll.write().await = Some(at);
    }

    pub async fn last_poll(&self) -> Option<DateTime<Utc>> {
        *self.last_poll.read().await
    }

    /// Whether the last successful poll is older than the staleness threshold.
    ///
    /// A poller that has not completed its first round trip yet is not stale.
    pub async fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match self.last_poll().await {
            Some(at) => (now - at)
                .to_std()
                .map(|elapsed| elapsed > self.stale_after)
                .unwrap_or(false),
            None => false,
        }
    }
}

/// Knobs the chat handlers read.
#[derive(Debug, Clone)]
pub struct BotSettings {
    pub max_video_options: usize,

    pub upload_limit_bytes: u64,

    /// Parent of the per-download work directories
    pub download_dir: PathBuf,
}

impl BotSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_video_options: config.max_video_options,
            upload_limit_bytes: config.upload_limit_bytes(),
            download_dir: config.download_dir.clone(),
        }
    }
}

/// Dependencies shared by every update handler.
pub struct BotContext {
    pub api: Arc<dyn BotApi>,

    pub downloader: Arc<dyn MediaDownloader>,

    pub links: LinkCache,

    pub settings: BotSettings,

    /// Bounds concurrent downloads; presses beyond it wait their turn
    pub download_slots: Semaphore,
}

impl BotContext {
    pub fn new(
        api: Arc<dyn BotApi>,
        downloader: Arc<dyn MediaDownloader>,
        settings: BotSettings,
        max_concurrent_downloads: usize,
    ) -> Self {
        Self {
            api,
            downloader,
            links: LinkCache::default(),
            settings,
            download_slots: Semaphore::new(max_concurrent_downloads.max(1)),
        }
    }
}
