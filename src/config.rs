//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use std::{fmt, path::PathBuf, time::Duration};

use serde::Deserialize;

/// Bot API token.
///
/// Wrapped so that `Debug` output (and therefore logs) never contains the secret.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct BotToken(String);

impl BotToken {
    #[cfg(test)]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BotToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BotToken(***)")
    }
}

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `TELEGRAM_BOT_TOKEN` (required): Bot API token
/// - `PORT` (optional): health server port, defaults to 8080
/// - `RENDER` (optional): set by the hosting platform, enables the health server
/// - `HEALTH_SERVER` (optional): explicit `true`/`false` override for the health server
/// - `TELEGRAM_API_URL` (optional): Bot API base URL
/// - `DOWNLOAD_DIR` (optional): directory for downloaded files, defaults to `downloads`
/// - `YTDLP_PATH` (optional): downloader executable, defaults to `yt-dlp`
/// - `COOKIES_FILE` (optional): cookies file handed to the downloader
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub telegram_bot_token: BotToken,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub render: Option<String>,

    #[serde(default)]
    pub health_server: Option<bool>,

    #[serde(default = "default_api_url")]
    pub telegram_api_url: String,

    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: String,

    #[serde(default)]
    pub cookies_file: Option<PathBuf>,

    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,

    #[serde(default = "default_max_video_options")]
    pub max_video_options: usize,

    #[serde(default = "default_audio_quality")]
    pub audio_quality: String,

    #[serde(default = "default_max_concurrent_downloads")]
    pub max_concurrent_downloads: usize,

    #[serde(default = "default_upload_limit_mb")]
    pub upload_limit_mb: u64,

    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
}

/// Default port if PORT environment variable is not set.
fn default_port() -> u16 {
    8080
}

fn default_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_ytdlp_path() -> String {
    "yt-dlp".to_string()
}

fn default_poll_timeout() -> u64 {
    30
}

fn default_max_video_options() -> usize {
    5
}

fn default_audio_quality() -> String {
    "192".to_string()
}

fn default_max_concurrent_downloads() -> usize {
    2
}

fn default_upload_limit_mb() -> u64 {
    50
}

fn default_probe_timeout() -> u64 {
    60
}

fn default_download_timeout() -> u64 {
    900
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., TELEGRAM_BOT_TOKEN)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Field names are automatically converted: telegram_bot_token -> TELEGRAM_BOT_TOKEN
        envy::from_env::<Config>()
    }

    /// Whether the HTTP health listener should be started.
    ///
    /// `HEALTH_SERVER` wins when present; otherwise any non-empty `RENDER` enables it.
    pub fn health_server_enabled(&self) -> bool {
        self.health_server
            .unwrap_or_else(|| self.render.as_deref().is_some_and(|v| !v.is_empty()))
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn upload_limit_bytes(&self) -> u64 {
        self.upload_limit_mb.saturating_mul(1024 * 1024)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}
