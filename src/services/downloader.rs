//! Media downloader backed by the `yt-dlp` executable.
//!
//! `yt-dlp` does the site extraction; FFmpeg (which it invokes) merges
//! separate video/audio streams and converts audio to MP3. Both must be on
//! `PATH` at runtime.
//!
//! # Work directories
//!
//! Every download runs in its own directory under the download directory
//! (see [`create_job_dir`]). Two presses of the same rendition therefore never
//! share a file, and removing the directory also removes the `.part` and
//! intermediate stream files a failed or killed run leaves behind.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;

use crate::config::Config;
use crate::error::AppError;
use crate::models::choice::DownloadKind;
use crate::models::media::{DownloadedMedia, MediaInfo};

/// Name prefix of per-download work directories.
pub const JOB_DIR_PREFIX: &str = "job-";

/// Probe and fetch media behind a link.
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    /// Read metadata and available formats without downloading.
    async fn probe(&self, url: &str) -> Result<MediaInfo, AppError>;

    /// Download one rendition into `dest`, a directory owned by the caller.
    async fn download(
        &self,
        url: &str,
        media_id: &str,
        kind: DownloadKind,
        dest: &Path,
    ) -> Result<DownloadedMedia, AppError>;
}

/// Create a private work directory for one download under `download_dir`.
///
/// The directory is removed when the returned [`TempDir`] is dropped, so a
/// handler that is aborted mid-download still cleans up after itself.
pub fn create_job_dir(download_dir: &Path) -> Result<TempDir, AppError> {
    let dir = tempfile::Builder::new()
        .prefix(JOB_DIR_PREFIX)
        .tempdir_in(download_dir)?;
    Ok(dir)
}

/// Remove a work directory and everything in it.
pub async fn remove_job_dir(dir: TempDir) {
    let path = dir.path().to_path_buf();
    match tokio::task::spawn_blocking(move || dir.close()).await {
        Ok(Ok(())) => tracing::info!(dir = %path.display(), "Deleted download"),
        Ok(Err(e)) => {
            tracing::warn!(dir = %path.display(), error = %e, "Failed to delete download")
        }
        Err(e) => tracing::warn!(dir = %path.display(), error = %e, "Cleanup task failed"),
    }
}

/// Remove work directories left behind by a previous run (crash or kill).
///
/// Returns how many were removed. Other entries are left alone.
pub async fn clear_stale_job_dirs(download_dir: &Path) -> Result<usize, AppError> {
    let mut entries = tokio::fs::read_dir(download_dir).await?;
    let mut removed = 0;

    while let Some(entry) = entries.next_entry().await? {
        let is_job = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(JOB_DIR_PREFIX));
        if is_job && entry.file_type().await?.is_dir() {
            tokio::fs::remove_dir_all(entry.path()).await?;
            removed += 1;
        }
    }

    Ok(removed)
}

/// Runs `yt-dlp` as a subprocess.
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: String,
    cookies_file: Option<PathBuf>,
    audio_quality: String,
    probe_timeout: Duration,
    download_timeout: Duration,
}

impl YtDlp {
    pub fn from_config(config: &Config) -> Self {
        Self {
            program: config.ytdlp_path.clone(),
            cookies_file: config.cookies_file.clone(),
            audio_quality: config.audio_quality.clone(),
            probe_timeout: config.probe_timeout(),
            download_timeout: config.download_timeout(),
        }
    }

    /// Downloader running `program` with default settings.
    #[cfg(test)]
    pub fn with_program(program: &str) -> Self {
        Self {
            program: program.to_string(),
            cookies_file: None,
            audio_quality: "192".to_string(),
            probe_timeout: Duration::from_secs(5),
            download_timeout: Duration::from_secs(5),
        }
    }

    fn cookie_args(&self) -> Vec<String> {
        match &self.cookies_file {
            Some(path) => vec!["--cookies".to_string(), path.display().to_string()],
            None => Vec::new(),
        }
    }

    fn probe_args(&self, url: &str) -> Vec<String> {
        let mut args: Vec<String> = ["--dump-single-json", "--no-playlist", "--no-warnings"]
            .into_iter()
            .map(String::from)
            .collect();
        args.extend(self.cookie_args());
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }

    fn download_args(&self, url: &str, kind: DownloadKind, dest: &Path) -> Vec<String> {
        let mut args: Vec<String> = [
            "--no-playlist",
            "--no-warnings",
            "--no-simulate",
            "--print",
            "after_move:filepath",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        args.extend(self.cookie_args());

        let template = match kind {
            DownloadKind::Audio => {
                args.extend([
                    "-f".to_string(),
                    "bestaudio/best".to_string(),
                    "-x".to_string(),
                    "--audio-format".to_string(),
                    "mp3".to_string(),
                    "--audio-quality".to_string(),
                    format!("{}K", self.audio_quality),
                ]);
                "%(id)s.%(ext)s"
            }
            DownloadKind::Video { height } => {
                args.extend([
                    "-f".to_string(),
                    format!("bestvideo[height={height}]+bestaudio/best[height={height}]/best"),
                    "--merge-output-format".to_string(),
                    "mp4".to_string(),
                ]);
                "%(id)s_%(height)s.%(ext)s"
            }
        };

        args.push("-o".to_string());
        args.push(dest.join(template).display().to_string());
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }

    /// Where the file lands when `yt-dlp` does not report a path.
    fn fallback_path(media_id: &str, kind: DownloadKind, dest: &Path) -> PathBuf {
        match kind {
            DownloadKind::Audio => dest.join(format!("{media_id}.mp3")),
            DownloadKind::Video { height } => dest.join(format!("{media_id}_{height}.mp4")),
        }
    }

    /// Run the executable and return its stdout.
    async fn run(
        &self,
        args: Vec<String>,
        timeout: Duration,
        stage: &str,
    ) -> Result<Vec<u8>, AppError> {
        tracing::debug!(program = %self.program, ?args, "Running downloader");

        let mut command = Command::new(&self.program);
        command.args(&args).stdin(Stdio::null()).kill_on_drop(true);

        let output = tokio::time::timeout(timeout, command.output())
            .await
            .map_err(|_| AppError::Timeout(format!("{} {}", self.program, stage)))?
            .map_err(|source| AppError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let summary = error_summary(&output.stderr)
                .unwrap_or_else(|| format!("{} exited with {}", self.program, output.status));
            tracing::warn!(stage, error = %summary, "Downloader failed");
            return Err(AppError::Downloader(summary));
        }

        Ok(output.stdout)
    }
}

/// Pick the most useful line of `yt-dlp` stderr: the last `ERROR:` line,
/// else the last non-empty one.
fn error_summary(stderr: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    lines
        .iter()
        .rev()
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| lines.last())
        .map(|l| l.to_string())
}

/// Last non-empty stdout line, which `--print after_move:filepath` writes.
fn printed_path(stdout: &[u8]) -> Option<PathBuf> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .next_back()
        .map(PathBuf::from)
}

#[async_trait]
impl MediaDownloader for YtDlp {
    async fn probe(&self, url: &str) -> Result<MediaInfo, AppError> {
        let stdout = self
            .run(self.probe_args(url), self.probe_timeout, "probe")
            .await?;
        let info: MediaInfo = serde_json::from_slice(&stdout)?;

        tracing::info!(
            media_id = %info.id,
            title = %info.title,
            formats = info.formats.len(),
            "Probed link"
        );
        Ok(info)
    }

    async fn download(
        &self,
        url: &str,
        media_id: &str,
        kind: DownloadKind,
        dest: &Path,
    ) -> Result<DownloadedMedia, AppError> {
        let stdout = self
            .run(
                self.download_args(url, kind, dest),
                self.download_timeout,
                "download",
            )
            .await?;

        let path =
            printed_path(&stdout).unwrap_or_else(|| Self::fallback_path(media_id, kind, dest));
        let size_bytes = file_size(&path).await?;

        tracing::info!(media_id, file = %path.display(), size_bytes, "Downloaded media");
        Ok(DownloadedMedia { path, size_bytes })
    }
}

async fn file_size(path: &Path) -> Result<u64, AppError> {
    Ok(tokio::fs::metadata(path).await?.len())
}
