//! Hand-written fakes for the Bot API and downloader seams.

use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicI64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::choice::DownloadKind;
use crate::models::media::{DownloadedMedia, MediaInfo};
use crate::models::telegram::{
    CallbackQuery, Chat, InlineKeyboardMarkup, Message, ParseMode, SendOptions, Update, User,
};
use crate::services::{downloader::MediaDownloader, telegram_client::BotApi};
use crate::state::{BotContext, BotSettings};

/// A recorded Bot API call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    GetUpdates {
        offset: Option<i64>,
    },
    SendMessage {
        chat_id: i64,
        text: String,
        keyboard: Option<InlineKeyboardMarkup>,
        parse_mode: Option<ParseMode>,
    },
    SendPhoto {
        chat_id: i64,
        photo: String,
        caption: String,
        keyboard: Option<InlineKeyboardMarkup>,
        parse_mode: Option<ParseMode>,
    },
    EditText {
        chat_id: i64,
        message_id: i64,
        text: String,
    },
    EditMarkup {
        chat_id: i64,
        message_id: i64,
        removed: bool,
    },
    Delete {
        chat_id: i64,
        message_id: i64,
    },
    Answer {
        id: String,
    },
    SendAudio {
        chat_id: i64,
        path: PathBuf,
        title: String,
    },
    SendVideo {
        chat_id: i64,
        path: PathBuf,
        caption: String,
    },
}

pub struct FakeBotApi {
    calls: Mutex<Vec<Call>>,
    missing_uploads: Mutex<Vec<PathBuf>>,
    updates: Mutex<VecDeque<Result<Vec<Update>, AppError>>>,
    next_message_id: AtomicI64,
    fail_photos: bool,
    fail_formatted_text: bool,
    fail_uploads: bool,
}

impl Default for FakeBotApi {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            missing_uploads: Mutex::new(Vec::new()),
            updates: Mutex::new(VecDeque::new()),
            next_message_id: AtomicI64::new(100),
            fail_photos: false,
            fail_formatted_text: false,
            fail_uploads: false,
        }
    }
}

impl FakeBotApi {
    /// `sendPhoto` answers with an error (e.g. an unsupported thumbnail).
    pub fn failing_photos() -> Self {
        Self {
            fail_photos: true,
            ..Self::default()
        }
    }

    /// `sendPhoto` and any `sendMessage` with a parse mode answer with an
    /// entity parsing error.
    pub fn rejecting_formatted_text() -> Self {
        Self {
            fail_photos: true,
            fail_formatted_text: true,
            ..Self::default()
        }
    }

    /// `sendAudio`/`sendVideo` answer with an error.
    pub fn failing_uploads() -> Self {
        Self {
            fail_uploads: true,
            ..Self::default()
        }
    }

    pub fn push_updates(&self, batch: Result<Vec<Update>, AppError>) {
        self.updates.lock().unwrap().push_back(batch);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_matching(&self, predicate: impl Fn(&Call) -> bool) -> Vec<Call> {
        self.calls().into_iter().filter(|c| predicate(c)).collect()
    }

    /// Uploads whose file was already gone when the upload started.
    pub fn missing_uploads(&self) -> Vec<PathBuf> {
        self.missing_uploads.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_upload(&self, path: &Path) {
        if !path.exists() {
            self.missing_uploads.lock().unwrap().push(path.to_path_buf());
        }
    }

    fn reply(&self, chat_id: i64) -> Message {
        Message {
            message_id: self.next_message_id.fetch_add(1, Ordering::SeqCst),
            chat: Chat { id: chat_id },
            text: None,
        }
    }

    fn unparsable() -> AppError {
        AppError::Telegram {
            code: 400,
            description: "Bad Request: can't parse entities".to_string(),
        }
    }

    fn rejected() -> AppError {
        AppError::Telegram {
            code: 400,
            description: "Bad Request: rejected by fake".to_string(),
        }
    }
}

#[async_trait]
impl BotApi for FakeBotApi {
    async fn get_me(&self) -> Result<User, AppError> {
        Ok(User {
            id: 1,
            first_name: "Bot".to_string(),
            username: Some("fake_bot".to_string()),
        })
    }

    async fn get_updates(
        &self,
        offset: Option<i64>,
        _timeout: Duration,
    ) -> Result<Vec<Update>, AppError> {
        self.record(Call::GetUpdates { offset });
        let next = self.updates.lock().unwrap().pop_front();
        match next {
            Some(batch) => batch,
            None => std::future::pending().await,
        }
    }

    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        options: SendOptions,
    ) -> Result<Message, AppError> {
        self.record(Call::SendMessage {
            chat_id,
            text: text.to_string(),
            keyboard: options.reply_markup,
            parse_mode: options.parse_mode,
        });
        if self.fail_formatted_text && options.parse_mode.is_some() {
            return Err(Self::unparsable());
        }
        Ok(self.reply(chat_id))
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        photo_url: &str,
        caption: &str,
        options: SendOptions,
    ) -> Result<Message, AppError> {
        self.record(Call::SendPhoto {
            chat_id,
            photo: photo_url.to_string(),
            caption: caption.to_string(),
            keyboard: options.reply_markup,
            parse_mode: options.parse_mode,
        });
        if self.fail_photos {
            return Err(Self::rejected());
        }
        Ok(self.reply(chat_id))
    }

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), AppError> {
        self.record(Call::EditText {
            chat_id,
            message_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn edit_message_reply_markup(
        &self,
        chat_id: i64,
        message_id: i64,
        reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<(), AppError> {
        self.record(Call::EditMarkup {
            chat_id,
            message_id,
            removed: reply_markup.is_none(),
        });
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), AppError> {
        self.record(Call::Delete {
            chat_id,
            message_id,
        });
        Ok(())
    }

    async fn answer_callback_query(&self, callback_query_id: &str) -> Result<(), AppError> {
        self.record(Call::Answer {
            id: callback_query_id.to_string(),
        });
        Ok(())
    }

    async fn send_audio(
        &self,
        chat_id: i64,
        path: &Path,
        title: &str,
    ) -> Result<Message, AppError> {
        self.check_upload(path);
        self.record(Call::SendAudio {
            chat_id,
            path: path.to_path_buf(),
            title: title.to_string(),
        });
        if self.fail_uploads {
            return Err(Self::rejected());
        }
        Ok(self.reply(chat_id))
    }

    async fn send_video(
        &self,
        chat_id: i64,
        path: &Path,
        caption: &str,
    ) -> Result<Message, AppError> {
        self.check_upload(path);
        self.record(Call::SendVideo {
            chat_id,
            path: path.to_path_buf(),
            caption: caption.to_string(),
        });
        if self.fail_uploads {
            return Err(Self::rejected());
        }
        Ok(self.reply(chat_id))
    }
}

/// Downloader fake: returns a canned probe result and writes a small file
/// into the destination directory on download.
#[derive(Default)]
pub struct FakeDownloader {
    probe_result: Mutex<Option<Result<MediaInfo, AppError>>>,
    download_error: Mutex<Option<AppError>>,
    downloads: Mutex<Vec<(String, String, DownloadKind)>>,
    reported_size: Option<u64>,
}

impl FakeDownloader {
    /// Report this size instead of the real file length.
    pub fn with_reported_size(mut self, bytes: u64) -> Self {
        self.reported_size = Some(bytes);
        self
    }

    pub fn with_probe(self, result: Result<MediaInfo, AppError>) -> Self {
        *self.probe_result.lock().unwrap() = Some(result);
        self
    }

    pub fn with_download_error(self, err: AppError) -> Self {
        *self.download_error.lock().unwrap() = Some(err);
        self
    }

    pub fn downloads(&self) -> Vec<(String, String, DownloadKind)> {
        self.downloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaDownloader for FakeDownloader {
    async fn probe(&self, _url: &str) -> Result<MediaInfo, AppError> {
        self.probe_result
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(AppError::Downloader("ERROR: no probe result".to_string())))
    }

    async fn download(
        &self,
        url: &str,
        media_id: &str,
        kind: DownloadKind,
        dest: &Path,
    ) -> Result<DownloadedMedia, AppError> {
        self.downloads
            .lock()
            .unwrap()
            .push((url.to_string(), media_id.to_string(), kind));

        if let Some(err) = self.download_error.lock().unwrap().take() {
            return Err(err);
        }

        let extension = match kind {
            DownloadKind::Audio => "mp3",
            DownloadKind::Video { .. } => "mp4",
        };
        let path = dest.join(format!("{media_id}.{extension}"));
        std::fs::write(&path, b"media").unwrap();

        Ok(DownloadedMedia {
            path,
            size_bytes: self.reported_size.unwrap_or(5),
        })
    }
}

pub fn settings(download_dir: &Path) -> BotSettings {
    BotSettings {
        max_video_options: 5,
        upload_limit_bytes: 50 * 1024 * 1024,
        download_dir: download_dir.to_path_buf(),
    }
}

/// Context for handlers that never download.
pub fn context(api: Arc<FakeBotApi>, downloader: Arc<FakeDownloader>) -> Arc<BotContext> {
    context_in(api, downloader, &std::env::temp_dir())
}

/// Context whose work directories are created under `download_dir`.
pub fn context_in(
    api: Arc<dyn BotApi>,
    downloader: Arc<dyn MediaDownloader>,
    download_dir: &Path,
) -> Arc<BotContext> {
    Arc::new(BotContext::new(api, downloader, settings(download_dir), 2))
}

/// Executable shell script standing in for `yt-dlp`.
#[cfg(unix)]
pub fn fake_ytdlp(dir: &Path, body: &str) -> String {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-yt-dlp");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.display().to_string()
}

/// Names of the entries directly under `dir`.
pub fn dir_entries(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

pub fn text_message(chat_id: i64, message_id: i64, text: &str) -> Message {
    Message {
        message_id,
        chat: Chat { id: chat_id },
        text: Some(text.to_string()),
    }
}

pub fn text_update(update_id: i64, chat_id: i64, text: &str) -> Update {
    Update {
        update_id,
        message: Some(text_message(chat_id, update_id * 10, text)),
        callback_query: None,
    }
}

pub fn callback_query(chat_id: i64, message_id: i64, data: &str) -> CallbackQuery {
    CallbackQuery {
        id: format!("cb-{message_id}"),
        from: User {
            id: 7,
            first_name: "Ann".to_string(),
            username: None,
        },
        message: Some(Message {
            message_id,
            chat: Chat { id: chat_id },
            text: None,
        }),
        data: Some(data.to_string()),
    }
}

pub fn media_info(id: &str, thumbnail: Option<&str>, heights: &[u32]) -> MediaInfo {
    let formats: Vec<serde_json::Value> = heights
        .iter()
        .map(|h| serde_json::json!({ "height": h }))
        .collect();
    serde_json::from_value(serde_json::json!({
        "id": id,
        "title": "Test *Clip*",
        "thumbnail": thumbnail,
        "duration": 125,
        "webpage_url": format!("https://example.com/watch/{id}"),
        "formats": formats,
    }))
    .unwrap()
}
