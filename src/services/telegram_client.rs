//! Bot API client.
//!
//! This module defines the [`BotApi`] seam the chat handlers talk to and its
//! HTTP implementation on top of `reqwest`.
//!
//! # Transport
//!
//! - Ordinary methods: `POST {base}/bot{token}/{method}` with a JSON body
//! - Uploads (`sendAudio`, `sendVideo`): `multipart/form-data`
//! - Every response is the `{ "ok": ..., "result": ... }` envelope

use std::{path::Path, time::Duration};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::json;

use crate::config::BotToken;
use crate::error::AppError;
use crate::models::telegram::{
    ApiResponse, InlineKeyboardMarkup, Message, ParseMode, SendOptions, Update, User,
};

/// Timeout for ordinary (non long-poll, non upload) requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Extra time granted on top of the long-poll timeout before giving up.
const POLL_MARGIN: Duration = Duration::from_secs(15);

/// Timeout for file uploads.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Operations the bot performs against the Bot API.
#[async_trait]
pub trait BotApi: Send + Sync {
    /// Identity of the bot behind the token
    async fn get_me(&self) -> Result<User, AppError>;

    /// Long-poll for updates with `update_id >= offset`
    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout: Duration,
    ) -> Result<Vec<Update>, AppError>;

    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        options: SendOptions,
    ) -> Result<Message, AppError>;

    /// Send a photo by URL; the Bot API fetches it itself
    async fn send_photo(
        &self,
        chat_id: i64,
        photo_url: &str,
        caption: &str,
        options: SendOptions,
    ) -> Result<Message, AppError>;

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), AppError>;

    /// Replace a message's inline keyboard; `None` removes it
    async fn edit_message_reply_markup(
        &self,
        chat_id: i64,
        message_id: i64,
        reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<(), AppError>;

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), AppError>;

    async fn answer_callback_query(&self, callback_query_id: &str) -> Result<(), AppError>;

    async fn send_audio(
        &self,
        chat_id: i64,
        path: &Path,
        title: &str,
    ) -> Result<Message, AppError>;

    async fn send_video(
        &self,
        chat_id: i64,
        path: &Path,
        caption: &str,
    ) -> Result<Message, AppError>;
}

#[derive(Serialize)]
struct SendMessageParams<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Serialize)]
struct SendPhotoParams<'a> {
    chat_id: i64,
    photo: &'a str,
    caption: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Serialize)]
struct EditReplyMarkupParams<'a> {
    chat_id: i64,
    message_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboardMarkup>,
}

/// `reqwest` implementation of [`BotApi`].
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    token: BotToken,
}

impl TelegramClient {
    /// Create a client for `base_url` (e.g. `https://api.telegram.org`).
    ///
    /// # Errors
    ///
    /// Returns `AppError::Http` if the underlying HTTP client cannot be built.
    pub fn new(base_url: &str, token: BotToken) -> Result<Self, AppError> {
        // No global timeout: long polls and uploads set their own per request.
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token.expose(), method)
    }

    /// Call a JSON method and unwrap the response envelope.
    async fn call<P, R>(&self, method: &str, params: &P, timeout: Duration) -> Result<R, AppError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        tracing::debug!(method, "Calling Bot API");

        let response = self
            .http
            .post(self.method_url(method))
            .timeout(timeout)
            .json(params)
            .send()
            .await?;

        // Error statuses still carry the JSON envelope with a description
        let envelope: ApiResponse<R> = response.json().await?;
        envelope.into_result()
    }

    /// Upload a local file as `field` of a multipart request.
    async fn upload(
        &self,
        method: &str,
        field: &'static str,
        mime: &str,
        path: &Path,
        form: Form,
    ) -> Result<Message, AppError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("media")
            .to_string();

        tracing::debug!(method, file = %path.display(), bytes = bytes.len(), "Uploading file");

        let part = Part::bytes(bytes).file_name(file_name).mime_str(mime)?;
        let response = self
            .http
            .post(self.method_url(method))
            .timeout(UPLOAD_TIMEOUT)
            .multipart(form.part(field, part))
            .send()
            .await?;

        let envelope: ApiResponse<Message> = response.json().await?;
        envelope.into_result()
    }
}

/// Guess a MIME type from the file extension.
fn mime_for(path: &Path, fallback: &'static str) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("mp3") => "audio/mpeg",
        Some("m4a") => "audio/mp4",
        Some("opus") | Some("ogg") => "audio/ogg",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        _ => fallback,
    }
}

#[async_trait]
impl BotApi for TelegramClient {
    async fn get_me(&self) -> Result<User, AppError> {
        self.call("getMe", &json!({}), REQUEST_TIMEOUT).await
    }

    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout: Duration,
    ) -> Result<Vec<Update>, AppError> {
        let params = json!({
            "offset": offset,
            "timeout": timeout.as_secs(),
            "allowed_updates": ["message", "callback_query"],
        });
        self.call("getUpdates", &params, timeout + POLL_MARGIN).await
    }

    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        options: SendOptions,
    ) -> Result<Message, AppError> {
        let params = SendMessageParams {
            chat_id,
            text,
            parse_mode: options.parse_mode,
            reply_markup: options.reply_markup,
        };
        self.call("sendMessage", &params, REQUEST_TIMEOUT).await
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        photo_url: &str,
        caption: &str,
        options: SendOptions,
    ) -> Result<Message, AppError> {
        let params = SendPhotoParams {
            chat_id,
            photo: photo_url,
            caption,
            parse_mode: options.parse_mode,
            reply_markup: options.reply_markup,
        };
        self.call("sendPhoto", &params, REQUEST_TIMEOUT).await
    }

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), AppError> {
        let params = json!({ "chat_id": chat_id, "message_id": message_id, "text": text });
        // Result is the edited Message (or `true` for inline messages)
        let _: serde_json::Value = self.call("editMessageText", &params, REQUEST_TIMEOUT).await?;
        Ok(())
    }

    async fn edit_message_reply_markup(
        &self,
        chat_id: i64,
        message_id: i64,
        reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<(), AppError> {
        let params = EditReplyMarkupParams {
            chat_id,
            message_id,
            reply_markup,
        };
        let _: serde_json::Value = self
            .call("editMessageReplyMarkup", &params, REQUEST_TIMEOUT)
            .await?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), AppError> {
        let params = json!({ "chat_id": chat_id, "message_id": message_id });
        let _: bool = self.call("deleteMessage", &params, REQUEST_TIMEOUT).await?;
        Ok(())
    }

    async fn answer_callback_query(&self, callback_query_id: &str) -> Result<(), AppError> {
        let params = json!({ "callback_query_id": callback_query_id });
        let _: bool = self.call("answerCallbackQuery", &params, REQUEST_TIMEOUT).await?;
        Ok(())
    }

    async fn send_audio(
        &self,
        chat_id: i64,
        path: &Path,
        title: &str,
    ) -> Result<Message, AppError> {
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("title", title.to_string());
        self.upload("sendAudio", "audio", mime_for(path, "audio/mpeg"), path, form).await
    }

    async fn send_video(
        &self,
        chat_id: i64,
        path: &Path,
        caption: &str,
    ) -> Result<Message, AppError> {
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .text("supports_streaming", "true");
        self.upload("sendVideo", "video", mime_for(path, "video/mp4"), path, form).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN: &str = "123:secret-token";

    fn client(server: &MockServer) -> TelegramClient {
        TelegramClient::new(&server.uri(), BotToken::new(TOKEN)).unwrap()
    }

    fn ok(result: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": result }))
    }

    fn message_json(message_id: i64) -> serde_json::Value {
        json!({ "message_id": message_id, "date": 0, "chat": { "id": 42, "type": "private" } })
    }

    #[tokio::test]
    async fn get_updates_sends_offset_and_parses_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/bot{TOKEN}/getUpdates")))
            .and(body_json(json!({
                "offset": 8,
                "timeout": 0,
                "allowed_updates": ["message", "callback_query"]
            })))
            .respond_with(ok(json!([
                { "update_id": 8, "message": message_json(1) },
                { "update_id": 9, "callback_query": {
                    "id": "cb1",
                    "from": { "id": 7, "is_bot": false, "first_name": "Ann" },
                    "data": "audio|abc"
                } }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let updates = client(&server)
            .get_updates(Some(8), Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(updates.len(), 2);
        assert_eq!(updates[1].callback_query.as_ref().unwrap().id, "cb1");
    }

    #[tokio::test]
    async fn send_message_omits_unset_options() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/bot{TOKEN}/sendMessage")))
            .and(body_json(json!({ "chat_id": 42, "text": "hello" })))
            .respond_with(ok(message_json(3)))
            .expect(1)
            .mount(&server)
            .await;

        let message = client(&server)
            .send_message(42, "hello", SendOptions::default())
            .await
            .unwrap();
        assert_eq!(message.message_id, 3);
    }

    #[tokio::test]
    async fn removing_keyboard_sends_no_markup() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/bot{TOKEN}/editMessageReplyMarkup")))
            .and(body_json(json!({ "chat_id": 42, "message_id": 5 })))
            .respond_with(ok(message_json(5)))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .edit_message_reply_markup(42, 5, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn api_errors_carry_code_and_description() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/bot{TOKEN}/deleteMessage")))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: message to delete not found"
            })))
            .mount(&server)
            .await;

        let err = client(&server).delete_message(42, 1).await.unwrap_err();
        match err {
            AppError::Telegram { code, description } => {
                assert_eq!(code, 400);
                assert!(description.contains("not found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_errors_do_not_leak_the_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client(&server).get_me().await.unwrap_err();
        assert!(matches!(err, AppError::Http(_)));
        assert!(!err.to_string().contains("secret-token"));
    }

    #[tokio::test]
    async fn audio_is_uploaded_as_multipart() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/bot{TOKEN}/sendAudio")))
            .and(body_string_contains("name=\"audio\"; filename=\"abc.mp3\""))
            .and(body_string_contains("My Song"))
            .respond_with(ok(message_json(9)))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("abc.mp3");
        tokio::fs::write(&file, b"ID3fake").await.unwrap();

        let message = client(&server)
            .send_audio(42, &file, "My Song")
            .await
            .unwrap();
        assert_eq!(message.message_id, 9);
    }

    #[test]
    fn mime_types_follow_extension() {
        assert_eq!(mime_for(Path::new("a.mp3"), "x/y"), "audio/mpeg");
        assert_eq!(mime_for(Path::new("a.mp4"), "x/y"), "video/mp4");
        assert_eq!(mime_for(Path::new("a.bin"), "x/y"), "x/y");
    }
}
