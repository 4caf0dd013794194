//! Error types and HTTP error response handling.
//!
//! This module defines all application errors. Chat handlers render them
//! into user-facing messages through `Display`; the health listener converts
//! them into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Transport Errors**: HTTP failures talking to the Bot API
/// - **Bot API Errors**: requests the Bot API rejected (`ok: false`)
/// - **Downloader Errors**: the downloader could not be started, failed, or timed out
/// - **Selection Errors**: malformed or expired keyboard presses
/// - **Upload Errors**: files the Bot API would refuse
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// HTTP request to the Bot API failed.
    ///
    /// The request URL (which embeds the bot token) is stripped before
    /// the error is stored, see [`AppError::http`].
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),

    /// The Bot API answered with `ok: false`.
    #[error("Telegram API error {code}: {description}")]
    Telegram { code: i64, description: String },

    /// The downloader executable could not be started.
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// The downloader exited with a failure.
    ///
    /// The String holds the most relevant line of its stderr.
    #[error("{0}")]
    Downloader(String),

    /// A subprocess ran past its deadline.
    #[error("{0} timed out")]
    Timeout(String),

    /// Downloader output could not be parsed.
    #[error("Failed to parse media info: {0}")]
    MediaInfo(#[from] serde_json::Error),

    /// Local filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Callback payload did not match any known download option.
    #[error("Invalid selection: {0}")]
    InvalidCallback(String),

    /// The link behind a keyboard press is no longer known.
    #[error("This selection has expired, please send the link again")]
    SelectionExpired,

    /// The downloaded file is above the upload limit.
    #[error("File is too large to upload ({size}, limit {limit})")]
    FileTooLarge { size: String, limit: String },

    /// The update poller has not succeeded recently.
    #[error("Update polling stalled")]
    PollerStalled,
}

impl AppError {
    /// Wrap a `reqwest` error without its URL so the token never leaks.
    pub fn http(err: reqwest::Error) -> Self {
        AppError::Http(err.without_url())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::http(err)
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// # Status Code Mapping
///
/// - `PollerStalled` → 503 Service Unavailable
/// - everything else → 500 Internal Server Error (hides details from client)
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::PollerStalled => (
                StatusCode::SERVICE_UNAVAILABLE,
                "poller_stalled",
                self.to_string(),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred".to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
