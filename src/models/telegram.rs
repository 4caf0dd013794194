//! Bot API data models.
//!
//! Only the fields the bot reads are declared; anything else in the
//! payloads is ignored by serde.
//!
//! # Envelope
//!
//! Every Bot API method answers with the same envelope:
//!
//! ```json
//! { "ok": true, "result": { ... } }
//! { "ok": false, "error_code": 400, "description": "Bad Request: chat not found" }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Response envelope returned by every Bot API method.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,

    pub result: Option<T>,

    pub error_code: Option<i64>,

    pub description: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Unwrap the envelope into its result.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Telegram` when `ok` is false or the result is missing.
    pub fn into_result(self) -> Result<T, AppError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(AppError::Telegram {
                code: self.error_code.unwrap_or_default(),
                description: self
                    .description
                    .unwrap_or_else(|| "missing result".to_string()),
            }),
        }
    }
}

/// An incoming update from `getUpdates`.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,

    pub message: Option<Message>,

    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,

    pub first_name: String,

    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,

    pub chat: Chat,

    pub text: Option<String>,
}

/// A press on an inline keyboard button.
///
/// `message` is absent for buttons attached to inline-mode messages; the bot
/// never sends those, so such queries are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,

    pub from: User,

    pub message: Option<Message>,

    pub data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboardButton {
    pub text: String,

    pub callback_data: String,
}

impl InlineKeyboardButton {
    pub fn callback(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: callback_data.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

impl InlineKeyboardMarkup {
    /// Append a row holding a single button.
    pub fn push_row(&mut self, button: InlineKeyboardButton) {
        self.inline_keyboard.push(vec![button]);
    }
}

/// Text formatting mode; entities inside HTML need only `&`, `<`, `>` escaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParseMode {
    #[serde(rename = "HTML")]
    Html,
}

/// Optional parameters shared by `sendMessage` and `sendPhoto`.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub parse_mode: Option<ParseMode>,

    pub reply_markup: Option<InlineKeyboardMarkup>,
}

impl SendOptions {
    pub fn html(reply_markup: InlineKeyboardMarkup) -> Self {
        Self {
            parse_mode: Some(ParseMode::Html),
            reply_markup: Some(reply_markup),
        }
    }

    /// Keyboard only, text sent as is.
    pub fn plain(reply_markup: InlineKeyboardMarkup) -> Self {
        Self {
            parse_mode: None,
            reply_markup: Some(reply_markup),
        }
    }
}
