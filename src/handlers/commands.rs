//! Slash command handlers.
//!
//! `/start` and `/help` answer with a short greeting; every other command is
//! ignored so that it is never mistaken for a link.

use crate::error::AppError;
use crate::models::telegram::{Message, SendOptions};
use crate::state::BotContext;

pub const GREETING: &str =
    "👋 Hi! Send me a YouTube (or other supported) link, and I'll let you choose the quality.";

/// Command name without the leading slash, bot mention, or arguments.
///
/// `"/start@my_bot payload"` → `Some("start")`
pub fn command_name(text: &str) -> Option<&str> {
    let word = text.strip_prefix('/')?.split_whitespace().next()?;
    let name = word.split('@').next().unwrap_or(word);
    (!name.is_empty()).then_some(name)
}

pub async fn handle_command(
    ctx: &BotContext,
    message: &Message,
    text: &str,
) -> Result<(), AppError> {
    match command_name(text) {
        Some("start") | Some("help") => {
            tracing::info!(chat_id = message.chat.id, "Greeting user");
            ctx.api
                .send_message(message.chat.id, GREETING, SendOptions::default())
                .await?;
        }
        other => {
            tracing::debug!(chat_id = message.chat.id, command = ?other, "Ignoring command");
        }
    }
    Ok(())
}
