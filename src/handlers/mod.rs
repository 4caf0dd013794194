//! Request handlers.
//!
//! - [`health`]: HTTP routes served to the hosting platform
//! - [`commands`], [`links`], [`callbacks`]: chat update handlers
//!
//! [`dispatch`] routes one Bot API update to the matching chat handler.
//! Handler errors are logged here and never reach the poller.

use std::sync::Arc;

use crate::models::telegram::Update;
use crate::state::BotContext;

/// Keyboard press handling (download and upload)
pub mod callbacks;
/// Slash commands
pub mod commands;
/// Health and liveness endpoints
pub mod health;
/// Link probing and format keyboards
pub mod links;

/// Route a single update to its handler.
pub async fn dispatch(ctx: Arc<BotContext>, update: Update) {
    let update_id = update.update_id;

    let result = if let Some(query) = &update.callback_query {
        callbacks::handle_callback(&ctx, query).await
    } else if let Some(message) = &update.message {
        match message.text.as_deref().map(str::trim) {
            Some(text) if text.starts_with('/') => {
                commands::handle_command(&ctx, message, text).await
            }
            Some(text) if !text.is_empty() => links::handle_link(&ctx, message, text).await,
            _ => Ok(()),
        }
    } else {
        Ok(())
    };

    if let Err(e) = result {
        tracing::error!(update_id, error = %e, "Failed to handle update");
    }
}
