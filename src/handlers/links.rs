//! Link handler: probe a link and offer download formats.
//!
//! # Flow
//!
//! 1. Find the first `http(s)` URL in the message (hint the user if none)
//! 2. Post a "checking" status message
//! 3. Probe the link with the downloader
//! 4. Cache the link under its callback key
//! 5. Reply with thumbnail + caption + format keyboard (text reply if no thumbnail,
//!    unformatted text if the Bot API rejects the HTML caption)
//! 6. Delete the status message, or turn it into the error on failure

use url::Url;

use crate::error::AppError;
use crate::models::choice::{DownloadChoice, callback_key};
use crate::models::media::MediaInfo;
use crate::models::telegram::{InlineKeyboardButton, InlineKeyboardMarkup, Message, SendOptions};
use crate::services::link_cache::CachedLink;
use crate::state::BotContext;
use crate::text::{escape_html, format_duration};

pub const CHECKING: &str = "🔍 Checking link...";

pub const NO_LINK_HINT: &str = "🔗 Please send a link starting with http:// or https://";

/// First `http`/`https` URL with a host among the whitespace-separated words.
pub fn extract_link(text: &str) -> Option<Url> {
    text.split_whitespace()
        .map(|word| word.trim_matches(|c: char| matches!(c, '<' | '>' | '(' | ')' | '"' | '\'')))
        .filter_map(|word| Url::parse(word).ok())
        .find(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
}

/// Audio row first, then one row per distinct height, highest first.
pub fn build_format_keyboard(
    info: &MediaInfo,
    key: &str,
    max_video_options: usize,
) -> InlineKeyboardMarkup {
    let mut keyboard = InlineKeyboardMarkup::default();
    keyboard.push_row(InlineKeyboardButton::callback(
        "🎵 MP3 / Audio",
        DownloadChoice::audio(key).to_string(),
    ));

    for height in info.video_heights(max_video_options) {
        keyboard.push_row(InlineKeyboardButton::callback(
            format!("🎬 {height}p"),
            DownloadChoice::video(key, height).to_string(),
        ));
    }

    keyboard
}

/// HTML caption for the format picker.
pub fn format_caption(info: &MediaInfo) -> String {
    caption_with_title(info, &format!("<b>{}</b>", escape_html(&info.title)))
}

/// The caption without markup.
pub fn plain_caption(info: &MediaInfo) -> String {
    caption_with_title(info, &info.title)
}

fn caption_with_title(info: &MediaInfo, title: &str) -> String {
    let mut caption = format!("📹 {title}\n");
    if let Some(duration) = info.duration.filter(|d| *d > 0.0) {
        caption.push_str(&format!("⏱ {}\n", format_duration(duration)));
    }
    caption.push_str("\nSelect a format:");
    caption
}

pub async fn handle_link(ctx: &BotContext, message: &Message, text: &str) -> Result<(), AppError> {
    let chat_id = message.chat.id;

    let Some(url) = extract_link(text) else {
        ctx.api
            .send_message(chat_id, NO_LINK_HINT, SendOptions::default())
            .await?;
        return Ok(());
    };

    tracing::info!(chat_id, url = %url, "Checking link");
    let status = ctx
        .api
        .send_message(chat_id, CHECKING, SendOptions::default())
        .await?;

    match offer_formats(ctx, chat_id, url.as_str()).await {
        Ok(()) => {
            if let Err(e) = ctx.api.delete_message(chat_id, status.message_id).await {
                tracing::warn!(chat_id, error = %e, "Failed to delete status message");
            }
        }
        Err(e) => {
            tracing::error!(chat_id, url = %url, error = %e, "Failed to probe link");
            ctx.api
                .edit_message_text(
                    chat_id,
                    status.message_id,
                    &format!("❌ Error: {e}\nLink might not be supported."),
                )
                .await?;
        }
    }

    Ok(())
}

async fn offer_formats(ctx: &BotContext, chat_id: i64, url: &str) -> Result<(), AppError> {
    let info = ctx.downloader.probe(url).await?;

    let page_url = info.webpage_url.clone().unwrap_or_else(|| url.to_string());
    let key = callback_key(&info.id, &page_url);
    ctx.links
        .remember(
            &key,
            CachedLink {
                url: page_url,
                media_id: info.id.clone(),
                title: Some(info.title.clone()),
            },
        )
        .await;

    let keyboard = build_format_keyboard(&info, &key, ctx.settings.max_video_options);
    let caption = format_caption(&info);

    if let Some(thumbnail) = &info.thumbnail {
        match ctx
            .api
            .send_photo(chat_id, thumbnail, &caption, SendOptions::html(keyboard.clone()))
            .await
        {
            Ok(_) => return Ok(()),
            Err(e) => {
                tracing::warn!(chat_id, error = %e, "Thumbnail rejected, replying with text");
            }
        }
    }

    match ctx
        .api
        .send_message(chat_id, &caption, SendOptions::html(keyboard.clone()))
        .await
    {
        Ok(_) => return Ok(()),
        Err(e) => {
            tracing::warn!(chat_id, error = %e, "Formatted caption rejected, sending plain text");
        }
    }

    ctx.api
        .send_message(chat_id, &plain_caption(&info), SendOptions::plain(keyboard))
        .await?;
    Ok(())
}
