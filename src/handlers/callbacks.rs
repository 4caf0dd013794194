//! Keyboard press handler: download the chosen rendition and upload it.
//!
//! # Flow
//!
//! 1. Acknowledge the press
//! 2. Decode the payload and look up the link it refers to
//! 3. Remove the keyboard and post a "downloading" status message
//! 4. Download into a fresh work directory (bounded by the download slots)
//! 5. Check the upload limit, upload as audio or video, delete the status message
//! 6. Delete the work directory, whatever the outcome

use std::path::Path;

use crate::error::AppError;
use crate::models::choice::{DownloadChoice, DownloadKind};
use crate::models::telegram::{CallbackQuery, SendOptions};
use crate::services::downloader::{create_job_dir, remove_job_dir};
use crate::services::link_cache::CachedLink;
use crate::state::BotContext;
use crate::text::human_readable_size;

pub async fn handle_callback(ctx: &BotContext, query: &CallbackQuery) -> Result<(), AppError> {
    if let Err(e) = ctx.api.answer_callback_query(&query.id).await {
        tracing::warn!(callback_id = %query.id, error = %e, "Failed to answer callback query");
    }

    let Some(message) = &query.message else {
        tracing::warn!(callback_id = %query.id, "Callback query without message, ignoring");
        return Ok(());
    };
    let chat_id = message.chat.id;

    let data = query.data.as_deref().unwrap_or_default();
    let (choice, link) = match resolve_choice(ctx, data).await {
        Ok(resolved) => resolved,
        Err(e) => {
            tracing::warn!(chat_id, error = %e, "Rejected keyboard press");
            ctx.api
                .send_message(
                    chat_id,
                    &format!("❌ Download failed: {e}"),
                    SendOptions::default(),
                )
                .await?;
            return Ok(());
        }
    };

    if let Err(e) = ctx
        .api
        .edit_message_reply_markup(chat_id, message.message_id, None)
        .await
    {
        tracing::warn!(chat_id, error = %e, "Failed to remove keyboard");
    }

    tracing::info!(
        chat_id,
        user_id = query.from.id,
        url = %link.url,
        kind = choice.kind.label(),
        "Download requested"
    );

    let status = ctx
        .api
        .send_message(
            chat_id,
            &format!(
                "⬇️ Downloading {}... This might take a moment.",
                choice.kind.label()
            ),
            SendOptions::default(),
        )
        .await?;

    // The work directory is also removed on drop if this task is aborted
    let result = match create_job_dir(&ctx.settings.download_dir) {
        Ok(job) => {
            let result =
                deliver(ctx, chat_id, status.message_id, &choice, &link, job.path()).await;
            remove_job_dir(job).await;
            result
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            if let Err(e) = ctx.api.delete_message(chat_id, status.message_id).await {
                tracing::warn!(chat_id, error = %e, "Failed to delete status message");
            }
        }
        Err(e) => {
            tracing::error!(chat_id, url = %link.url, error = %e, "Download failed");
            let text = format!("❌ Download failed: {e}");
            if let Err(edit_err) = ctx
                .api
                .edit_message_text(chat_id, status.message_id, &text)
                .await
            {
                tracing::warn!(chat_id, error = %edit_err, "Failed to report download error");
            }
        }
    }

    Ok(())
}

async fn resolve_choice(
    ctx: &BotContext,
    data: &str,
) -> Result<(DownloadChoice, CachedLink), AppError> {
    let choice: DownloadChoice = data.parse()?;
    let link = ctx.links.resolve(&choice.key).await?;
    Ok((choice, link))
}

/// Download into `dest`, check the size and upload.
async fn deliver(
    ctx: &BotContext,
    chat_id: i64,
    status_id: i64,
    choice: &DownloadChoice,
    link: &CachedLink,
    dest: &Path,
) -> Result<(), AppError> {
    let media = {
        let _slot = ctx
            .download_slots
            .acquire()
            .await
            .map_err(|_| AppError::Downloader("download queue is closed".to_string()))?;
        ctx.downloader
            .download(&link.url, &link.media_id, choice.kind, dest)
            .await?
    };

    if media.size_bytes > ctx.settings.upload_limit_bytes {
        return Err(AppError::FileTooLarge {
            size: human_readable_size(media.size_bytes, 2),
            limit: human_readable_size(ctx.settings.upload_limit_bytes, 0),
        });
    }

    ctx.api
        .edit_message_text(
            chat_id,
            status_id,
            &format!(
                "⬆️ Uploading to Telegram... ({})",
                human_readable_size(media.size_bytes, 2)
            ),
        )
        .await?;

    match choice.kind {
        DownloadKind::Audio => {
            let title = link.title.as_deref().unwrap_or("Audio");
            ctx.api.send_audio(chat_id, &media.path, title).await?;
        }
        DownloadKind::Video { .. } => {
            let caption = link.title.as_deref().unwrap_or("Video");
            ctx.api.send_video(chat_id, &media.path, caption).await?;
        }
    }

    Ok(())
}
