//! Media Download Bot - Main Application Entry Point
//!
//! A Telegram bot that turns media links into files. Users send a link, pick
//! a format from an inline keyboard, and receive the audio or video back in
//! the chat.
//!
//! # Architecture
//!
//! - **Bot API**: long polling with `reqwest` (no inbound webhook needed)
//! - **Downloader**: `yt-dlp` subprocess, with FFmpeg for merging and MP3 extraction
//! - **Health server**: optional Axum listener for hosting platforms that require a bound port
//! - **Format**: JSON for the Bot API, multipart for uploads
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create the download directory and clear work directories left by a previous run
//! 3. Verify the bot token with `getMe`
//! 4. Start the health server (when enabled) on the configured port
//! 5. Poll for updates until Ctrl-C / SIGTERM

mod config;
mod error;
mod handlers;
mod models;
mod services;
mod state;
mod text;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::services::{
    downloader::{self, YtDlp},
    poller,
    telegram_client::{BotApi, TelegramClient},
};
use crate::state::{BotContext, BotSettings, HealthState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!("Configuration loaded");

    tokio::fs::create_dir_all(&config.download_dir).await?;
    let stale = downloader::clear_stale_job_dirs(&config.download_dir).await?;
    tracing::info!(
        dir = %config.download_dir.display(),
        removed_stale = stale,
        "Download directory ready"
    );

    // Fail fast on a bad token instead of inside the poll loop
    let client = TelegramClient::new(&config.telegram_api_url, config.telegram_bot_token.clone())?;
    let me = client.get_me().await?;
    tracing::info!(
        bot_id = me.id,
        username = me.username.as_deref().unwrap_or(&me.first_name),
        "Authorized with Bot API"
    );

    let health = HealthState::new(config.poll_timeout());

    if config.health_server_enabled() {
        let addr = format!("0.0.0.0:{}", config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!("Health server listening on {}", addr);

        let app = handlers::health::router(health.clone());
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Health server stopped");
            }
        });
    }

    let ctx = Arc::new(BotContext::new(
        Arc::new(client),
        Arc::new(YtDlp::from_config(&config)),
        BotSettings::from_config(&config),
        config.max_concurrent_downloads,
    ));

    tracing::info!("Bot is running...");
    poller::run(ctx, health, config.poll_timeout(), shutdown_signal()).await;

    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
