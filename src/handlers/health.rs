//! Health check endpoints for the hosting platform.
//!
//! Platforms that expect a bound HTTP port get one here; the bot itself
//! talks to the Bot API by long polling and needs no inbound traffic.

use axum::{Json, Router, extract::State, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::{error::AppError, state::HealthState};

pub const RUNNING: &str = "Bot is running!";

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy" once the first poll succeeded, "starting" before
    pub status: String,

    pub uptime_secs: i64,

    /// Last successful `getUpdates` round trip
    pub last_poll: Option<DateTime<Utc>>,

    /// Current server timestamp
    pub timestamp: DateTime<Utc>,
}

/// Build the health router. Unknown paths answer like `/`.
pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .fallback(root)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Plain-text liveness answer.
pub async fn root() -> &'static str {
    RUNNING
}

/// Health check handler.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "status": "healthy",
///   "uptime_secs": 3600,
///   "last_poll": "2025-12-21T19:00:00Z",
///   "timestamp": "2025-12-21T19:00:05Z"
/// }
/// ```
///
/// # Response (503 Service Unavailable)
///
/// If the poller has not succeeded within its staleness window, returns the
/// standard error response.
pub async fn health_check(
    State(state): State<HealthState>,
) -> Result<Json<HealthResponse>, AppError> {
    let now = Utc::now();
    if state.is_stale(now).await {
        return Err(AppError::PollerStalled);
    }

    let last_poll = state.last_poll().await;
    let status = if last_poll.is_some() { "healthy" } else { "starting" };

    Ok(Json(HealthResponse {
        status: status.to_string(),
        uptime_secs: (now - state.started_at).num_seconds(),
        last_poll,
        timestamp: now,
    }))
}
