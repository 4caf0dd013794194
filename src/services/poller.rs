//! Long-polling update loop.
//!
//! # Flow
//!
//! 1. Call `getUpdates` with the next offset
//! 2. Record the successful round trip for `/health`
//! 3. Spawn one task per update so slow downloads never block polling
//! 4. On failure, back off exponentially (1s doubling, capped at 30s)
//!
//! The loop only ends when the shutdown future resolves. In-flight update
//! tasks then get [`SHUTDOWN_GRACE`] to finish; the rest are aborted, which
//! kills their downloader processes and removes their work directories.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::task::JoinSet;

use crate::handlers;
use crate::state::{BotContext, HealthState};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// How long in-flight updates may run after shutdown is requested.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Delay before the next poll after `failures` consecutive failures.
pub fn poll_backoff(failures: u32) -> Duration {
    if failures == 0 {
        return Duration::ZERO;
    }
    let exponent = (failures - 1).min(16);
    INITIAL_BACKOFF
        .saturating_mul(1 << exponent)
        .min(MAX_BACKOFF)
}

/// Poll for updates until `shutdown` resolves.
pub async fn run<F>(
    ctx: Arc<BotContext>,
    health: HealthState,
    poll_timeout: Duration,
    shutdown: F,
) where
    F: Future<Output = ()> + Send,
{
    tokio::pin!(shutdown);

    let mut offset: Option<i64> = None;
    let mut failures: u32 = 0;
    let mut tasks = JoinSet::new();

    tracing::info!(?poll_timeout, "Polling for updates");

    loop {
        let result = tokio::select! {
            _ = &mut shutdown => break,
            result = ctx.api.get_updates(offset, poll_timeout) => result,
        };

        match result {
            Ok(updates) => {
                failures = 0;
                health.record_poll().await;
                reap_finished(&mut tasks);

                for update in updates {
                    // Acknowledge everything up to this update on the next poll
                    let next = update.update_id + 1;
                    offset = Some(offset.map_or(next, |current| current.max(next)));

                    tracing::debug!(update_id = update.update_id, "Dispatching update");
                    tasks.spawn(handlers::dispatch(Arc::clone(&ctx), update));
                }
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                let delay = poll_backoff(failures);
                tracing::error!(error = %e, failures, ?delay, "Polling failed");

                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    drain(tasks, SHUTDOWN_GRACE).await;
    tracing::info!("Poller stopped");
}

/// Collect tasks that already finished, logging panics.
fn reap_finished(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.try_join_next() {
        log_join_error(result);
    }
}

/// Wait up to `grace` for in-flight tasks, then abort the rest.
async fn drain(mut tasks: JoinSet<()>, grace: Duration) {
    if tasks.is_empty() {
        return;
    }
    tracing::info!(in_flight = tasks.len(), "Waiting for in-flight updates");

    let finished = tokio::time::timeout(grace, async {
        while let Some(result) = tasks.join_next().await {
            log_join_error(result);
        }
    })
    .await;

    if finished.is_err() {
        tracing::warn!(aborted = tasks.len(), "Aborting unfinished updates");
        tasks.shutdown().await;
    }
}

fn log_join_error(result: Result<(), tokio::task::JoinError>) {
    match result {
        Err(e) if e.is_panic() => tracing::error!(error = %e, "Update task panicked"),
        _ => {}
    }
}
