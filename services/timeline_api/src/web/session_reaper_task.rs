//! services/timeline_api/src/web/session_reaper_task.rs
//!
//! The background worker that unmounts widgets a client stopped using without
//! calling `DELETE`.

use crate::web::state::AppState;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Sweeps idle widgets every `period` until the service shuts down.
/// Returns the number of widgets evicted.
pub async fn session_reaper_process(
    app_state: Arc<AppState>,
    period: Duration,
    cancellation_token: CancellationToken,
) -> usize {
    info!("Session reaper started.");
    let mut interval = tokio::time::interval(period);
    let mut evicted = 0;

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                info!("Session reaper cancelled.");
                break;
            }
            _ = interval.tick() => {
                evicted += app_state.evict_idle(Instant::now()).await;
            }
        }
    }

    evicted
}
