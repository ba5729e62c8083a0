//! services/timeline_api/src/web/navigation_task.rs
//!
//! The background worker that consumes navigation requests produced by
//! timeline widgets.

use medical_timeline_core::WindowAction;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Drains the dispatcher's channel until it closes or the service shuts down.
/// Returns the number of actions handled.
pub async fn navigation_process(
    mut receiver: mpsc::UnboundedReceiver<WindowAction>,
    cancellation_token: CancellationToken,
) -> usize {
    info!("Navigation process started.");
    let mut handled = 0;

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                info!("Navigation process cancelled.");
                break;
            }
            action = receiver.recv() => match action {
                Some(action) => {
                    info!(
                        res_model = %action.res_model,
                        res_id = action.res_id,
                        view = ?action.view,
                        target = ?action.target,
                        "Opening record view."
                    );
                    handled += 1;
                }
                None => break,
            },
        }
    }

    handled
}
