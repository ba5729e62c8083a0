//! services/timeline_api/src/adapters/dispatcher.rs
//!
//! Implements the `ActionDispatcher` port by handing navigation requests to a
//! channel. Whoever owns the receiving end performs the navigation.

use medical_timeline_core::{ActionDispatcher, WindowAction};
use tokio::sync::mpsc;
use tracing::error;

#[derive(Clone)]
pub struct ChannelDispatcher {
    sender: mpsc::UnboundedSender<WindowAction>,
}

impl ChannelDispatcher {
    /// Creates the dispatcher together with the receiver of its actions.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<WindowAction>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ActionDispatcher for ChannelDispatcher {
    fn do_action(&self, action: WindowAction) {
        if let Err(mpsc::error::SendError(action)) = self.sender.send(action) {
            error!(
                res_model = %action.res_model,
                res_id = action.res_id,
                "Navigation channel closed, dropping action."
            );
        }
    }
}
