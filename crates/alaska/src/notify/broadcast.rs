//! In-process notification broadcaster for real-time subscribers.

use std::sync::Arc;

use tokio::sync::broadcast;

use super::{Notification, Notifier, NotifyError};

#[derive(Clone)]
pub struct BroadcastNotifier {
    sender: Arc<broadcast::Sender<Notification>>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(100)
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        // No active receivers is fine.
        let _ = self.sender.send(notification.clone());
        Ok(())
    }
}
