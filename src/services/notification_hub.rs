use tokio::sync::broadcast;

pub(crate) const CHANNEL_CAPACITY: usize = 256;

/// A user's notification list changed; subscribers reload it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NotificationChanged {
    pub(crate) user_id: String,
}

/// In-process fan-out of notification changes to open event streams.
#[derive(Debug, Clone)]
pub(crate) struct NotificationHub {
    sender: broadcast::Sender<NotificationChanged>,
}

impl NotificationHub {
    pub(crate) fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub(crate) fn publish(&self, user_id: &str) {
        // No open streams is not an error.
        let _ = self.sender.send(NotificationChanged { user_id: user_id.to_string() });
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<NotificationChanged> {
        self.sender.subscribe()
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}
