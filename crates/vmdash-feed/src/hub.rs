use tokio::sync::broadcast;
use vmdash_alert::ChangePublisher;
use vmdash_common::types::AlertChange;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Broadcasts every alert change to all subscribers, unfiltered.
///
/// Publishing never blocks. A subscriber that falls more than the channel
/// capacity behind observes `RecvError::Lagged` and must resync.
#[derive(Clone)]
pub struct FeedHub {
    tx: broadcast::Sender<AlertChange>,
}

impl Default for FeedHub {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl FeedHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AlertChange> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl ChangePublisher for FeedHub {
    fn publish(&self, change: AlertChange) {
        let alert_id = change.record().id.clone();
        match self.tx.send(change) {
            Ok(n) => tracing::debug!(alert_id = %alert_id, subscribers = n, "Alert change published"),
            // No subscribers connected.
            Err(_) => tracing::trace!(alert_id = %alert_id, "Alert change dropped, no subscribers"),
        }
    }
}
