//! Notification sink port — where flushed batches are delivered.

use std::sync::Arc;

use twinhub_domain::notification::NotificationBatch;

/// Receives one batch per completed command.
///
/// Called on the gateway thread, in command order. Implementations must
/// not block: hand the batch off and return.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, batch: NotificationBatch);
}

impl<T: NotificationSink + ?Sized> NotificationSink for Arc<T> {
    fn deliver(&self, batch: NotificationBatch) {
        (**self).deliver(batch);
    }
}

/// Sink that discards everything. Useful when nobody listens.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardSink;

impl NotificationSink for DiscardSink {
    fn deliver(&self, _batch: NotificationBatch) {}
}
