//! In-process notification bus backed by a tokio broadcast channel.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use twinhub_domain::id::{BatchId, SubscriptionId};
use twinhub_domain::notification::{Notification, NotificationBatch};
use twinhub_domain::topic::TopicPattern;

use crate::ports::NotificationSink;

/// Default broadcast capacity, in batches.
pub const DEFAULT_CAPACITY: usize = 1024;

/// In-process bus using a tokio [`broadcast`] channel.
///
/// Delivering succeeds even when there are no active subscribers
/// (the batch is simply dropped). A subscriber that falls more than the
/// channel capacity behind loses the oldest batches.
pub struct InProcessEventBus {
    sender: broadcast::Sender<Arc<NotificationBatch>>,
}

impl Default for InProcessEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl InProcessEventBus {
    /// Create a new bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to notifications whose topic matches `pattern`.
    ///
    /// Only batches delivered *after* this call are seen.
    #[must_use]
    pub fn subscribe(&self, pattern: TopicPattern) -> Subscription {
        let subscription = Subscription {
            id: SubscriptionId::new(),
            pattern,
            receiver: self.sender.subscribe(),
            pending: VecDeque::new(),
            pending_batch: None,
        };
        tracing::debug!(subscription = %subscription.id, pattern = %subscription.pattern, "subscribed");
        subscription
    }

    /// Subscribe to every notification.
    #[must_use]
    pub fn subscribe_all(&self) -> Subscription {
        self.subscribe(TopicPattern::all())
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl NotificationSink for InProcessEventBus {
    fn deliver(&self, batch: NotificationBatch) {
        // broadcast::send fails only when there are zero receivers.
        let _ = self.sender.send(Arc::new(batch));
    }
}

/// A topic-filtered view of the bus.
///
/// Batches stay atomic: [`recv_batch`](Self::recv_batch) yields the
/// matching notifications of one command together, in recording order.
pub struct Subscription {
    id: SubscriptionId,
    pattern: TopicPattern,
    receiver: broadcast::Receiver<Arc<NotificationBatch>>,
    pending: VecDeque<Notification>,
    pending_batch: Option<BatchId>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("pattern", &self.pattern)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl Subscription {
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    #[must_use]
    pub fn pattern(&self) -> &TopicPattern {
        &self.pattern
    }

    /// Next matching notification. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<Notification> {
        loop {
            if let Some(notification) = self.pending.pop_front() {
                return Some(notification);
            }
            let batch = self.next_batch().await?;
            self.buffer(&batch);
        }
    }

    /// Matching part of the next batch that has any. `None` once the bus is gone.
    ///
    /// Notifications left over from a partially consumed batch come first.
    pub async fn recv_batch(&mut self) -> Option<NotificationBatch> {
        if let Some(batch) = self.take_pending() {
            return Some(batch);
        }
        loop {
            let batch = self.next_batch().await?;
            if let Some(filtered) = filter_batch(&self.pattern, &batch) {
                return Some(filtered);
            }
        }
    }

    /// Non-blocking [`recv`](Self::recv): `None` when nothing matching is queued.
    pub fn try_recv(&mut self) -> Option<Notification> {
        loop {
            if let Some(notification) = self.pending.pop_front() {
                return Some(notification);
            }
            match self.receiver.try_recv() {
                Ok(batch) => self.buffer(&batch),
                Err(TryRecvError::Lagged(skipped)) => self.lagged(skipped),
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Turn the subscription into a stream of filtered batches.
    ///
    /// Lagging is logged and skipped; the stream ends when the bus is gone.
    pub fn into_stream(self) -> impl Stream<Item = NotificationBatch> + Send + 'static {
        let Self {
            id,
            pattern,
            receiver,
            pending,
            pending_batch,
        } = self;
        let leftover = pending_batch.map(|batch_id| NotificationBatch {
            id: batch_id,
            notifications: pending.into_iter().collect(),
        });
        let rest = BroadcastStream::new(receiver).filter_map(move |item| match item {
            Ok(batch) => filter_batch(&pattern, &batch),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(subscription = %id, skipped, "subscriber lagged, notification batches were dropped");
                None
            }
        });
        tokio_stream::iter(leftover.into_iter().filter(|b| !b.is_empty())).chain(rest)
    }

    async fn next_batch(&mut self) -> Option<Arc<NotificationBatch>> {
        loop {
            match self.receiver.recv().await {
                Ok(batch) => return Some(batch),
                Err(RecvError::Lagged(skipped)) => self.lagged(skipped),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    fn buffer(&mut self, batch: &NotificationBatch) {
        let before = self.pending.len();
        self.pending.extend(
            batch
                .notifications
                .iter()
                .filter(|n| self.pattern.matches(&n.topic()))
                .cloned(),
        );
        if self.pending.len() > before {
            self.pending_batch = Some(batch.id);
        }
    }

    fn take_pending(&mut self) -> Option<NotificationBatch> {
        let id = self.pending_batch.take()?;
        if self.pending.is_empty() {
            return None;
        }
        Some(NotificationBatch {
            id,
            notifications: self.pending.drain(..).collect(),
        })
    }

    fn lagged(&self, skipped: u64) {
        tracing::warn!(subscription = %self.id, skipped, "subscriber lagged, notification batches were dropped");
    }
}

fn filter_batch(pattern: &TopicPattern, batch: &NotificationBatch) -> Option<NotificationBatch> {
    let notifications: Vec<Notification> = batch
        .notifications
        .iter()
        .filter(|n| pattern.matches(&n.topic()))
        .cloned()
        .collect();
    (!notifications.is_empty()).then(|| NotificationBatch {
        id: batch.id,
        notifications,
    })
}
