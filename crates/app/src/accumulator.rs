//! Per-command notification buffer.
//!
//! Every command gets a fresh [`NotificationAccumulator`]. Mutations record
//! into it through the typed [`NotificationRecorder`] helpers while the
//! command runs; the gateway then completes it exactly once, handing
//! everything to the [`NotificationSink`] as one batch.

use std::sync::{Mutex, MutexGuard, PoisonError};

use twinhub_domain::error::{InvalidStateError, TwinError};
use twinhub_domain::notification::{Notification, NotificationBatch, NotificationRecorder};

use crate::ports::NotificationSink;

#[derive(Debug, Default)]
struct Buffer {
    notifications: Vec<Notification>,
    completed: bool,
}

/// Ordered buffer of the notifications produced by one command.
#[derive(Debug, Default)]
pub struct NotificationAccumulator {
    buffer: Mutex<Buffer>,
}

impl NotificationAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Buffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().notifications.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().notifications.is_empty()
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.lock().completed
    }

    /// Flush everything recorded so far to `sink` as one batch.
    ///
    /// Nothing is delivered when the buffer is empty. Returns the number of
    /// notifications delivered.
    ///
    /// # Errors
    ///
    /// [`InvalidStateError::AlreadyCompleted`] on the second call.
    pub fn complete_and_send<S: NotificationSink + ?Sized>(&self, sink: &S) -> Result<usize, TwinError> {
        let notifications = {
            let mut buffer = self.lock();
            if buffer.completed {
                return Err(InvalidStateError::AlreadyCompleted.into());
            }
            buffer.completed = true;
            std::mem::take(&mut buffer.notifications)
        };
        let count = notifications.len();
        if count > 0 {
            sink.deliver(NotificationBatch::new(notifications));
        }
        Ok(count)
    }
}

impl NotificationRecorder for NotificationAccumulator {
    fn record(&self, notification: Notification) -> Result<(), TwinError> {
        let mut buffer = self.lock();
        if buffer.completed {
            return Err(InvalidStateError::AlreadyCompleted.into());
        }
        buffer.notifications.push(notification);
        Ok(())
    }
}
