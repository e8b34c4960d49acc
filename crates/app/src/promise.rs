//! Promise — the eventual result of a submitted command.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use twinhub_domain::error::TwinError;

type Reply<T> = Result<T, TwinError>;

enum State<T> {
    Pending(oneshot::Receiver<Reply<T>>),
    Failed(Option<TwinError>),
}

/// Result of a command, resolved by the gateway thread after the command
/// ran and its notifications were flushed.
///
/// Await it from async code or call [`blocking_wait`](Self::blocking_wait)
/// from a plain thread. A command dropped without being resolved (e.g.
/// under [`PendingPolicy::Drop`](crate::gateway::PendingPolicy::Drop))
/// yields [`TwinError::Abandoned`].
pub struct Promise<T> {
    state: State<T>,
}

impl<T> Promise<T> {
    pub(crate) fn pending(receiver: oneshot::Receiver<Reply<T>>) -> Self {
        Self {
            state: State::Pending(receiver),
        }
    }

    pub(crate) fn failed(error: TwinError) -> Self {
        Self {
            state: State::Failed(Some(error)),
        }
    }

    /// Block the current thread until the command completes.
    ///
    /// Must not be called from inside an async runtime.
    ///
    /// # Errors
    ///
    /// The command's own error, or the reason it never ran.
    pub fn blocking_wait(self) -> Result<T, TwinError> {
        match self.state {
            State::Pending(receiver) => receiver.blocking_recv().unwrap_or(Err(TwinError::Abandoned)),
            State::Failed(error) => Err(error.unwrap_or(TwinError::Abandoned)),
        }
    }
}

impl<T> Future for Promise<T> {
    type Output = Result<T, TwinError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            State::Pending(receiver) => Pin::new(receiver)
                .poll(cx)
                .map(|reply| reply.unwrap_or(Err(TwinError::Abandoned))),
            State::Failed(error) => Poll::Ready(Err(error.take().unwrap_or(TwinError::Abandoned))),
        }
    }
}

impl<T> std::fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            State::Pending(_) => "pending",
            State::Failed(_) => "failed",
        };
        f.debug_struct("Promise").field("state", &state).finish()
    }
}
