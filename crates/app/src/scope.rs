//! Command scope — the validity window of handles given to a command.
//!
//! A scope is opened on the gateway thread right before a command runs and
//! closed right after it returns. Handles check it on every call, so a
//! handle that escaped its command (stored, cloned, or sent to another
//! thread) fails with an [`InvalidStateError`] instead of touching the twin.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ThreadId};

use twinhub_domain::error::InvalidStateError;

#[derive(Debug)]
struct ScopeState {
    active: AtomicBool,
    thread: ThreadId,
}

/// Shared, cheaply cloneable validity flag of one command execution.
#[derive(Debug, Clone)]
pub struct CommandScope {
    state: Arc<ScopeState>,
}

impl CommandScope {
    /// Open a scope bound to the current thread.
    pub(crate) fn open() -> Self {
        Self {
            state: Arc::new(ScopeState {
                active: AtomicBool::new(true),
                thread: thread::current().id(),
            }),
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.active.load(Ordering::Acquire)
    }

    /// Check that the scope may be used from here.
    ///
    /// # Errors
    ///
    /// [`InvalidStateError::ScopeClosed`] once the command has returned,
    /// [`InvalidStateError::ForeignThread`] when called off the gateway thread.
    pub fn check(&self) -> Result<(), InvalidStateError> {
        if !self.is_active() {
            return Err(InvalidStateError::ScopeClosed);
        }
        if thread::current().id() != self.state.thread {
            return Err(InvalidStateError::ForeignThread);
        }
        Ok(())
    }

    /// Invalidate every handle sharing this scope. Idempotent.
    pub(crate) fn close(&self) {
        self.state.active.store(false, Ordering::Release);
    }
}
