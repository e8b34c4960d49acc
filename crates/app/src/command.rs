//! Commands — units of work executed on the gateway thread.
//!
//! A command runs with exclusive access to the twin. Whatever it records
//! is flushed as one notification batch once it returns, whether it
//! succeeded or failed.

use twinhub_domain::error::TwinError;

use crate::accumulator::NotificationAccumulator;
use crate::handle::TwinHandle;

/// A unit of work submitted to the gateway.
pub trait Command: Send + 'static {
    type Output: Send + 'static;

    /// Run the command.
    ///
    /// `twin` and everything derived from it stop working once this returns.
    ///
    /// # Errors
    ///
    /// Any [`TwinError`]; it becomes the result of the command's promise.
    fn call(self, twin: &TwinHandle, notifications: &NotificationAccumulator) -> Result<Self::Output, TwinError>;
}

/// A closure lifted into a [`Command`]. Build it with [`command`].
pub struct FnCommand<F>(F);

/// Lift a closure into a [`Command`].
pub fn command<F, T>(f: F) -> FnCommand<F>
where
    F: FnOnce(&TwinHandle, &NotificationAccumulator) -> Result<T, TwinError> + Send + 'static,
    T: Send + 'static,
{
    FnCommand(f)
}

impl<F, T> Command for FnCommand<F>
where
    F: FnOnce(&TwinHandle, &NotificationAccumulator) -> Result<T, TwinError> + Send + 'static,
    T: Send + 'static,
{
    type Output = T;

    fn call(self, twin: &TwinHandle, notifications: &NotificationAccumulator) -> Result<T, TwinError> {
        (self.0)(twin, notifications)
    }
}

type SubCommand<T> = Box<dyn FnOnce(&TwinHandle, &NotificationAccumulator) -> Result<T, TwinError> + Send>;

/// Several commands executed as one, with a single notification batch.
///
/// Every sub-command runs, even after one fails. On success the outputs
/// come back in order; otherwise the first failure is returned as
/// [`TwinError::BatchFailed`]. Mutations made by the other sub-commands
/// stay applied and are still notified.
pub struct CommandBatch<T> {
    commands: Vec<SubCommand<T>>,
}

impl<T> Default for CommandBatch<T> {
    fn default() -> Self {
        Self { commands: Vec::new() }
    }
}

impl<T: Send + 'static> CommandBatch<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<F>(&mut self, f: F)
    where
        F: FnOnce(&TwinHandle, &NotificationAccumulator) -> Result<T, TwinError> + Send + 'static,
    {
        self.commands.push(Box::new(f));
    }

    /// Builder-style [`push`](Self::push).
    #[must_use]
    pub fn with<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&TwinHandle, &NotificationAccumulator) -> Result<T, TwinError> + Send + 'static,
    {
        self.push(f);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl<T: Send + 'static> Command for CommandBatch<T> {
    type Output = Vec<T>;

    fn call(self, twin: &TwinHandle, notifications: &NotificationAccumulator) -> Result<Vec<T>, TwinError> {
        let mut outputs = Vec::with_capacity(self.commands.len());
        let mut failure = None;
        for (index, sub) in self.commands.into_iter().enumerate() {
            match sub(twin, notifications) {
                Ok(output) => outputs.push(output),
                Err(err) => {
                    tracing::debug!(index, error = %err, "batched sub-command failed");
                    if failure.is_none() {
                        failure = Some(TwinError::BatchFailed {
                            index,
                            source: Box::new(err),
                        });
                    }
                }
            }
        }
        failure.map_or(Ok(outputs), Err)
    }
}
