//! Action port — the code that runs when an action resource is invoked.

use std::collections::HashMap;

use twinhub_domain::error::TwinError;
use twinhub_domain::resource::ResourcePath;
use twinhub_domain::value::Value;

use crate::handle::TwinHandle;

/// Behaviour bound to one action resource.
///
/// Runs on the gateway thread inside the invoking command, so it may read
/// and write the twin through `twin`. Its writes are part of the same
/// notification batch as the invocation itself.
pub trait ActionHandler: Send + Sync {
    /// Perform the action.
    ///
    /// # Errors
    ///
    /// Any [`TwinError`]; it becomes the result of the invoking command.
    fn invoke(
        &self,
        twin: &TwinHandle,
        path: &ResourcePath,
        params: &HashMap<String, Value>,
    ) -> Result<Option<Value>, TwinError>;
}

impl<F> ActionHandler for F
where
    F: Fn(&TwinHandle, &ResourcePath, &HashMap<String, Value>) -> Result<Option<Value>, TwinError>
        + Send
        + Sync,
{
    fn invoke(
        &self,
        twin: &TwinHandle,
        path: &ResourcePath,
        params: &HashMap<String, Value>,
    ) -> Result<Option<Value>, TwinError> {
        self(twin, path, params)
    }
}
