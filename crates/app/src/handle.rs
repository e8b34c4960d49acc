//! Scoped handles over the twin.
//!
//! Commands never see the [`Twin`] itself. They receive a [`TwinHandle`]
//! and navigate to [`ProviderHandle`], [`ServiceHandle`] and
//! [`ResourceHandle`] from it. Every call first checks the command's
//! [`CommandScope`], then takes the twin lock for the duration of that
//! single call; no lock is held while user code (an action handler) runs.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use twinhub_domain::error::{NotFoundError, TwinError, ValidationError};
use twinhub_domain::model::{ModelDefinition, ResourceDefinition};
use twinhub_domain::resource::{ResourcePath, SetOutcome, WriteOrigin};
use twinhub_domain::snapshot::{ProviderSnapshot, ResourceSnapshot, SnapshotFilter};
use twinhub_domain::time::{Timestamp, now};
use twinhub_domain::twin::Twin;
use twinhub_domain::value::{TimedValue, Value};

use crate::accumulator::NotificationAccumulator;
use crate::ports::ActionHandler;
use crate::scope::CommandScope;

/// Everything the gateway thread owns: the twin and the bound action handlers.
pub(crate) struct TwinState {
    pub(crate) twin: Twin,
    pub(crate) actions: HashMap<ResourcePath, Arc<dyn ActionHandler>>,
}

impl TwinState {
    pub(crate) fn new(twin: Twin) -> Self {
        Self {
            twin,
            actions: HashMap::new(),
        }
    }
}

pub(crate) type SharedTwin = Arc<Mutex<TwinState>>;

struct Execution {
    state: SharedTwin,
    scope: CommandScope,
    notifications: Arc<NotificationAccumulator>,
}

/// Entry point into the twin for one command.
#[derive(Clone)]
pub struct TwinHandle {
    inner: Arc<Execution>,
}

impl fmt::Debug for TwinHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwinHandle")
            .field("active", &self.inner.scope.is_active())
            .finish_non_exhaustive()
    }
}

impl TwinHandle {
    pub(crate) fn new(
        state: SharedTwin,
        scope: CommandScope,
        notifications: Arc<NotificationAccumulator>,
    ) -> Self {
        Self {
            inner: Arc::new(Execution {
                state,
                scope,
                notifications,
            }),
        }
    }

    /// Whether calls on this handle (and handles derived from it) still work here.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.inner.scope.check().is_ok()
    }

    fn check(&self) -> Result<(), TwinError> {
        Ok(self.inner.scope.check()?)
    }

    fn with<R>(
        &self,
        f: impl FnOnce(&mut TwinState, &NotificationAccumulator) -> Result<R, TwinError>,
    ) -> Result<R, TwinError> {
        self.check()?;
        let mut state = self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut state, &self.inner.notifications)
    }

    /// Register a model; only providers created afterwards use it.
    ///
    /// # Errors
    ///
    /// Fails with an invalid-state error outside of the command.
    pub fn register_model(&self, model: ModelDefinition) -> Result<(), TwinError> {
        self.with(|state, _| {
            state.twin.register_model(model);
            Ok(())
        })
    }

    /// Provider names in lexical order.
    ///
    /// # Errors
    ///
    /// Fails with an invalid-state error outside of the command.
    pub fn provider_names(&self) -> Result<Vec<String>, TwinError> {
        self.with(|state, _| {
            Ok(state
                .twin
                .provider_names()
                .into_iter()
                .map(str::to_string)
                .collect())
        })
    }

    /// Handle on an existing provider.
    ///
    /// # Errors
    ///
    /// Fails with an invalid-state error outside of the command.
    pub fn provider(&self, name: &str) -> Result<Option<ProviderHandle>, TwinError> {
        let exists = self.with(|state, _| Ok(state.twin.provider(name).is_some()))?;
        Ok(exists.then(|| ProviderHandle {
            twin: self.clone(),
            name: name.to_string(),
        }))
    }

    /// Create a provider unless it exists, then return a handle on it.
    ///
    /// # Errors
    ///
    /// Invalid-state errors, unusable names, or a model mismatch with an
    /// existing provider.
    pub fn create_provider(&self, name: &str, model: Option<&str>) -> Result<ProviderHandle, TwinError> {
        self.with(|state, notifications| {
            state.twin.create_provider(name, model, now(), notifications)
        })?;
        Ok(ProviderHandle {
            twin: self.clone(),
            name: name.to_string(),
        })
    }

    /// Delete a provider, its services, resources and action bindings.
    ///
    /// # Errors
    ///
    /// Invalid-state errors or [`TwinError::NotFound`].
    pub fn delete_provider(&self, name: &str) -> Result<(), TwinError> {
        self.with(|state, notifications| {
            state.twin.delete_provider(name, notifications)?;
            state.actions.retain(|path, _| path.provider != name);
            Ok(())
        })
    }

    /// Handle on an existing resource.
    ///
    /// # Errors
    ///
    /// Fails with an invalid-state error outside of the command.
    pub fn resource(&self, path: &ResourcePath) -> Result<Option<ResourceHandle>, TwinError> {
        let exists = self.with(|state, _| Ok(state.twin.resource(path).is_some()))?;
        Ok(exists.then(|| ResourceHandle {
            twin: self.clone(),
            path: path.clone(),
        }))
    }

    /// Create whatever is missing along `path`, then return a handle on the resource.
    ///
    /// # Errors
    ///
    /// Invalid-state errors, unusable names, a model mismatch, or a resource
    /// the provider's model does not declare.
    pub fn ensure_resource(&self, path: &ResourcePath, model: Option<&str>) -> Result<ResourceHandle, TwinError> {
        self.with(|state, notifications| {
            state.twin.ensure_resource(path, model, now(), notifications)
        })?;
        Ok(ResourceHandle {
            twin: self.clone(),
            path: path.clone(),
        })
    }

    /// Current value of a resource.
    ///
    /// # Errors
    ///
    /// Invalid-state errors or [`TwinError::NotFound`].
    pub fn value(&self, path: &ResourcePath) -> Result<Option<TimedValue<Value>>, TwinError> {
        self.with(|state, _| Ok(state.twin.find_resource(path)?.value().cloned()))
    }

    /// Timestamped write of a resource value.
    ///
    /// # Errors
    ///
    /// Invalid-state errors, [`TwinError::NotFound`], or a value-type violation.
    pub fn set_value(
        &self,
        path: &ResourcePath,
        value: Value,
        timestamp: Timestamp,
        origin: WriteOrigin,
    ) -> Result<SetOutcome, TwinError> {
        self.with(|state, notifications| {
            state.twin.set_value(path, value, timestamp, origin, notifications)
        })
    }

    /// Timestamped merge of resource metadata.
    ///
    /// # Errors
    ///
    /// Invalid-state errors or [`TwinError::NotFound`].
    pub fn set_metadata(
        &self,
        path: &ResourcePath,
        entries: HashMap<String, Value>,
        timestamp: Timestamp,
    ) -> Result<SetOutcome, TwinError> {
        self.with(|state, notifications| {
            state.twin.set_metadata(path, entries, timestamp, notifications)
        })
    }

    /// Bind `handler` to the action resource at `path`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Invalid-state errors, [`TwinError::NotFound`], or
    /// [`ValidationError::NotAnAction`].
    pub fn register_action(&self, path: &ResourcePath, handler: Arc<dyn ActionHandler>) -> Result<(), TwinError> {
        self.with(|state, _| {
            state.twin.find_resource(path)?.check_action()?;
            state.actions.insert(path.clone(), handler);
            Ok(())
        })
    }

    /// Invoke an action resource.
    ///
    /// The invocation is recorded first; the handler then runs without the
    /// twin lock and may mutate the twin through this handle.
    ///
    /// # Errors
    ///
    /// Invalid-state errors, [`TwinError::NotFound`],
    /// [`ValidationError::NotAnAction`], [`ValidationError::NoActionHandler`],
    /// or whatever the handler returns.
    pub fn act(&self, path: &ResourcePath, params: &HashMap<String, Value>) -> Result<Option<Value>, TwinError> {
        let handler = self.with(|state, notifications| {
            state.twin.find_resource(path)?.check_action()?;
            let handler = state
                .actions
                .get(path)
                .cloned()
                .ok_or_else(|| ValidationError::NoActionHandler(path.to_string()))?;
            state.twin.record_action(path, now(), notifications)?;
            Ok(handler)
        })?;
        handler.invoke(self, path, params)
    }

    /// Immutable copy of one provider.
    ///
    /// # Errors
    ///
    /// Invalid-state errors or [`TwinError::NotFound`].
    pub fn snapshot_provider(&self, name: &str) -> Result<ProviderSnapshot, TwinError> {
        self.with(|state, _| {
            state
                .twin
                .snapshot_provider(name, now())
                .ok_or_else(|| NotFoundError::provider(name).into())
        })
    }

    /// Immutable copy of one resource.
    ///
    /// # Errors
    ///
    /// Invalid-state errors or [`TwinError::NotFound`].
    pub fn snapshot_resource(&self, path: &ResourcePath) -> Result<ResourceSnapshot, TwinError> {
        self.with(|state, _| Ok(ResourceSnapshot::from(state.twin.find_resource(path)?)))
    }

    /// Immutable copies of the providers selected by `filter`.
    ///
    /// # Errors
    ///
    /// Fails with an invalid-state error outside of the command.
    pub fn filtered_snapshot(&self, filter: &SnapshotFilter) -> Result<Vec<ProviderSnapshot>, TwinError> {
        self.with(|state, _| Ok(state.twin.filtered_snapshot(filter, now())))
    }
}

/// Scoped handle on one provider.
#[derive(Debug, Clone)]
pub struct ProviderHandle {
    twin: TwinHandle,
    name: String,
}

impl ProviderHandle {
    /// # Errors
    ///
    /// Fails with an invalid-state error outside of the command.
    pub fn name(&self) -> Result<&str, TwinError> {
        self.twin.check()?;
        Ok(&self.name)
    }

    /// # Errors
    ///
    /// Invalid-state errors or [`TwinError::NotFound`] if the provider was deleted.
    pub fn model(&self) -> Result<String, TwinError> {
        self.twin.with(|state, _| {
            state
                .twin
                .provider(&self.name)
                .map(|p| p.model().to_string())
                .ok_or_else(|| NotFoundError::provider(&self.name).into())
        })
    }

    /// Service names in lexical order.
    ///
    /// # Errors
    ///
    /// Invalid-state errors or [`TwinError::NotFound`] if the provider was deleted.
    pub fn service_names(&self) -> Result<Vec<String>, TwinError> {
        self.twin.with(|state, _| {
            let provider = state
                .twin
                .provider(&self.name)
                .ok_or_else(|| NotFoundError::provider(&self.name))?;
            Ok(provider.service_names().into_iter().map(str::to_string).collect())
        })
    }

    /// # Errors
    ///
    /// Fails with an invalid-state error outside of the command.
    pub fn service(&self, name: &str) -> Result<Option<ServiceHandle>, TwinError> {
        let exists = self.twin.with(|state, _| {
            Ok(state
                .twin
                .provider(&self.name)
                .and_then(|p| p.service(name))
                .is_some())
        })?;
        Ok(exists.then(|| ServiceHandle {
            twin: self.twin.clone(),
            provider: self.name.clone(),
            name: name.to_string(),
        }))
    }

    /// # Errors
    ///
    /// Invalid-state errors or [`TwinError::NotFound`].
    pub fn snapshot(&self) -> Result<ProviderSnapshot, TwinError> {
        self.twin.snapshot_provider(&self.name)
    }

    /// # Errors
    ///
    /// Invalid-state errors or [`TwinError::NotFound`].
    pub fn delete(&self) -> Result<(), TwinError> {
        self.twin.delete_provider(&self.name)
    }
}

/// Scoped handle on one service.
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    twin: TwinHandle,
    provider: String,
    name: String,
}

impl ServiceHandle {
    /// # Errors
    ///
    /// Fails with an invalid-state error outside of the command.
    pub fn provider(&self) -> Result<&str, TwinError> {
        self.twin.check()?;
        Ok(&self.provider)
    }

    /// # Errors
    ///
    /// Fails with an invalid-state error outside of the command.
    pub fn name(&self) -> Result<&str, TwinError> {
        self.twin.check()?;
        Ok(&self.name)
    }

    /// Resource names in lexical order.
    ///
    /// # Errors
    ///
    /// Invalid-state errors or [`TwinError::NotFound`] if the service was removed.
    pub fn resource_names(&self) -> Result<Vec<String>, TwinError> {
        self.twin.with(|state, _| {
            let service = state
                .twin
                .provider(&self.provider)
                .and_then(|p| p.service(&self.name))
                .ok_or_else(|| NotFoundError::service(&self.provider, &self.name))?;
            let mut names: Vec<String> = service.resources().map(|r| r.name().to_string()).collect();
            names.sort_unstable();
            Ok(names)
        })
    }

    /// # Errors
    ///
    /// Fails with an invalid-state error outside of the command.
    pub fn resource(&self, name: &str) -> Result<Option<ResourceHandle>, TwinError> {
        self.twin
            .resource(&ResourcePath::new(&self.provider, &self.name, name))
    }

    /// Remove this service and its resources.
    ///
    /// # Errors
    ///
    /// Invalid-state errors, [`TwinError::NotFound`], or
    /// [`ValidationError::AdminService`].
    pub fn delete(&self) -> Result<(), TwinError> {
        self.twin.with(|state, notifications| {
            state
                .twin
                .delete_service(&self.provider, &self.name, notifications)?;
            state
                .actions
                .retain(|path, _| path.provider != self.provider || path.service != self.name);
            Ok(())
        })
    }
}

/// Scoped handle on one resource.
#[derive(Debug, Clone)]
pub struct ResourceHandle {
    twin: TwinHandle,
    path: ResourcePath,
}

impl ResourceHandle {
    /// # Errors
    ///
    /// Fails with an invalid-state error outside of the command.
    pub fn path(&self) -> Result<&ResourcePath, TwinError> {
        self.twin.check()?;
        Ok(&self.path)
    }

    /// # Errors
    ///
    /// Invalid-state errors or [`TwinError::NotFound`].
    pub fn definition(&self) -> Result<ResourceDefinition, TwinError> {
        self.twin
            .with(|state, _| Ok(*state.twin.find_resource(&self.path)?.definition()))
    }

    /// # Errors
    ///
    /// Invalid-state errors or [`TwinError::NotFound`].
    pub fn value(&self) -> Result<Option<TimedValue<Value>>, TwinError> {
        self.twin.value(&self.path)
    }

    /// # Errors
    ///
    /// Invalid-state errors, [`TwinError::NotFound`], or a value-type violation.
    pub fn set_value(&self, value: Value, timestamp: Timestamp, origin: WriteOrigin) -> Result<SetOutcome, TwinError> {
        self.twin.set_value(&self.path, value, timestamp, origin)
    }

    /// # Errors
    ///
    /// Invalid-state errors or [`TwinError::NotFound`].
    pub fn metadata(&self) -> Result<HashMap<String, Value>, TwinError> {
        self.twin
            .with(|state, _| Ok(state.twin.find_resource(&self.path)?.metadata().clone()))
    }

    /// # Errors
    ///
    /// Invalid-state errors or [`TwinError::NotFound`].
    pub fn set_metadata(&self, entries: HashMap<String, Value>, timestamp: Timestamp) -> Result<SetOutcome, TwinError> {
        self.twin.set_metadata(&self.path, entries, timestamp)
    }

    /// # Errors
    ///
    /// See [`TwinHandle::act`].
    pub fn act(&self, params: &HashMap<String, Value>) -> Result<Option<Value>, TwinError> {
        self.twin.act(&self.path, params)
    }

    /// # Errors
    ///
    /// Invalid-state errors or [`TwinError::NotFound`].
    pub fn snapshot(&self) -> Result<ResourceSnapshot, TwinError> {
        self.twin.snapshot_resource(&self.path)
    }
}
