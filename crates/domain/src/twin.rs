//! Twin — the provider/service/resource graph and its mutation rules.
//!
//! Every mutation takes a [`NotificationRecorder`] and records the
//! lifecycle, data, metadata or action events it causes, in the order the
//! changes are applied. The twin knows nothing about threads: callers are
//! expected to serialize access (see the gateway in the `app` crate).

use std::collections::HashMap;

use crate::error::{NotFoundError, TwinError, ValidationError};
use crate::model::{
    ADMIN_SERVICE, MODEL_URI_RESOURCE, ModelDefinition, ModelRegistry, ResourceDefinition, validate_name,
};
use crate::notification::{LifecycleNotification, LifecycleStatus, NotificationRecorder};
use crate::provider::Provider;
use crate::resource::{MetadataChange, Resource, ResourcePath, SetOutcome, ValueChange, WriteOrigin};
use crate::service::Service;
use crate::snapshot::{ProviderSnapshot, SnapshotFilter};
use crate::time::Timestamp;
use crate::value::{TimedValue, Value, ValueKind};

/// The in-memory twin.
#[derive(Debug, Default)]
pub struct Twin {
    registry: ModelRegistry,
    providers: HashMap<String, Provider>,
}

impl Twin {
    #[must_use]
    pub fn new(registry: ModelRegistry) -> Self {
        Self {
            registry,
            providers: HashMap::new(),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Register a model at runtime. Only providers created afterwards use it.
    pub fn register_model(&mut self, model: ModelDefinition) {
        self.registry.register(model);
    }

    #[must_use]
    pub fn provider(&self, name: &str) -> Option<&Provider> {
        self.providers.get(name)
    }

    pub fn providers(&self) -> impl Iterator<Item = &Provider> {
        self.providers.values()
    }

    /// Provider names in lexical order.
    #[must_use]
    pub fn provider_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn resource(&self, path: &ResourcePath) -> Option<&Resource> {
        self.providers
            .get(&path.provider)?
            .service(&path.service)?
            .resource(&path.resource)
    }

    /// Look up a resource, distinguishing which level is missing.
    ///
    /// # Errors
    ///
    /// Returns [`TwinError::NotFound`] naming the missing provider, service or resource.
    pub fn find_resource(&self, path: &ResourcePath) -> Result<&Resource, TwinError> {
        let provider = self
            .providers
            .get(&path.provider)
            .ok_or_else(|| NotFoundError::provider(&path.provider))?;
        let service = provider
            .service(&path.service)
            .ok_or_else(|| NotFoundError::service(&path.provider, &path.service))?;
        service
            .resource(&path.resource)
            .ok_or_else(|| NotFoundError::resource(&path.provider, &path.service, &path.resource).into())
    }

    /// Create a provider unless it exists. Returns `true` when created.
    ///
    /// The model defaults to the provider name. Registered models get all
    /// their declared services and resources instantiated immediately.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unusable names, or when the provider
    /// exists under a different explicitly requested model.
    pub fn create_provider(
        &mut self,
        name: &str,
        model: Option<&str>,
        timestamp: Timestamp,
        recorder: &dyn NotificationRecorder,
    ) -> Result<bool, TwinError> {
        validate_name(name)?;
        if let Some(existing) = self.providers.get(name) {
            if let Some(requested) = model
                && requested != existing.model()
            {
                return Err(ValidationError::ModelMismatch {
                    provider: name.to_string(),
                    existing: existing.model().to_string(),
                    requested: requested.to_string(),
                }
                .into());
            }
            return Ok(false);
        }
        let model = model.unwrap_or(name);
        validate_name(model)?;

        let mut provider = Provider::new(name, model);
        if let Some(uri) = provider
            .service_mut(ADMIN_SERVICE)
            .and_then(|admin| admin.resource_mut(MODEL_URI_RESOURCE))
        {
            uri.set_value(Value::from(model), timestamp, WriteOrigin::Push)?;
        }
        if let Some(definition) = self.registry.get(model) {
            provider.mark_modelled();
            let mut services: Vec<_> = definition.services.iter().collect();
            services.sort_by(|a, b| a.0.cmp(b.0));
            for (service_name, service_def) in services {
                provider.add_service(service_name);
                if let Some(service) = provider.service_mut(service_name) {
                    for (resource_name, def) in &service_def.resources {
                        service.add_resource(resource_name, *def);
                    }
                }
            }
        }

        recorder.lifecycle(lifecycle(model, name, None, None, LifecycleStatus::ProviderCreated))?;
        for service_name in provider.service_names() {
            if let Some(service) = provider.service(service_name) {
                record_service(model, service, LifecycleStatus::ServiceCreated, recorder)?;
            }
        }

        self.providers.insert(name.to_string(), provider);
        Ok(true)
    }

    /// Make sure the provider, service and resource of `path` exist,
    /// creating and announcing whatever is missing.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unusable names, a model mismatch, or
    /// a resource the provider's registered model does not declare.
    pub fn ensure_resource(
        &mut self,
        path: &ResourcePath,
        model: Option<&str>,
        timestamp: Timestamp,
        recorder: &dyn NotificationRecorder,
    ) -> Result<(), TwinError> {
        validate_name(&path.service)?;
        validate_name(&path.resource)?;
        self.create_provider(&path.provider, model, timestamp, recorder)?;

        let provider = self
            .providers
            .get_mut(&path.provider)
            .ok_or_else(|| NotFoundError::provider(&path.provider))?;
        if provider
            .service(&path.service)
            .is_some_and(|svc| svc.resource(&path.resource).is_some())
        {
            return Ok(());
        }

        let model = provider.model().to_string();
        let definition = if provider.is_modelled() {
            self.registry.resolve(&model, &path.service, &path.resource)?
        } else {
            ResourceDefinition::dynamic()
        };

        if provider.add_service(&path.service) {
            recorder.lifecycle(lifecycle(
                &model,
                &path.provider,
                Some(&path.service),
                None,
                LifecycleStatus::ServiceCreated,
            ))?;
        }
        let service = provider
            .service_mut(&path.service)
            .ok_or_else(|| NotFoundError::service(&path.provider, &path.service))?;
        service.add_resource(&path.resource, definition);
        recorder.lifecycle(lifecycle(
            &model,
            &path.provider,
            Some(&path.service),
            Some(&path.resource),
            LifecycleStatus::ResourceCreated,
        ))?;
        Ok(())
    }

    /// Timestamped value write on an existing resource.
    ///
    /// # Errors
    ///
    /// Returns [`TwinError::NotFound`] if the resource does not exist, or a
    /// validation error from the resource's value-type rules.
    pub fn set_value(
        &mut self,
        path: &ResourcePath,
        value: Value,
        timestamp: Timestamp,
        origin: WriteOrigin,
        recorder: &dyn NotificationRecorder,
    ) -> Result<SetOutcome, TwinError> {
        let (model, resource) = self.resource_mut(path)?;
        let kind = match resource.definition().value_kind {
            ValueKind::Any => value.kind(),
            declared => declared,
        };
        match resource.set_value(value.clone(), timestamp, origin)? {
            ValueChange::Stale => Ok(SetOutcome::Stale),
            ValueChange::Applied { old } => {
                let old = old.map(TimedValue::into_value);
                recorder.resource_value_update(&model, path, kind, old, value, timestamp)?;
                Ok(SetOutcome::Applied)
            }
        }
    }

    /// Timestamped metadata merge on an existing resource.
    ///
    /// # Errors
    ///
    /// Returns [`TwinError::NotFound`] if the resource does not exist.
    pub fn set_metadata(
        &mut self,
        path: &ResourcePath,
        entries: HashMap<String, Value>,
        timestamp: Timestamp,
        recorder: &dyn NotificationRecorder,
    ) -> Result<SetOutcome, TwinError> {
        let (model, resource) = self.resource_mut(path)?;
        match resource.set_metadata(entries, timestamp) {
            MetadataChange::Stale => Ok(SetOutcome::Stale),
            MetadataChange::Applied { old, new } => {
                recorder.resource_metadata_update(&model, path, old, new, timestamp)?;
                Ok(SetOutcome::Applied)
            }
        }
    }

    /// Check that `path` is an action and record its invocation.
    ///
    /// # Errors
    ///
    /// Returns [`TwinError::NotFound`] or [`ValidationError::NotAnAction`].
    pub fn record_action(
        &self,
        path: &ResourcePath,
        timestamp: Timestamp,
        recorder: &dyn NotificationRecorder,
    ) -> Result<(), TwinError> {
        let resource = self.find_resource(path)?;
        resource.check_action()?;
        let model = self
            .providers
            .get(&path.provider)
            .map(|p| p.model().to_string())
            .unwrap_or_default();
        recorder.action(&model, path, timestamp)
    }

    /// Remove a provider and everything it owns.
    ///
    /// Records resource, then service deletions for every service, then the
    /// provider deletion last.
    ///
    /// # Errors
    ///
    /// Returns [`TwinError::NotFound`] if the provider does not exist.
    pub fn delete_provider(
        &mut self,
        name: &str,
        recorder: &dyn NotificationRecorder,
    ) -> Result<(), TwinError> {
        let provider = self
            .providers
            .remove(name)
            .ok_or_else(|| NotFoundError::provider(name))?;
        let model = provider.model();
        for service_name in provider.service_names() {
            if let Some(service) = provider.service(service_name) {
                record_service(model, service, LifecycleStatus::ServiceDeleted, recorder)?;
            }
        }
        recorder.lifecycle(lifecycle(model, name, None, None, LifecycleStatus::ProviderDeleted))
    }

    /// Remove one service (never `admin`) and its resources.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::AdminService`] for the admin service, or
    /// [`TwinError::NotFound`] if the provider or service does not exist.
    pub fn delete_service(
        &mut self,
        provider: &str,
        service: &str,
        recorder: &dyn NotificationRecorder,
    ) -> Result<(), TwinError> {
        if service == ADMIN_SERVICE {
            return Err(ValidationError::AdminService.into());
        }
        let owner = self
            .providers
            .get_mut(provider)
            .ok_or_else(|| NotFoundError::provider(provider))?;
        let removed = owner
            .remove_service(service)
            .ok_or_else(|| NotFoundError::service(provider, service))?;
        record_service(owner.model(), &removed, LifecycleStatus::ServiceDeleted, recorder)
    }

    /// Immutable copy of one provider.
    #[must_use]
    pub fn snapshot_provider(&self, name: &str, snapshot_time: Timestamp) -> Option<ProviderSnapshot> {
        self.providers
            .get(name)
            .map(|p| ProviderSnapshot::capture(p, snapshot_time))
    }

    /// Immutable copies of every provider selected by `filter`, sorted by name.
    #[must_use]
    pub fn filtered_snapshot(&self, filter: &SnapshotFilter, snapshot_time: Timestamp) -> Vec<ProviderSnapshot> {
        self.provider_names()
            .into_iter()
            .filter_map(|name| self.snapshot_provider(name, snapshot_time))
            .filter_map(|snapshot| filter.apply(snapshot))
            .collect()
    }

    fn resource_mut(&mut self, path: &ResourcePath) -> Result<(String, &mut Resource), TwinError> {
        let provider = self
            .providers
            .get_mut(&path.provider)
            .ok_or_else(|| NotFoundError::provider(&path.provider))?;
        let model = provider.model().to_string();
        let resource = provider
            .service_mut(&path.service)
            .ok_or_else(|| NotFoundError::service(&path.provider, &path.service))?
            .resource_mut(&path.resource)
            .ok_or_else(|| NotFoundError::resource(&path.provider, &path.service, &path.resource))?;
        Ok((model, resource))
    }
}

fn lifecycle(
    model: &str,
    provider: &str,
    service: Option<&str>,
    resource: Option<&str>,
    status: LifecycleStatus,
) -> LifecycleNotification {
    LifecycleNotification {
        model: model.to_string(),
        provider: provider.to_string(),
        service: service.map(str::to_string),
        resource: resource.map(str::to_string),
        status,
        initial_value: None,
        initial_metadata: None,
    }
}

/// Record a service event together with one event per resource.
///
/// Creation announces the service first; deletion announces the resources
/// first. Resource events carry the value and metadata at that moment.
fn record_service(
    model: &str,
    service: &Service,
    status: LifecycleStatus,
    recorder: &dyn NotificationRecorder,
) -> Result<(), TwinError> {
    let resource_status = match status {
        LifecycleStatus::ServiceDeleted => LifecycleStatus::ResourceDeleted,
        _ => LifecycleStatus::ResourceCreated,
    };
    let service_event = lifecycle(model, service.provider(), Some(service.name()), None, status);

    let mut resources: Vec<&Resource> = service.resources().collect();
    resources.sort_by(|a, b| a.name().cmp(b.name()));
    let resource_events = resources.into_iter().map(|res| {
        let mut event = LifecycleNotification {
            model: model.to_string(),
            provider: service.provider().to_string(),
            service: Some(service.name().to_string()),
            resource: Some(res.name().to_string()),
            status: resource_status,
            initial_value: res.value().map(|tv| tv.value().clone()),
            initial_metadata: None,
        };
        if !res.metadata().is_empty() {
            event.initial_metadata = Some(res.metadata().clone());
        }
        event
    });

    if status == LifecycleStatus::ServiceDeleted {
        for event in resource_events {
            recorder.lifecycle(event)?;
        }
        recorder.lifecycle(service_event)
    } else {
        recorder.lifecycle(service_event)?;
        for event in resource_events {
            recorder.lifecycle(event)?;
        }
        Ok(())
    }
}
