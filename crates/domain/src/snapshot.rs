//! Snapshots — immutable point-in-time copies of twin state.
//!
//! Unlike scoped handles, snapshots own their data and stay valid after
//! the command that produced them.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{ADMIN_SERVICE, LOCATION_RESOURCE, ResourceType, ValueType};
use crate::provider::Provider;
use crate::resource::{Resource, ResourcePath};
use crate::service::Service;
use crate::time::Timestamp;
use crate::value::{TimedValue, Value, ValueKind};

/// Copy of one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSnapshot {
    pub path: ResourcePath,
    pub resource_type: ResourceType,
    pub value_type: ValueType,
    pub value_kind: ValueKind,
    pub value: Option<TimedValue<Value>>,
    pub metadata: HashMap<String, Value>,
    pub metadata_timestamp: Option<Timestamp>,
}

impl ResourceSnapshot {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.path.resource
    }
}

impl From<&Resource> for ResourceSnapshot {
    fn from(resource: &Resource) -> Self {
        let def = resource.definition();
        Self {
            path: resource.path().clone(),
            resource_type: def.resource_type,
            value_type: def.value_type,
            value_kind: def.value_kind,
            value: resource.value().cloned(),
            metadata: resource.metadata().clone(),
            metadata_timestamp: resource.metadata_timestamp(),
        }
    }
}

/// Copy of one service; resources are sorted by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSnapshot {
    pub provider: String,
    pub name: String,
    pub resources: Vec<ResourceSnapshot>,
}

impl ServiceSnapshot {
    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&ResourceSnapshot> {
        self.resources.iter().find(|r| r.name() == name)
    }
}

impl From<&Service> for ServiceSnapshot {
    fn from(service: &Service) -> Self {
        let mut resources: Vec<ResourceSnapshot> =
            service.resources().map(ResourceSnapshot::from).collect();
        resources.sort_by(|a, b| a.name().cmp(b.name()));
        Self {
            provider: service.provider().to_string(),
            name: service.name().to_string(),
            resources,
        }
    }
}

/// Copy of one provider; services are sorted by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSnapshot {
    pub name: String,
    pub model: String,
    pub snapshot_time: Timestamp,
    pub services: Vec<ServiceSnapshot>,
}

impl ProviderSnapshot {
    /// Copy a provider as of `snapshot_time`.
    #[must_use]
    pub fn capture(provider: &Provider, snapshot_time: Timestamp) -> Self {
        let mut services: Vec<ServiceSnapshot> =
            provider.services().map(ServiceSnapshot::from).collect();
        services.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            name: provider.name().to_string(),
            model: provider.model().to_string(),
            snapshot_time,
            services,
        }
    }

    #[must_use]
    pub fn service(&self, name: &str) -> Option<&ServiceSnapshot> {
        self.services.iter().find(|s| s.name == name)
    }

    #[must_use]
    pub fn resource(&self, service: &str, resource: &str) -> Option<&ResourceSnapshot> {
        self.service(service)?.resource(resource)
    }

    /// Value of the admin `location` resource.
    #[must_use]
    pub fn location(&self) -> Option<&Value> {
        self.resource(ADMIN_SERVICE, LOCATION_RESOURCE)?
            .value
            .as_ref()
            .map(TimedValue::value)
    }
}

type ProviderPredicate = Box<dyn Fn(&ProviderSnapshot) -> bool + Send + Sync>;
type LocationPredicate = Box<dyn Fn(Option<&Value>) -> bool + Send + Sync>;
type ServicePredicate = Box<dyn Fn(&ServiceSnapshot) -> bool + Send + Sync>;
type ResourcePredicate = Box<dyn Fn(&ResourceSnapshot) -> bool + Send + Sync>;

/// Independently optional predicates selecting providers for a snapshot.
///
/// A provider is selected when it passes the provider and location
/// predicates and, if a service or resource predicate is set, owns at
/// least one matching resource inside a matching service. Selected
/// providers are returned whole unless [`prune`](Self::prune) is set.
#[derive(Default)]
pub struct SnapshotFilter {
    provider: Option<ProviderPredicate>,
    location: Option<LocationPredicate>,
    service: Option<ServicePredicate>,
    resource: Option<ResourcePredicate>,
    prune: bool,
}

impl fmt::Debug for SnapshotFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotFilter")
            .field("provider", &self.provider.is_some())
            .field("location", &self.location.is_some())
            .field("service", &self.service.is_some())
            .field("resource", &self.resource.is_some())
            .field("prune", &self.prune)
            .finish()
    }
}

impl SnapshotFilter {
    /// A filter selecting every provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn provider(mut self, pred: impl Fn(&ProviderSnapshot) -> bool + Send + Sync + 'static) -> Self {
        self.provider = Some(Box::new(pred));
        self
    }

    #[must_use]
    pub fn location(mut self, pred: impl Fn(Option<&Value>) -> bool + Send + Sync + 'static) -> Self {
        self.location = Some(Box::new(pred));
        self
    }

    #[must_use]
    pub fn service(mut self, pred: impl Fn(&ServiceSnapshot) -> bool + Send + Sync + 'static) -> Self {
        self.service = Some(Box::new(pred));
        self
    }

    #[must_use]
    pub fn resource(mut self, pred: impl Fn(&ResourceSnapshot) -> bool + Send + Sync + 'static) -> Self {
        self.resource = Some(Box::new(pred));
        self
    }

    /// Drop non-matching services and resources from selected providers.
    #[must_use]
    pub fn prune(mut self) -> Self {
        self.prune = true;
        self
    }

    /// Shorthand: providers of the given model.
    #[must_use]
    pub fn model(self, model: impl Into<String>) -> Self {
        let model = model.into();
        self.provider(move |p| p.model == model)
    }

    /// Apply the filter to one captured provider.
    #[must_use]
    pub fn apply(&self, mut snapshot: ProviderSnapshot) -> Option<ProviderSnapshot> {
        if self.provider.as_ref().is_some_and(|pred| !pred(&snapshot)) {
            return None;
        }
        if self.location.as_ref().is_some_and(|pred| !pred(snapshot.location())) {
            return None;
        }
        if self.service.is_none() && self.resource.is_none() {
            return Some(snapshot);
        }

        let service_ok = |s: &ServiceSnapshot| self.service.as_ref().is_none_or(|pred| pred(s));
        let resource_ok = |r: &ResourceSnapshot| self.resource.as_ref().is_none_or(|pred| pred(r));

        let selected = snapshot
            .services
            .iter()
            .any(|s| service_ok(s) && s.resources.iter().any(resource_ok));
        if !selected {
            return None;
        }
        if self.prune {
            snapshot.services.retain(|s| service_ok(s));
            for service in &mut snapshot.services {
                service.resources.retain(|r| resource_ok(r));
            }
            snapshot.services.retain(|s| !s.resources.is_empty());
        }
        Some(snapshot)
    }
}
