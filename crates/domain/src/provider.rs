//! Provider — a device or logical thing exposed by the twin.
//!
//! Every provider carries the implicit [`ADMIN_SERVICE`] holding its
//! friendly name, location, icon, model URI and description.

use std::collections::HashMap;

use crate::model::{ADMIN_RESOURCES, ADMIN_SERVICE, LOCATION_RESOURCE, ResourceDefinition};
use crate::service::Service;
use crate::value::Value;

/// A provider and the services it owns.
#[derive(Debug, Clone)]
pub struct Provider {
    name: String,
    model: String,
    modelled: bool,
    services: HashMap<String, Service>,
}

impl Provider {
    /// Create a provider with its admin service already populated.
    #[must_use]
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        let name = name.into();
        let mut admin = Service::new(&name, ADMIN_SERVICE);
        for resource in ADMIN_RESOURCES {
            admin.add_resource(resource, ResourceDefinition::admin());
        }
        Self {
            services: HashMap::from([(ADMIN_SERVICE.to_string(), admin)]),
            name,
            model: model.into(),
            modelled: false,
        }
    }

    /// Whether the provider was instantiated from a registered model.
    ///
    /// Providers created while their model was unregistered stay dynamic,
    /// even if that model is registered later.
    #[must_use]
    pub fn is_modelled(&self) -> bool {
        self.modelled
    }

    pub fn mark_modelled(&mut self) {
        self.modelled = true;
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }

    pub fn service_mut(&mut self, name: &str) -> Option<&mut Service> {
        self.services.get_mut(name)
    }

    pub fn services(&self) -> impl Iterator<Item = &Service> {
        self.services.values()
    }

    /// Service names in lexical order.
    #[must_use]
    pub fn service_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Add an empty service if absent. Returns `true` when it was created.
    pub fn add_service(&mut self, name: &str) -> bool {
        if self.services.contains_key(name) {
            return false;
        }
        self.services
            .insert(name.to_string(), Service::new(&self.name, name));
        true
    }

    /// Detach a service and everything it owns.
    pub fn remove_service(&mut self, name: &str) -> Option<Service> {
        self.services.remove(name)
    }

    /// Current value of the admin `location` resource.
    #[must_use]
    pub fn location(&self) -> Option<&Value> {
        self.service(ADMIN_SERVICE)?
            .resource(LOCATION_RESOURCE)?
            .value()
            .map(|tv| tv.value())
    }
}
