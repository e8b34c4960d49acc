//! Service — a named group of resources under a provider.

use std::collections::HashMap;

use crate::model::ResourceDefinition;
use crate::resource::{Resource, ResourcePath};

/// A named mapping of resource name to [`Resource`].
#[derive(Debug, Clone)]
pub struct Service {
    provider: String,
    name: String,
    resources: HashMap<String, Resource>,
}

impl Service {
    #[must_use]
    pub fn new(provider: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            name: name.into(),
            resources: HashMap::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.get(name)
    }

    pub fn resource_mut(&mut self, name: &str) -> Option<&mut Resource> {
        self.resources.get_mut(name)
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Add a resource if absent. Returns `true` when it was created.
    pub fn add_resource(&mut self, name: &str, definition: ResourceDefinition) -> bool {
        if self.resources.contains_key(name) {
            return false;
        }
        let path = ResourcePath::new(&self.provider, &self.name, name);
        self.resources
            .insert(name.to_string(), Resource::new(path, definition));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_create_resource_only_once() {
        let mut svc = Service::new("lamp", "light");
        assert!(svc.add_resource("level", ResourceDefinition::dynamic()));
        assert!(!svc.add_resource("level", ResourceDefinition::action()));
        assert_eq!(svc.len(), 1);
        assert!(!svc.resource("level").unwrap().is_action());
    }

    #[test]
    fn should_qualify_resource_paths_with_owner_names() {
        let mut svc = Service::new("lamp", "light");
        svc.add_resource("level", ResourceDefinition::dynamic());
        let path = svc.resource("level").unwrap().path();
        assert_eq!(path.to_string(), "lamp/light/level");
    }
}
