//! Model registry — resource typing resolved when a provider is created.
//!
//! A model names the services and resources a provider exposes. Registered
//! models are instantiated eagerly and reject undeclared resources. Any
//! model name that is not registered is *dynamic*: its services and
//! resources appear on first write with [`ResourceDefinition::dynamic`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{TwinError, ValidationError};
use crate::value::ValueKind;

/// Name of the implicit service every provider carries.
pub const ADMIN_SERVICE: &str = "admin";

/// Resources of the [`ADMIN_SERVICE`].
pub const ADMIN_RESOURCES: [&str; 5] = ["friendlyName", "location", "icon", "modelUri", "description"];

/// Admin resource holding the provider location, read by location filters.
pub const LOCATION_RESOURCE: &str = "location";

/// Admin resource holding the model identifier.
pub const MODEL_URI_RESOURCE: &str = "modelUri";

/// What a resource represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    #[default]
    Sensor,
    Action,
    Property,
    StateVariable,
}

/// Who may write a resource value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    /// Written once, then frozen.
    Fixed,
    /// Written by southbound pushes only.
    Updatable,
    /// Written by pushes and by sessions.
    #[default]
    Modifiable,
}

/// Typing of a single resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDefinition {
    pub resource_type: ResourceType,
    pub value_type: ValueType,
    pub value_kind: ValueKind,
}

impl ResourceDefinition {
    #[must_use]
    pub fn new(resource_type: ResourceType, value_type: ValueType, value_kind: ValueKind) -> Self {
        Self {
            resource_type,
            value_type,
            value_kind,
        }
    }

    /// Definition used for resources of unregistered models.
    #[must_use]
    pub fn dynamic() -> Self {
        Self::new(ResourceType::Sensor, ValueType::Modifiable, ValueKind::Any)
    }

    /// An invocable action resource.
    #[must_use]
    pub fn action() -> Self {
        Self::new(ResourceType::Action, ValueType::Fixed, ValueKind::Any)
    }

    /// Definition of the admin resources.
    #[must_use]
    pub fn admin() -> Self {
        Self::new(ResourceType::Property, ValueType::Modifiable, ValueKind::Any)
    }
}

/// Resources declared by one service of a model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub resources: HashMap<String, ResourceDefinition>,
}

/// Services declared by a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDefinition {
    pub name: String,
    pub services: HashMap<String, ServiceDefinition>,
}

impl ModelDefinition {
    /// Create a builder for constructing a [`ModelDefinition`].
    #[must_use]
    pub fn builder() -> ModelDefinitionBuilder {
        ModelDefinitionBuilder::default()
    }

    /// Look up a declared resource.
    #[must_use]
    pub fn resource(&self, service: &str, resource: &str) -> Option<&ResourceDefinition> {
        self.services.get(service)?.resources.get(resource)
    }
}

/// Step-by-step builder for [`ModelDefinition`].
#[derive(Debug, Default)]
pub struct ModelDefinitionBuilder {
    name: Option<String>,
    services: HashMap<String, ServiceDefinition>,
}

impl ModelDefinitionBuilder {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn resource(
        mut self,
        service: impl Into<String>,
        resource: impl Into<String>,
        definition: ResourceDefinition,
    ) -> Self {
        self.services
            .entry(service.into())
            .or_default()
            .resources
            .insert(resource.into(), definition);
        self
    }

    /// Consume the builder, validate, and return a [`ModelDefinition`].
    ///
    /// # Errors
    ///
    /// Returns [`TwinError::Validation`] if the name is missing or any name
    /// is empty or contains `/`.
    pub fn build(self) -> Result<ModelDefinition, TwinError> {
        let name = self.name.unwrap_or_default();
        validate_name(&name)?;
        for (service, def) in &self.services {
            validate_name(service)?;
            for resource in def.resources.keys() {
                validate_name(resource)?;
            }
        }
        Ok(ModelDefinition {
            name,
            services: self.services,
        })
    }
}

/// Check that a provider, service, resource or model name is usable in topics.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyName`] or [`ValidationError::InvalidName`].
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if name.contains('/') {
        return Err(ValidationError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Registry of known models, injected into the twin at construction.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, ModelDefinition>,
}

impl ModelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a model definition.
    pub fn register(&mut self, model: ModelDefinition) {
        self.models.insert(model.name.clone(), model);
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, model: ModelDefinition) -> Self {
        self.register(model);
        self
    }

    #[must_use]
    pub fn get(&self, model: &str) -> Option<&ModelDefinition> {
        self.models.get(model)
    }

    /// Resolve the definition of a resource under `model`.
    ///
    /// Admin resources always resolve. Unregistered models resolve every
    /// resource to [`ResourceDefinition::dynamic`].
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UndeclaredResource`] when `model` is
    /// registered but does not declare the resource.
    pub fn resolve(
        &self,
        model: &str,
        service: &str,
        resource: &str,
    ) -> Result<ResourceDefinition, ValidationError> {
        if service == ADMIN_SERVICE && ADMIN_RESOURCES.contains(&resource) {
            return Ok(ResourceDefinition::admin());
        }
        match self.models.get(model) {
            None => Ok(ResourceDefinition::dynamic()),
            Some(def) => {
                def.resource(service, resource)
                    .copied()
                    .ok_or_else(|| ValidationError::UndeclaredResource {
                        model: model.to_string(),
                        path: format!("{service}/{resource}"),
                    })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thermometer() -> ModelDefinition {
        ModelDefinition::builder()
            .name("thermometer")
            .resource(
                "sensor",
                "temperature",
                ResourceDefinition::new(ResourceType::Sensor, ValueType::Updatable, ValueKind::Float),
            )
            .resource("control", "reset", ResourceDefinition::action())
            .build()
            .unwrap()
    }

    #[test]
    fn should_build_model_with_declared_resources() {
        let model = thermometer();
        assert_eq!(model.services.len(), 2);
        let def = model.resource("sensor", "temperature").unwrap();
        assert_eq!(def.value_kind, ValueKind::Float);
    }

    #[test]
    fn should_reject_model_without_name() {
        let result = ModelDefinition::builder().build();
        assert!(matches!(
            result,
            Err(TwinError::Validation(ValidationError::EmptyName))
        ));
    }

    #[test]
    fn should_reject_names_containing_slash() {
        let result = ModelDefinition::builder()
            .name("m")
            .resource("a/b", "c", ResourceDefinition::dynamic())
            .build();
        assert!(matches!(
            result,
            Err(TwinError::Validation(ValidationError::InvalidName(_)))
        ));
    }

    #[test]
    fn should_resolve_dynamic_definition_for_unregistered_model() {
        let registry = ModelRegistry::new();
        let def = registry.resolve("anything", "svc", "res").unwrap();
        assert_eq!(def, ResourceDefinition::dynamic());
    }

    #[test]
    fn should_reject_undeclared_resource_of_registered_model() {
        let registry = ModelRegistry::new().with(thermometer());
        let result = registry.resolve("thermometer", "sensor", "humidity");
        assert!(matches!(
            result,
            Err(ValidationError::UndeclaredResource { .. })
        ));
    }

    #[test]
    fn should_always_resolve_admin_resources() {
        let registry = ModelRegistry::new().with(thermometer());
        let def = registry
            .resolve("thermometer", ADMIN_SERVICE, LOCATION_RESOURCE)
            .unwrap();
        assert_eq!(def.resource_type, ResourceType::Property);
    }

    #[test]
    fn should_serialize_resource_type_in_screaming_case() {
        let json = serde_json::to_string(&ResourceType::StateVariable).unwrap();
        assert_eq!(json, "\"STATE_VARIABLE\"");
    }
}
