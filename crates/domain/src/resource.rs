//! Resource — the leaf of the twin: a timestamped value plus metadata.
//!
//! Every write goes through the timestamped policy in
//! [`supersedes`](crate::time::supersedes): a write that is not strictly
//! newer than what is stored is a silent no-op reported as
//! [`SetOutcome::Stale`].

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::model::{ResourceDefinition, ResourceType, ValueType};
use crate::time::{Timestamp, supersedes};
use crate::value::{TimedValue, Value};

/// Fully qualified `provider/service/resource` name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourcePath {
    pub provider: String,
    pub service: String,
    pub resource: String,
}

impl ResourcePath {
    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        service: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            service: service.into(),
            resource: resource.into(),
        }
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.provider, self.service, self.resource)
    }
}

/// Who is writing a value; decides what [`ValueType`] allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOrigin {
    /// A southbound adapter pushing device data.
    Push,
    /// A northbound session.
    Session,
}

/// Caller-visible result of a timestamped write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetOutcome {
    Applied,
    /// The write was older than (or as old as) the stored state and was ignored.
    Stale,
}

/// What a value write did to the resource.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueChange {
    Applied { old: Option<TimedValue<Value>> },
    Stale,
}

/// What a metadata write did to the resource.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataChange {
    Applied {
        old: HashMap<String, Value>,
        new: HashMap<String, Value>,
    },
    Stale,
}

/// A single resource owned by a [`Service`](crate::service::Service).
#[derive(Debug, Clone)]
pub struct Resource {
    path: ResourcePath,
    definition: ResourceDefinition,
    value: Option<TimedValue<Value>>,
    metadata: HashMap<String, Value>,
    metadata_timestamp: Option<Timestamp>,
}

impl Resource {
    #[must_use]
    pub fn new(path: ResourcePath, definition: ResourceDefinition) -> Self {
        Self {
            path,
            definition,
            value: None,
            metadata: HashMap::new(),
            metadata_timestamp: None,
        }
    }

    #[must_use]
    pub fn path(&self) -> &ResourcePath {
        &self.path
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.path.resource
    }

    #[must_use]
    pub fn definition(&self) -> &ResourceDefinition {
        &self.definition
    }

    #[must_use]
    pub fn is_action(&self) -> bool {
        self.definition.resource_type == ResourceType::Action
    }

    #[must_use]
    pub fn value(&self) -> Option<&TimedValue<Value>> {
        self.value.as_ref()
    }

    #[must_use]
    pub fn metadata(&self) -> &HashMap<String, Value> {
        &self.metadata
    }

    #[must_use]
    pub fn metadata_timestamp(&self) -> Option<Timestamp> {
        self.metadata_timestamp
    }

    /// Apply a timestamped value write.
    ///
    /// A write no newer than the stored value is [`ValueChange::Stale`]
    /// before any validation runs.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the resource is an action, the
    /// value kind is not accepted, a session writes a non-modifiable
    /// resource, or a fixed resource would change.
    pub fn set_value(
        &mut self,
        value: Value,
        timestamp: Timestamp,
        origin: WriteOrigin,
    ) -> Result<ValueChange, ValidationError> {
        let current = self.value.as_ref().map(TimedValue::timestamp);
        if !supersedes(timestamp, current) {
            return Ok(ValueChange::Stale);
        }
        self.check_writable(&value, origin)?;

        if self.definition.value_type == ValueType::Fixed
            && let Some(stored) = &self.value
        {
            if *stored.value() == value {
                return Ok(ValueChange::Stale);
            }
            return Err(ValidationError::FixedValue(self.path.to_string()));
        }

        let old = self.value.replace(TimedValue::new(value, timestamp));
        Ok(ValueChange::Applied { old })
    }

    /// Merge metadata entries, guarded by the metadata timestamp.
    pub fn set_metadata(
        &mut self,
        entries: HashMap<String, Value>,
        timestamp: Timestamp,
    ) -> MetadataChange {
        if entries.is_empty() || !supersedes(timestamp, self.metadata_timestamp) {
            return MetadataChange::Stale;
        }
        let old = self.metadata.clone();
        self.metadata.extend(entries);
        self.metadata_timestamp = Some(timestamp);
        MetadataChange::Applied {
            old,
            new: self.metadata.clone(),
        }
    }

    /// Check that this resource can be invoked.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NotAnAction`] for non-action resources.
    pub fn check_action(&self) -> Result<(), ValidationError> {
        if self.is_action() {
            Ok(())
        } else {
            Err(ValidationError::NotAnAction(self.path.to_string()))
        }
    }

    fn check_writable(&self, value: &Value, origin: WriteOrigin) -> Result<(), ValidationError> {
        if self.is_action() {
            return Err(ValidationError::ActionValue(self.path.to_string()));
        }
        if origin == WriteOrigin::Session && self.definition.value_type != ValueType::Modifiable {
            return Err(ValidationError::NotModifiable(self.path.to_string()));
        }
        if !self.definition.value_kind.accepts(value) {
            return Err(ValidationError::KindMismatch {
                path: self.path.to_string(),
                expected: self.definition.value_kind,
                actual: value.kind(),
            });
        }
        Ok(())
    }
}
