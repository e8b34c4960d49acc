//! Push service — southbound ingestion of device data.
//!
//! Adapters describe what they observed as [`ResourceUpdate`] tuples. Each
//! push creates whatever provider, service and resource is missing, then
//! applies the value and metadata through the timestamped write policy.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use twinhub_domain::error::{TwinError, ValidationError};
use twinhub_domain::resource::{ResourcePath, SetOutcome, WriteOrigin};
use twinhub_domain::time::{Timestamp, now};
use twinhub_domain::value::{Value, ValueKind};

use crate::command::{CommandBatch, command};
use crate::gateway::Gateway;
use crate::handle::TwinHandle;

/// One observed resource state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceUpdate {
    pub provider: String,
    /// Model of the provider if it has to be created; defaults to the provider name.
    #[serde(default)]
    pub model: Option<String>,
    pub service: String,
    pub resource: String,
    #[serde(default)]
    pub value: Option<Value>,
    /// Declared kind of `value`; a value of another kind is rejected.
    #[serde(default, rename = "type")]
    pub kind: Option<ValueKind>,
    /// Observation time; defaults to the time the update is applied.
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl ResourceUpdate {
    #[must_use]
    pub fn new(provider: impl Into<String>, service: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: None,
            service: service.into(),
            resource: resource.into(),
            value: None,
            kind: None,
            timestamp: None,
            metadata: HashMap::new(),
        }
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: ValueKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn at(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn path(&self) -> ResourcePath {
        ResourcePath::new(&self.provider, &self.service, &self.resource)
    }

    /// Apply the update inside a command.
    ///
    /// Returns [`SetOutcome::Stale`] only when every write it carried was stale.
    ///
    /// # Errors
    ///
    /// Invalid-state and validation errors from the twin, or
    /// [`ValidationError::KindMismatch`] when `value` contradicts `kind`.
    pub fn apply(self, twin: &TwinHandle) -> Result<SetOutcome, TwinError> {
        let path = self.path();
        if let (Some(kind), Some(value)) = (self.kind, &self.value)
            && !kind.accepts(value)
        {
            return Err(ValidationError::KindMismatch {
                path: path.to_string(),
                expected: kind,
                actual: value.kind(),
            }
            .into());
        }
        let timestamp = self.timestamp.unwrap_or_else(now);
        let resource = twin.ensure_resource(&path, self.model.as_deref())?;

        let mut outcomes = Vec::with_capacity(2);
        if let Some(value) = self.value {
            outcomes.push(resource.set_value(value, timestamp, WriteOrigin::Push)?);
        }
        if !self.metadata.is_empty() {
            outcomes.push(resource.set_metadata(self.metadata, timestamp)?);
        }
        if outcomes.is_empty() || outcomes.contains(&SetOutcome::Applied) {
            Ok(SetOutcome::Applied)
        } else {
            tracing::debug!(resource = %path, "stale push ignored");
            Ok(SetOutcome::Stale)
        }
    }
}

/// Several updates applied as one command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkUpdate {
    pub updates: Vec<ResourceUpdate>,
}

impl From<Vec<ResourceUpdate>> for BulkUpdate {
    fn from(updates: Vec<ResourceUpdate>) -> Self {
        Self { updates }
    }
}

impl BulkUpdate {
    /// One sub-command per update, in order.
    #[must_use]
    pub fn into_batch(self) -> CommandBatch<SetOutcome> {
        let mut batch = CommandBatch::new();
        for update in self.updates {
            batch.push(move |twin, _| update.apply(twin));
        }
        batch
    }
}

/// Entry point for adapters pushing device data.
#[derive(Debug, Clone)]
pub struct PushService {
    gateway: Gateway,
}

impl PushService {
    #[must_use]
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    /// Apply one update.
    ///
    /// # Errors
    ///
    /// See [`ResourceUpdate::apply`], plus gateway shutdown errors.
    pub async fn push(&self, update: ResourceUpdate) -> Result<SetOutcome, TwinError> {
        self.gateway.submit(command(move |twin, _| update.apply(twin))).await.await
    }

    /// Apply several updates as one atomic command, one outcome per update.
    ///
    /// # Errors
    ///
    /// [`TwinError::BatchFailed`] naming the first failing update; the
    /// others are still applied.
    pub async fn push_bulk(&self, bulk: impl Into<BulkUpdate>) -> Result<Vec<SetOutcome>, TwinError> {
        let bulk = bulk.into();
        tracing::debug!(updates = bulk.updates.len(), "bulk push");
        self.gateway.submit(bulk.into_batch()).await.await
    }

    /// Blocking counterpart of [`push`](Self::push) for adapter threads.
    ///
    /// # Errors
    ///
    /// See [`push`](Self::push).
    pub fn push_blocking(&self, update: ResourceUpdate) -> Result<SetOutcome, TwinError> {
        self.gateway
            .submit_blocking(command(move |twin, _| update.apply(twin)))
            .blocking_wait()
    }

    /// Blocking counterpart of [`push_bulk`](Self::push_bulk).
    ///
    /// # Errors
    ///
    /// See [`push_bulk`](Self::push_bulk).
    pub fn push_bulk_blocking(&self, bulk: impl Into<BulkUpdate>) -> Result<Vec<SetOutcome>, TwinError> {
        self.gateway
            .submit_blocking(bulk.into().into_batch())
            .blocking_wait()
    }
}
