//! Notifications — the wire contract toward subscribers.
//!
//! Field names (`provider`, `service`, `resource`, `oldValue`, `newValue`,
//! `timestamp`, …) are serialized as-is by northbound layers and must not
//! change.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TwinError;
use crate::id::BatchId;
use crate::resource::ResourcePath;
use crate::time::Timestamp;
use crate::value::{Value, ValueKind};

/// Lifecycle transitions of twin objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleStatus {
    ProviderCreated,
    ProviderDeleted,
    ServiceCreated,
    ServiceDeleted,
    ResourceCreated,
    ResourceDeleted,
}

/// A provider, service or resource was created or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleNotification {
    pub model: String,
    pub provider: String,
    pub service: Option<String>,
    pub resource: Option<String>,
    pub status: LifecycleStatus,
    pub initial_value: Option<Value>,
    pub initial_metadata: Option<HashMap<String, Value>>,
}

/// A resource value changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataNotification {
    pub model: String,
    pub provider: String,
    pub service: String,
    pub resource: String,
    #[serde(rename = "type")]
    pub kind: ValueKind,
    pub old_value: Option<Value>,
    pub new_value: Value,
    pub timestamp: Timestamp,
}

/// Resource metadata changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataNotification {
    pub model: String,
    pub provider: String,
    pub service: String,
    pub resource: String,
    pub old_values: HashMap<String, Value>,
    pub new_values: HashMap<String, Value>,
    pub timestamp: Timestamp,
}

/// An action resource was invoked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionNotification {
    pub model: String,
    pub provider: String,
    pub service: String,
    pub resource: String,
    pub timestamp: Timestamp,
}

/// Any event recorded while a command runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Notification {
    Lifecycle(LifecycleNotification),
    Data(DataNotification),
    Metadata(MetadataNotification),
    Action(ActionNotification),
}

/// Topic prefix of each notification kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Lifecycle,
    Data,
    Metadata,
    Action,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Lifecycle => "LIFECYCLE",
            Self::Data => "DATA",
            Self::Metadata => "METADATA",
            Self::Action => "ACTION",
        })
    }
}

impl Notification {
    #[must_use]
    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::Lifecycle(_) => NotificationKind::Lifecycle,
            Self::Data(_) => NotificationKind::Data,
            Self::Metadata(_) => NotificationKind::Metadata,
            Self::Action(_) => NotificationKind::Action,
        }
    }

    #[must_use]
    pub fn provider(&self) -> &str {
        match self {
            Self::Lifecycle(n) => &n.provider,
            Self::Data(n) => &n.provider,
            Self::Metadata(n) => &n.provider,
            Self::Action(n) => &n.provider,
        }
    }

    /// Topic of this notification: `KIND/provider[/service[/resource]]`.
    ///
    /// Lifecycle topics stop at the level of the affected object.
    #[must_use]
    pub fn topic(&self) -> String {
        let kind = self.kind();
        match self {
            Self::Lifecycle(n) => {
                let mut topic = format!("{kind}/{}", n.provider);
                for segment in [&n.service, &n.resource].into_iter().flatten() {
                    topic.push('/');
                    topic.push_str(segment);
                }
                topic
            }
            Self::Data(n) => format!("{kind}/{}/{}/{}", n.provider, n.service, n.resource),
            Self::Metadata(n) => format!("{kind}/{}/{}/{}", n.provider, n.service, n.resource),
            Self::Action(n) => format!("{kind}/{}/{}/{}", n.provider, n.service, n.resource),
        }
    }

    /// Shorthand for a data notification.
    #[must_use]
    pub fn data(
        model: &str,
        path: &ResourcePath,
        kind: ValueKind,
        old_value: Option<Value>,
        new_value: Value,
        timestamp: Timestamp,
    ) -> Self {
        Self::Data(DataNotification {
            model: model.to_string(),
            provider: path.provider.clone(),
            service: path.service.clone(),
            resource: path.resource.clone(),
            kind,
            old_value,
            new_value,
            timestamp,
        })
    }

    /// Shorthand for a metadata notification.
    #[must_use]
    pub fn metadata(
        model: &str,
        path: &ResourcePath,
        old_values: HashMap<String, Value>,
        new_values: HashMap<String, Value>,
        timestamp: Timestamp,
    ) -> Self {
        Self::Metadata(MetadataNotification {
            model: model.to_string(),
            provider: path.provider.clone(),
            service: path.service.clone(),
            resource: path.resource.clone(),
            old_values,
            new_values,
            timestamp,
        })
    }

    /// Shorthand for an action notification.
    #[must_use]
    pub fn action(model: &str, path: &ResourcePath, timestamp: Timestamp) -> Self {
        Self::Action(ActionNotification {
            model: model.to_string(),
            provider: path.provider.clone(),
            service: path.service.clone(),
            resource: path.resource.clone(),
            timestamp,
        })
    }
}

/// Sink for notifications produced while the twin is mutated.
///
/// Implemented by the per-command accumulator in the application layer.
/// Implementors provide [`record`](Self::record); the twin records through
/// the typed helpers, one per notification kind.
///
/// Every method fails with an invalid-state error once the recorder is
/// completed.
pub trait NotificationRecorder {
    /// Buffer one notification.
    ///
    /// # Errors
    ///
    /// Fails with an invalid-state error once the recorder is completed.
    fn record(&self, notification: Notification) -> Result<(), TwinError>;

    /// Record a lifecycle transition.
    ///
    /// # Errors
    ///
    /// See [`record`](Self::record).
    fn lifecycle(&self, event: LifecycleNotification) -> Result<(), TwinError> {
        self.record(Notification::Lifecycle(event))
    }

    /// Record a value change.
    ///
    /// # Errors
    ///
    /// See [`record`](Self::record).
    fn resource_value_update(
        &self,
        model: &str,
        path: &ResourcePath,
        kind: ValueKind,
        old_value: Option<Value>,
        new_value: Value,
        timestamp: Timestamp,
    ) -> Result<(), TwinError> {
        self.record(Notification::data(model, path, kind, old_value, new_value, timestamp))
    }

    /// Record a metadata change.
    ///
    /// # Errors
    ///
    /// See [`record`](Self::record).
    fn resource_metadata_update(
        &self,
        model: &str,
        path: &ResourcePath,
        old_values: HashMap<String, Value>,
        new_values: HashMap<String, Value>,
        timestamp: Timestamp,
    ) -> Result<(), TwinError> {
        self.record(Notification::metadata(model, path, old_values, new_values, timestamp))
    }

    /// Record an action invocation.
    ///
    /// # Errors
    ///
    /// See [`record`](Self::record).
    fn action(&self, model: &str, path: &ResourcePath, timestamp: Timestamp) -> Result<(), TwinError> {
        self.record(Notification::action(model, path, timestamp))
    }
}

/// All notifications of one command, delivered as a single unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationBatch {
    pub id: BatchId,
    pub notifications: Vec<Notification>,
}

impl NotificationBatch {
    #[must_use]
    pub fn new(notifications: Vec<Notification>) -> Self {
        Self {
            id: BatchId::new(),
            notifications,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.notifications.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::now;

    fn lifecycle(service: Option<&str>, resource: Option<&str>) -> Notification {
        Notification::Lifecycle(LifecycleNotification {
            model: "m".to_string(),
            provider: "p".to_string(),
            service: service.map(str::to_string),
            resource: resource.map(str::to_string),
            status: LifecycleStatus::ProviderCreated,
            initial_value: None,
            initial_metadata: None,
        })
    }

    #[test]
    fn should_build_data_topic_from_path() {
        let n = Notification::data(
            "m",
            &ResourcePath::new("p", "s", "r"),
            ValueKind::Any,
            None,
            Value::Int(1),
            now(),
        );
        assert_eq!(n.topic(), "DATA/p/s/r");
        assert_eq!(n.provider(), "p");
    }

    #[test]
    fn should_truncate_lifecycle_topic_to_affected_level() {
        assert_eq!(lifecycle(None, None).topic(), "LIFECYCLE/p");
        assert_eq!(lifecycle(Some("s"), None).topic(), "LIFECYCLE/p/s");
        assert_eq!(lifecycle(Some("s"), Some("r")).topic(), "LIFECYCLE/p/s/r");
    }

    #[test]
    fn should_serialize_data_notification_with_wire_field_names() {
        let n = Notification::data(
            "m",
            &ResourcePath::new("p", "s", "r"),
            ValueKind::Int,
            None,
            Value::Int(42),
            now(),
        );
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["kind"], "DATA");
        assert_eq!(json["provider"], "p");
        assert_eq!(json["oldValue"], serde_json::Value::Null);
        assert_eq!(json["newValue"], 42);
        assert_eq!(json["type"], "int");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn should_serialize_metadata_maps_as_old_and_new_values() {
        let n = Notification::metadata(
            "m",
            &ResourcePath::new("p", "s", "r"),
            HashMap::new(),
            HashMap::from([("unit".to_string(), Value::from("C"))]),
            now(),
        );
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["newValues"]["unit"], "C");
        assert!(json["oldValues"].as_object().unwrap().is_empty());
    }

    #[test]
    fn should_roundtrip_action_notification() {
        let n = Notification::action("m", &ResourcePath::new("p", "s", "go"), now());
        let json = serde_json::to_string(&n).unwrap();
        let parsed: Notification = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, n);
        assert_eq!(parsed.kind(), NotificationKind::Action);
    }

    #[test]
    fn should_report_batch_size() {
        let batch = NotificationBatch::new(vec![lifecycle(None, None)]);
        assert_eq!(batch.len(), 1);
        assert!(!batch.is_empty());
    }
}
