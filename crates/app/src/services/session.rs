//! Session — the northbound facade used by consumers of the twin.
//!
//! Reads run as snapshot commands and return owned copies; writes go
//! through the same timestamped policy as pushes, but as
//! [`WriteOrigin::Session`], so only modifiable resources accept them.

use std::collections::HashMap;
use std::sync::Arc;

use twinhub_domain::error::TwinError;
use twinhub_domain::id::SessionId;
use twinhub_domain::resource::{ResourcePath, SetOutcome, WriteOrigin};
use twinhub_domain::snapshot::{ProviderSnapshot, ResourceSnapshot, SnapshotFilter};
use twinhub_domain::time::{Timestamp, now};
use twinhub_domain::topic::TopicPattern;
use twinhub_domain::value::{TimedValue, Value};

use crate::event_bus::{InProcessEventBus, Subscription};
use crate::gateway::Gateway;

/// A consumer's view of the twin.
#[derive(Clone)]
pub struct Session {
    id: SessionId,
    gateway: Gateway,
    bus: Arc<InProcessEventBus>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("id", &self.id).finish_non_exhaustive()
    }
}

impl Session {
    #[must_use]
    pub fn new(gateway: Gateway, bus: Arc<InProcessEventBus>) -> Self {
        let id = SessionId::new();
        tracing::debug!(session = %id, "session opened");
        Self { id, gateway, bus }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Current value of a resource; `None` if it never received one.
    ///
    /// # Errors
    ///
    /// [`TwinError::NotFound`] if the resource does not exist.
    pub async fn get(&self, provider: &str, service: &str, resource: &str) -> Result<Option<TimedValue<Value>>, TwinError> {
        let path = ResourcePath::new(provider, service, resource);
        self.gateway.execute(move |twin, _| twin.value(&path)).await
    }

    /// Write a value, timestamped now unless `timestamp` is given.
    ///
    /// # Errors
    ///
    /// [`TwinError::NotFound`] if the resource does not exist, or a
    /// validation error when it is not modifiable by sessions.
    pub async fn set(
        &self,
        provider: &str,
        service: &str,
        resource: &str,
        value: impl Into<Value>,
        timestamp: Option<Timestamp>,
    ) -> Result<SetOutcome, TwinError> {
        let path = ResourcePath::new(provider, service, resource);
        let value = value.into();
        let timestamp = timestamp.unwrap_or_else(now);
        tracing::debug!(session = %self.id, resource = %path, "session write");
        self.gateway
            .execute(move |twin, _| twin.set_value(&path, value, timestamp, WriteOrigin::Session))
            .await
    }

    /// Merge metadata entries into a resource.
    ///
    /// # Errors
    ///
    /// [`TwinError::NotFound`] if the resource does not exist.
    pub async fn set_metadata(
        &self,
        provider: &str,
        service: &str,
        resource: &str,
        entries: HashMap<String, Value>,
        timestamp: Option<Timestamp>,
    ) -> Result<SetOutcome, TwinError> {
        let path = ResourcePath::new(provider, service, resource);
        let timestamp = timestamp.unwrap_or_else(now);
        self.gateway
            .execute(move |twin, _| twin.set_metadata(&path, entries, timestamp))
            .await
    }

    /// Invoke an action resource.
    ///
    /// # Errors
    ///
    /// [`TwinError::NotFound`], a validation error when the resource is not
    /// an action or has no handler, or the handler's own error.
    pub async fn act(
        &self,
        provider: &str,
        service: &str,
        resource: &str,
        params: HashMap<String, Value>,
    ) -> Result<Option<Value>, TwinError> {
        let path = ResourcePath::new(provider, service, resource);
        tracing::debug!(session = %self.id, action = %path, "session action");
        self.gateway.execute(move |twin, _| twin.act(&path, &params)).await
    }

    /// # Errors
    ///
    /// [`TwinError::NotFound`] if the provider does not exist.
    pub async fn describe_provider(&self, provider: &str) -> Result<ProviderSnapshot, TwinError> {
        let name = provider.to_string();
        self.gateway
            .execute(move |twin, _| twin.snapshot_provider(&name))
            .await
    }

    /// # Errors
    ///
    /// [`TwinError::NotFound`] if the resource does not exist.
    pub async fn describe_resource(&self, provider: &str, service: &str, resource: &str) -> Result<ResourceSnapshot, TwinError> {
        let path = ResourcePath::new(provider, service, resource);
        self.gateway
            .execute(move |twin, _| twin.snapshot_resource(&path))
            .await
    }

    /// Provider names in lexical order.
    ///
    /// # Errors
    ///
    /// Gateway shutdown errors only.
    pub async fn list_providers(&self) -> Result<Vec<String>, TwinError> {
        self.gateway.execute(|twin, _| twin.provider_names()).await
    }

    /// Snapshots of the providers selected by `filter`.
    ///
    /// # Errors
    ///
    /// Gateway shutdown errors only.
    pub async fn filtered_snapshot(&self, filter: SnapshotFilter) -> Result<Vec<ProviderSnapshot>, TwinError> {
        self.gateway
            .execute(move |twin, _| twin.filtered_snapshot(&filter))
            .await
    }

    /// # Errors
    ///
    /// [`TwinError::NotFound`] if the provider does not exist.
    pub async fn delete_provider(&self, provider: &str) -> Result<(), TwinError> {
        let name = provider.to_string();
        tracing::info!(session = %self.id, provider = %name, "deleting provider");
        self.gateway
            .execute(move |twin, _| twin.delete_provider(&name))
            .await
    }

    /// Subscribe to notifications matching `pattern` (`+` and trailing `#` wildcards).
    ///
    /// # Errors
    ///
    /// A validation error for malformed patterns.
    pub fn subscribe(&self, pattern: &str) -> Result<Subscription, TwinError> {
        let pattern = TopicPattern::parse(pattern)?;
        Ok(self.bus.subscribe(pattern))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twinhub_domain::error::{NotFoundError, ValidationError};
    use twinhub_domain::model::{ModelDefinition, ModelRegistry, ResourceDefinition, ResourceType, ValueType};
    use twinhub_domain::notification::{LifecycleStatus, Notification};
    use twinhub_domain::twin::Twin;
    use twinhub_domain::value::ValueKind;

    use crate::gateway::{GatewayConfig, GatewayThread};
    use crate::handle::TwinHandle;
    use crate::services::push_service::{PushService, ResourceUpdate};

    fn thermostat() -> ModelDefinition {
        ModelDefinition::builder()
            .name("thermostat")
            .resource(
                "climate",
                "temperature",
                ResourceDefinition::new(ResourceType::Sensor, ValueType::Updatable, ValueKind::Float),
            )
            .resource(
                "climate",
                "target",
                ResourceDefinition::new(ResourceType::Property, ValueType::Modifiable, ValueKind::Float),
            )
            .resource("climate", "boost", ResourceDefinition::action())
            .build()
            .unwrap()
    }

    fn start() -> (GatewayThread, Session, PushService) {
        let bus = Arc::new(InProcessEventBus::new(64));
        let twin = Twin::new(ModelRegistry::new().with(thermostat()));
        let thread = GatewayThread::start(twin, Arc::clone(&bus), GatewayConfig::default()).unwrap();
        let session = Session::new(thread.gateway(), bus);
        let push = PushService::new(thread.gateway());
        (thread, session, push)
    }

    #[tokio::test]
    async fn should_read_back_pushed_value() {
        let (thread, session, push) = start();
        push.push(ResourceUpdate::new("t1", "climate", "temperature").model("thermostat").value(19.5))
            .await
            .unwrap();

        let value = session.get("t1", "climate", "temperature").await.unwrap().unwrap();

        assert_eq!(value.value(), &Value::Float(19.5));
        thread.shutdown().await;
    }

    #[tokio::test]
    async fn should_report_missing_resource() {
        let (thread, session, _push) = start();
        let result = session.get("nobody", "s", "r").await;
        assert!(matches!(
            result,
            Err(TwinError::NotFound(NotFoundError { kind: "provider", .. }))
        ));
        thread.shutdown().await;
    }

    #[tokio::test]
    async fn should_only_write_modifiable_resources() {
        let (thread, session, push) = start();
        push.push(ResourceUpdate::new("t1", "climate", "temperature").model("thermostat").value(19.5))
            .await
            .unwrap();

        let sensor = session.set("t1", "climate", "temperature", 25.0, None).await;
        let target = session.set("t1", "climate", "target", 21.0, None).await;

        assert!(matches!(
            sensor,
            Err(TwinError::Validation(ValidationError::NotModifiable(_)))
        ));
        assert_eq!(target.unwrap(), SetOutcome::Applied);
        thread.shutdown().await;
    }

    #[tokio::test]
    async fn should_invoke_action_handler_through_session() {
        let (thread, session, push) = start();
        push.push(ResourceUpdate::new("t1", "climate", "temperature").model("thermostat"))
            .await
            .unwrap();
        let boost = |twin: &TwinHandle,
                     path: &ResourcePath,
                     params: &HashMap<String, Value>|
         -> Result<Option<Value>, TwinError> {
            let degrees = params.get("degrees").and_then(Value::as_f64).unwrap_or(1.0);
            let target = ResourcePath::new(&path.provider, "climate", "target");
            twin.set_value(&target, Value::Float(20.0 + degrees), now(), WriteOrigin::Push)?;
            Ok(Some(Value::Float(20.0 + degrees)))
        };
        thread
            .gateway()
            .execute(move |twin, _| twin.register_action(&ResourcePath::new("t1", "climate", "boost"), Arc::new(boost)))
            .await
            .unwrap();
        let mut actions = session.subscribe("ACTION/+/+/+").unwrap();

        let result = session
            .act("t1", "climate", "boost", HashMap::from([("degrees".to_string(), Value::Float(2.0))]))
            .await
            .unwrap();

        assert_eq!(result, Some(Value::Float(22.0)));
        assert_eq!(actions.recv().await.unwrap().topic(), "ACTION/t1/climate/boost");
        let target = session.get("t1", "climate", "target").await.unwrap().unwrap();
        assert_eq!(target.value(), &Value::Float(22.0));
        thread.shutdown().await;
    }

    #[tokio::test]
    async fn should_describe_provider_and_resource() {
        let (thread, session, push) = start();
        push.push(ResourceUpdate::new("t1", "climate", "temperature").model("thermostat").value(18.0))
            .await
            .unwrap();

        let provider = session.describe_provider("t1").await.unwrap();
        let resource = session.describe_resource("t1", "climate", "target").await.unwrap();

        assert_eq!(provider.model, "thermostat");
        assert_eq!(provider.services.len(), 2);
        assert_eq!(resource.value_type, ValueType::Modifiable);
        assert!(resource.value.is_none());
        thread.shutdown().await;
    }

    #[tokio::test]
    async fn should_delete_provider_and_notify_subscribers() {
        let (thread, session, push) = start();
        push.push(ResourceUpdate::new("gone", "s", "r").value(1)).await.unwrap();
        let mut lifecycle = session.subscribe("LIFECYCLE/gone").unwrap();

        session.delete_provider("gone").await.unwrap();

        let Some(Notification::Lifecycle(event)) = lifecycle.recv().await else {
            panic!("expected lifecycle notification");
        };
        assert_eq!(event.status, LifecycleStatus::ProviderDeleted);
        assert!(session.list_providers().await.unwrap().is_empty());
        thread.shutdown().await;
    }

    #[tokio::test]
    async fn should_reject_malformed_subscription_pattern() {
        let (thread, session, _push) = start();
        let result = session.subscribe("DATA/#/x");
        assert!(matches!(
            result,
            Err(TwinError::Validation(ValidationError::InvalidTopicPattern(_)))
        ));
        thread.shutdown().await;
    }
}
