//! Concrete [`IntegrationContext`] backed by the gateway.

use std::sync::Arc;

use twinhub_domain::error::TwinError;
use twinhub_domain::model::ModelDefinition;
use twinhub_domain::resource::{ResourcePath, SetOutcome};

use crate::accumulator::NotificationAccumulator;
use crate::command::Command;
use crate::gateway::Gateway;
use crate::handle::TwinHandle;
use crate::ports::{ActionHandler, IntegrationContext};
use crate::services::push_service::{PushService, ResourceUpdate};

/// [`IntegrationContext`] implementation that turns every call into a
/// gateway command.
///
/// Cheaply cloneable and `Send + Sync`, so integrations can move copies
/// into their background tasks.
#[derive(Debug, Clone)]
pub struct GatewayContext {
    gateway: Gateway,
    push: PushService,
}

impl GatewayContext {
    #[must_use]
    pub fn new(gateway: Gateway) -> Self {
        Self {
            push: PushService::new(gateway.clone()),
            gateway,
        }
    }
}

impl IntegrationContext for GatewayContext {
    async fn register_model(&self, model: ModelDefinition) -> Result<(), TwinError> {
        tracing::debug!(model = %model.name, "registering model");
        self.gateway
            .execute(move |twin, _| twin.register_model(model))
            .await
    }

    async fn push(&self, update: ResourceUpdate) -> Result<SetOutcome, TwinError> {
        self.push.push(update).await
    }

    async fn push_bulk(&self, updates: Vec<ResourceUpdate>) -> Result<Vec<SetOutcome>, TwinError> {
        self.push.push_bulk(updates).await
    }

    async fn register_action(&self, path: ResourcePath, handler: Arc<dyn ActionHandler>) -> Result<(), TwinError> {
        tracing::debug!(action = %path, "binding action handler");
        self.gateway.submit(RegisterAction { path, handler }).await.await
    }
}

/// Binds an action handler; a named command keeps the submitted future `Send`.
struct RegisterAction {
    path: ResourcePath,
    handler: Arc<dyn ActionHandler>,
}

impl Command for RegisterAction {
    type Output = ();

    fn call(self, twin: &TwinHandle, _: &NotificationAccumulator) -> Result<(), TwinError> {
        twin.register_action(&self.path, self.handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use twinhub_domain::model::ResourceDefinition;
    use twinhub_domain::twin::Twin;
    use twinhub_domain::value::Value;

    use crate::gateway::{GatewayConfig, GatewayThread};
    use crate::ports::notification_sink::DiscardSink;

    #[tokio::test]
    async fn should_register_model_then_bind_action() {
        let thread = GatewayThread::start(Twin::default(), DiscardSink, GatewayConfig::default()).unwrap();
        let ctx = GatewayContext::new(thread.gateway());
        let model = ModelDefinition::builder()
            .name("bell")
            .resource("bell", "ring", ResourceDefinition::action())
            .build()
            .unwrap();
        let ring = |_: &TwinHandle, _: &ResourcePath, _: &HashMap<String, Value>| -> Result<Option<Value>, TwinError> {
            Ok(Some(Value::from("ding")))
        };

        ctx.register_model(model).await.unwrap();
        ctx.push(ResourceUpdate::new("door", "admin", "friendlyName").model("bell").value("Door"))
            .await
            .unwrap();
        ctx.register_action(ResourcePath::new("door", "bell", "ring"), Arc::new(ring))
            .await
            .unwrap();
        let result = thread
            .gateway()
            .execute(|twin, _| twin.act(&ResourcePath::new("door", "bell", "ring"), &HashMap::new()))
            .await
            .unwrap();

        assert_eq!(result, Some(Value::from("ding")));
        thread.shutdown().await;
    }

    #[tokio::test]
    async fn should_push_bulk_through_context() {
        let thread = GatewayThread::start(Twin::default(), DiscardSink, GatewayConfig::default()).unwrap();
        let ctx = GatewayContext::new(thread.gateway());

        let outcomes = ctx
            .push_bulk(vec![
                ResourceUpdate::new("p", "s", "a").value(1),
                ResourceUpdate::new("p", "s", "b").value(2),
            ])
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        thread.shutdown().await;
    }
}
