//! Virtual light — on/off state plus brightness.

use std::collections::HashMap;
use std::sync::Arc;

use twinhub_app::handle::TwinHandle;
use twinhub_app::ports::ActionHandler;
use twinhub_app::services::push_service::ResourceUpdate;
use twinhub_domain::error::{TwinError, ValidationError};
use twinhub_domain::model::{ModelDefinition, ResourceDefinition, ResourceType, ValueType};
use twinhub_domain::resource::{ResourcePath, WriteOrigin};
use twinhub_domain::time::now;
use twinhub_domain::value::{Value, ValueKind};

use super::{Power, PowerAction, STATE_RESOURCE};

pub(crate) const PROVIDER: &str = "virtual_light";
const MODEL: &str = "virtual-light";
const SERVICE: &str = "light";
const BRIGHTNESS: &str = "brightness";

/// A dimmable light. `turn_on` accepts an optional `brightness` parameter (0–100).
#[derive(Debug, Clone)]
pub struct VirtualLight {
    friendly_name: String,
}

impl VirtualLight {
    #[must_use]
    pub fn new(friendly_name: impl Into<String>) -> Self {
        Self {
            friendly_name: friendly_name.into(),
        }
    }

    pub(crate) fn model(&self) -> Result<ModelDefinition, TwinError> {
        let mut builder = ModelDefinition::builder()
            .name(MODEL)
            .resource(
                SERVICE,
                STATE_RESOURCE,
                ResourceDefinition::new(ResourceType::StateVariable, ValueType::Updatable, ValueKind::Bool),
            )
            .resource(
                SERVICE,
                BRIGHTNESS,
                ResourceDefinition::new(ResourceType::Property, ValueType::Modifiable, ValueKind::Int),
            );
        for power in Power::ALL {
            builder = builder.resource(SERVICE, power.action_name(), ResourceDefinition::action());
        }
        builder.build()
    }

    pub(crate) fn initial_updates(&self) -> Vec<ResourceUpdate> {
        vec![
            ResourceUpdate::new(PROVIDER, "admin", "friendlyName")
                .model(MODEL)
                .value(self.friendly_name.as_str()),
            ResourceUpdate::new(PROVIDER, SERVICE, STATE_RESOURCE)
                .model(MODEL)
                .value(false),
            ResourceUpdate::new(PROVIDER, SERVICE, BRIGHTNESS)
                .model(MODEL)
                .value(100_i64),
        ]
    }

    pub(crate) fn actions(&self) -> Vec<(ResourcePath, Arc<dyn ActionHandler>)> {
        Power::ALL
            .into_iter()
            .map(|power| {
                let handler: Arc<dyn ActionHandler> = Arc::new(LightPowerAction(PowerAction::new(power)));
                (ResourcePath::new(PROVIDER, SERVICE, power.action_name()), handler)
            })
            .collect()
    }
}

/// Power action that also honours a `brightness` parameter.
struct LightPowerAction(PowerAction);

impl ActionHandler for LightPowerAction {
    fn invoke(
        &self,
        twin: &TwinHandle,
        path: &ResourcePath,
        params: &HashMap<String, Value>,
    ) -> Result<Option<Value>, TwinError> {
        let brightness = params
            .get(BRIGHTNESS)
            .map(|v| {
                v.as_i64().ok_or_else(|| ValidationError::KindMismatch {
                    path: path.to_string(),
                    expected: ValueKind::Int,
                    actual: v.kind(),
                })
            })
            .transpose()?;
        let result = self.0.invoke(twin, path, params)?;
        if let Some(level) = brightness {
            let target = ResourcePath::new(&path.provider, &path.service, BRIGHTNESS);
            twin.set_value(&target, Value::Int(level.clamp(0, 100)), now(), WriteOrigin::Push)?;
        }
        Ok(result)
    }
}
