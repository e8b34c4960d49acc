//! Virtual switch — on/off only.

use std::sync::Arc;

use twinhub_app::ports::ActionHandler;
use twinhub_app::services::push_service::ResourceUpdate;
use twinhub_domain::error::TwinError;
use twinhub_domain::model::{ModelDefinition, ResourceDefinition, ResourceType, ValueType};
use twinhub_domain::resource::ResourcePath;
use twinhub_domain::value::ValueKind;

use super::{Power, STATE_RESOURCE, power_actions};

pub(crate) const PROVIDER: &str = "virtual_switch";
const MODEL: &str = "virtual-switch";
const SERVICE: &str = "switch";

#[derive(Debug, Clone)]
pub struct VirtualSwitch {
    friendly_name: String,
}

impl VirtualSwitch {
    #[must_use]
    pub fn new(friendly_name: impl Into<String>) -> Self {
        Self {
            friendly_name: friendly_name.into(),
        }
    }

    pub(crate) fn model(&self) -> Result<ModelDefinition, TwinError> {
        let mut builder = ModelDefinition::builder().name(MODEL).resource(
            SERVICE,
            STATE_RESOURCE,
            ResourceDefinition::new(ResourceType::StateVariable, ValueType::Updatable, ValueKind::Bool),
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
        ]
    }

    pub(crate) fn actions(&self) -> Vec<(ResourcePath, Arc<dyn ActionHandler>)> {
        power_actions(PROVIDER, SERVICE)
    }
}
