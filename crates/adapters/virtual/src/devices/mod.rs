//! Virtual device implementations — light, thermometer, switch.
//!
//! Each device is one provider with a fixed name and its own model, so it
//! stays stable across restarts of the integration.

mod light;
mod sensor;
mod switch;

use std::collections::HashMap;
use std::sync::Arc;

pub use light::VirtualLight;
pub use sensor::{BASE_TEMPERATURE, VirtualSensor};
pub use switch::VirtualSwitch;

use twinhub_app::handle::TwinHandle;
use twinhub_app::ports::ActionHandler;
use twinhub_app::services::push_service::ResourceUpdate;
use twinhub_domain::error::TwinError;
use twinhub_domain::model::ModelDefinition;
use twinhub_domain::resource::{ResourcePath, WriteOrigin};
use twinhub_domain::time::now;
use twinhub_domain::value::Value;

/// Name of the on/off resource of lights and switches.
pub const STATE_RESOURCE: &str = "state";

/// Wrapper enum for the concrete virtual device types.
pub enum VirtualDevice {
    Light(VirtualLight),
    Sensor(VirtualSensor),
    Switch(VirtualSwitch),
}

impl VirtualDevice {
    /// Provider name of the device.
    #[must_use]
    pub fn provider(&self) -> &'static str {
        match self {
            Self::Light(_) => light::PROVIDER,
            Self::Sensor(_) => sensor::PROVIDER,
            Self::Switch(_) => switch::PROVIDER,
        }
    }

    /// The model describing the device's services and resources.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the builder fails.
    pub fn model(&self) -> Result<ModelDefinition, TwinError> {
        match self {
            Self::Light(d) => d.model(),
            Self::Sensor(d) => d.model(),
            Self::Switch(d) => d.model(),
        }
    }

    /// Updates announcing the device and its initial state.
    #[must_use]
    pub fn initial_updates(&self) -> Vec<ResourceUpdate> {
        match self {
            Self::Light(d) => d.initial_updates(),
            Self::Sensor(d) => d.initial_updates(),
            Self::Switch(d) => d.initial_updates(),
        }
    }

    /// Action resources of the device and their handlers.
    #[must_use]
    pub fn actions(&self) -> Vec<(ResourcePath, Arc<dyn ActionHandler>)> {
        match self {
            Self::Light(d) => d.actions(),
            Self::Sensor(_) => Vec::new(),
            Self::Switch(d) => d.actions(),
        }
    }
}

/// The three on/off actions shared by lights and switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Power {
    On,
    Off,
    Toggle,
}

impl Power {
    pub const ALL: [Self; 3] = [Self::On, Self::Off, Self::Toggle];

    /// Resource name of the action.
    #[must_use]
    pub fn action_name(self) -> &'static str {
        match self {
            Self::On => "turn_on",
            Self::Off => "turn_off",
            Self::Toggle => "toggle",
        }
    }

    #[must_use]
    pub fn apply(self, current: bool) -> bool {
        match self {
            Self::On => true,
            Self::Off => false,
            Self::Toggle => !current,
        }
    }
}

/// Flips the sibling [`STATE_RESOURCE`] of the invoked action.
#[derive(Debug, Clone, Copy)]
pub struct PowerAction {
    power: Power,
}

impl PowerAction {
    #[must_use]
    pub fn new(power: Power) -> Self {
        Self { power }
    }
}

impl ActionHandler for PowerAction {
    fn invoke(
        &self,
        twin: &TwinHandle,
        path: &ResourcePath,
        _params: &HashMap<String, Value>,
    ) -> Result<Option<Value>, TwinError> {
        let state = ResourcePath::new(&path.provider, &path.service, STATE_RESOURCE);
        let current = twin
            .value(&state)?
            .and_then(|tv| tv.value().as_bool())
            .unwrap_or(false);
        let next = self.power.apply(current);
        twin.set_value(&state, Value::Bool(next), now(), WriteOrigin::Push)?;
        tracing::debug!(provider = %path.provider, action = self.power.action_name(), on = next, "virtual power action");
        Ok(Some(Value::Bool(next)))
    }
}

/// Handlers for every [`Power`] action of `service` on `provider`.
fn power_actions(provider: &str, service: &str) -> Vec<(ResourcePath, Arc<dyn ActionHandler>)> {
    Power::ALL
        .into_iter()
        .map(|power| {
            let handler: Arc<dyn ActionHandler> = Arc::new(PowerAction::new(power));
            (ResourcePath::new(provider, service, power.action_name()), handler)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_toggle_current_state() {
        assert!(Power::Toggle.apply(false));
        assert!(!Power::Toggle.apply(true));
        assert!(Power::On.apply(true));
        assert!(!Power::Off.apply(true));
    }

    #[test]
    fn should_bind_one_handler_per_power_action() {
        let actions = power_actions("lamp", "light");
        let names: Vec<&str> = actions.iter().map(|(p, _)| p.resource.as_str()).collect();
        assert_eq!(names, vec!["turn_on", "turn_off", "toggle"]);
    }
}
