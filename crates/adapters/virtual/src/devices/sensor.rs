//! Virtual thermometer — a slowly drifting temperature reading.

use twinhub_app::services::push_service::ResourceUpdate;
use twinhub_domain::error::TwinError;
use twinhub_domain::model::{ModelDefinition, ResourceDefinition, ResourceType, ValueType};
use twinhub_domain::value::ValueKind;

pub(crate) const PROVIDER: &str = "virtual_thermometer";
const MODEL: &str = "virtual-thermometer";
const SERVICE: &str = "sensor";
const TEMPERATURE: &str = "temperature";

/// Reading at tick 0.
pub const BASE_TEMPERATURE: f64 = 21.5;

#[derive(Debug, Clone)]
pub struct VirtualSensor {
    friendly_name: String,
}

impl VirtualSensor {
    #[must_use]
    pub fn new(friendly_name: impl Into<String>) -> Self {
        Self {
            friendly_name: friendly_name.into(),
        }
    }

    /// Temperature at `tick`: a triangle wave rising at most 0.5 °C above
    /// [`BASE_TEMPERATURE`] and back, over 20 ticks.
    #[must_use]
    pub fn reading(tick: u32) -> f64 {
        let phase = f64::from(tick % 20);
        let offset = if phase < 10.0 { phase } else { 20.0 - phase };
        BASE_TEMPERATURE + offset / 20.0
    }

    /// Update carrying the reading for `tick`.
    #[must_use]
    pub fn reading_update(tick: u32) -> ResourceUpdate {
        ResourceUpdate::new(PROVIDER, SERVICE, TEMPERATURE)
            .model(MODEL)
            .value(Self::reading(tick))
            .kind(ValueKind::Float)
    }

    pub(crate) fn model(&self) -> Result<ModelDefinition, TwinError> {
        ModelDefinition::builder()
            .name(MODEL)
            .resource(
                SERVICE,
                TEMPERATURE,
                ResourceDefinition::new(ResourceType::Sensor, ValueType::Updatable, ValueKind::Float),
            )
            .build()
    }

    pub(crate) fn initial_updates(&self) -> Vec<ResourceUpdate> {
        vec![
            ResourceUpdate::new(PROVIDER, "admin", "friendlyName")
                .model(MODEL)
                .value(self.friendly_name.as_str()),
            Self::reading_update(0).metadata("unit", "°C"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_start_at_base_temperature() {
        assert!((VirtualSensor::reading(0) - BASE_TEMPERATURE).abs() < f64::EPSILON);
    }

    #[test]
    fn should_stay_within_half_a_degree() {
        for tick in 0..100 {
            let delta = VirtualSensor::reading(tick) - BASE_TEMPERATURE;
            assert!((0.0..=0.5).contains(&delta), "tick {tick}: {delta}");
        }
    }

    #[test]
    fn should_declare_float_temperature_with_unit() {
        let sensor = VirtualSensor::new("Thermo");
        let model = sensor.model().unwrap();
        assert_eq!(model.resource(SERVICE, TEMPERATURE).unwrap().value_kind, ValueKind::Float);
        let reading = &sensor.initial_updates()[1];
        assert_eq!(reading.metadata.get("unit").and_then(|v| v.as_str()), Some("°C"));
    }
}
