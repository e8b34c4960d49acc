//! # twinhub-adapter-virtual
//!
//! Virtual/demo integration that provides simulated devices for testing and
//! demonstration purposes.
//!
//! ## Provided devices
//!
//! | Device | Provider | Behaviour |
//! |--------|----------|-----------|
//! | Virtual Light | `virtual_light` | `light/turn_on` (optional `brightness`), `light/turn_off`, `light/toggle` |
//! | Virtual Thermometer | `virtual_thermometer` | Pushes `sensor/temperature` every interval |
//! | Virtual Switch | `virtual_switch` | `switch/turn_on`, `switch/turn_off`, `switch/toggle` |
//!
//! ## Dependency rule
//!
//! Depends on `twinhub-app` (port traits) and `twinhub-domain` only.

mod devices;

use std::time::Duration;

use tokio::task::JoinHandle;

use twinhub_app::ports::{Integration, IntegrationContext};
use twinhub_domain::error::TwinError;

pub use devices::{BASE_TEMPERATURE, VirtualDevice, VirtualLight, VirtualSensor, VirtualSwitch};

/// Default period between two thermometer readings.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Virtual integration that creates simulated devices.
pub struct VirtualIntegration {
    devices: Vec<VirtualDevice>,
    interval: Duration,
    readings: Option<JoinHandle<()>>,
}

impl Default for VirtualIntegration {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl VirtualIntegration {
    /// Integration whose thermometer reports every `interval`.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            devices: vec![
                VirtualDevice::Light(VirtualLight::new("Virtual Light")),
                VirtualDevice::Sensor(VirtualSensor::new("Virtual Thermometer")),
                VirtualDevice::Switch(VirtualSwitch::new("Virtual Switch")),
            ],
            interval,
            readings: None,
        }
    }

    #[must_use]
    pub fn devices(&self) -> &[VirtualDevice] {
        &self.devices
    }

    /// Whether the background reading task is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.readings.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Integration for VirtualIntegration {
    fn name(&self) -> &'static str {
        "virtual"
    }

    async fn setup(&mut self, ctx: &impl IntegrationContext) -> Result<(), TwinError> {
        for device in &self.devices {
            ctx.register_model(device.model()?).await?;
            ctx.push_bulk(device.initial_updates()).await?;
            for (path, handler) in device.actions() {
                ctx.register_action(path, handler).await?;
            }
            tracing::debug!(provider = device.provider(), "virtual device ready");
        }
        tracing::info!(devices = self.devices.len(), "virtual integration set up");
        Ok(())
    }

    async fn start_background(&mut self, ctx: impl IntegrationContext + Clone + 'static) -> Result<(), TwinError> {
        if self.is_running() {
            return Ok(());
        }
        let interval = self.interval;
        self.readings = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick completes immediately and setup already pushed tick 0
            ticker.tick().await;
            let mut tick: u32 = 0;
            loop {
                ticker.tick().await;
                tick = tick.wrapping_add(1);
                match ctx.push(VirtualSensor::reading_update(tick)).await {
                    Ok(_) => {}
                    Err(TwinError::Stopped | TwinError::ShuttingDown | TwinError::Abandoned) => {
                        tracing::debug!("gateway gone, stopping virtual readings");
                        break;
                    }
                    Err(err) => tracing::warn!(error = %err, "virtual thermometer push failed"),
                }
            }
        }));
        tracing::debug!(interval_ms = interval.as_millis(), "virtual readings started");
        Ok(())
    }

    async fn teardown(&mut self) -> Result<(), TwinError> {
        if let Some(task) = self.readings.take() {
            task.abort();
        }
        tracing::info!("virtual integration stopped");
        Ok(())
    }
}
