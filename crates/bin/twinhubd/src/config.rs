//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `twinhub.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use serde::Deserialize;

use twinhub_app::event_bus::DEFAULT_CAPACITY;
use twinhub_app::gateway::{DEFAULT_QUEUE_CAPACITY, DEFAULT_SHUTDOWN_TIMEOUT, GatewayConfig, PendingPolicy};

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Gateway thread settings.
    pub gateway: GatewaySection,
    /// Notification fan-out settings.
    pub event_bus: EventBusConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Integration toggles.
    pub integrations: IntegrationsConfig,
}

/// `[gateway]` table.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GatewaySection {
    /// Commands that may wait in the queue before producers back off.
    pub queue_capacity: usize,
    /// How long shutdown waits for the gateway thread, in milliseconds.
    pub shutdown_timeout_ms: u64,
    /// What happens to commands still queued at shutdown.
    pub pending_on_shutdown: PendingPolicy,
    pub thread_name: String,
}

/// `[event_bus]` table.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EventBusConfig {
    /// Batches buffered per subscriber before it lags.
    pub capacity: usize,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Per-integration toggles.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct IntegrationsConfig {
    /// Enable the virtual/demo integration.
    pub virtual_enabled: bool,
    /// Period of the virtual thermometer readings.
    pub virtual_interval_ms: u64,
}

impl Config {
    /// Load configuration from `twinhub.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("twinhub.toml")?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    /// Apply overrides looked up through `var`.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(val) = var("TWINHUB_QUEUE_CAPACITY") {
            self.gateway.queue_capacity = parse("TWINHUB_QUEUE_CAPACITY", &val)?;
        }
        if let Some(val) = var("TWINHUB_SHUTDOWN_TIMEOUT_MS") {
            self.gateway.shutdown_timeout_ms = parse("TWINHUB_SHUTDOWN_TIMEOUT_MS", &val)?;
        }
        if let Some(val) = var("TWINHUB_PENDING_ON_SHUTDOWN") {
            self.gateway.pending_on_shutdown = match val.as_str() {
                "fail" => PendingPolicy::Fail,
                "drop" => PendingPolicy::Drop,
                other => {
                    return Err(ConfigError::Validation(format!(
                        "TWINHUB_PENDING_ON_SHUTDOWN must be \"fail\" or \"drop\", got {other:?}"
                    )));
                }
            };
        }
        if let Some(val) = var("TWINHUB_EVENT_BUS_CAPACITY") {
            self.event_bus.capacity = parse("TWINHUB_EVENT_BUS_CAPACITY", &val)?;
        }
        if let Some(val) = var("TWINHUB_VIRTUAL_ENABLED") {
            self.integrations.virtual_enabled = parse("TWINHUB_VIRTUAL_ENABLED", &val)?;
        }
        if let Some(val) = var("TWINHUB_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.queue_capacity == 0 {
            return Err(ConfigError::Validation("gateway.queue_capacity must be non-zero".to_string()));
        }
        if self.gateway.thread_name.is_empty() {
            return Err(ConfigError::Validation("gateway.thread_name must not be empty".to_string()));
        }
        if self.event_bus.capacity == 0 {
            return Err(ConfigError::Validation("event_bus.capacity must be non-zero".to_string()));
        }
        if self.integrations.virtual_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "integrations.virtual_interval_ms must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Gateway settings in the form the app crate expects.
    #[must_use]
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            queue_capacity: self.gateway.queue_capacity,
            shutdown_timeout: Duration::from_millis(self.gateway.shutdown_timeout_ms),
            pending_policy: self.gateway.pending_on_shutdown,
            thread_name: self.gateway.thread_name.clone(),
        }
    }

    #[must_use]
    pub fn virtual_interval(&self) -> Duration {
        Duration::from_millis(self.integrations.virtual_interval_ms)
    }
}

fn parse<T: std::str::FromStr>(key: &str, val: &str) -> Result<T, ConfigError> {
    val.parse()
        .map_err(|_| ConfigError::Validation(format!("{key} has an invalid value {val:?}")))
}

impl Default for GatewaySection {
    fn default() -> Self {
        let defaults = GatewayConfig::default();
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            shutdown_timeout_ms: u64::try_from(DEFAULT_SHUTDOWN_TIMEOUT.as_millis()).unwrap_or(u64::MAX),
            pending_on_shutdown: defaults.pending_policy,
            thread_name: defaults.thread_name,
        }
    }
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "twinhubd=info,twinhub_app=info,twinhub_adapter_virtual=info".to_string(),
        }
    }
}

impl Default for IntegrationsConfig {
    fn default() -> Self {
        Self {
            virtual_enabled: true,
            virtual_interval_ms: 30_000,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
