//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the gateway and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod action;
pub mod integration;
pub mod notification_sink;

pub use action::ActionHandler;
pub use integration::{Integration, IntegrationContext};
pub use notification_sink::NotificationSink;
