//! # twinhub-app
//!
//! Application layer — serialized command execution over the twin and
//! **port definitions** (traits).
//!
//! ## Responsibilities
//! - Run every twin mutation on a single **gateway thread**, in submission order
//! - Hand commands **scoped handles** that stop working once the command returns
//! - Accumulate the notifications of one command and flush them as one batch
//! - Define **port traits** that adapters implement or consume:
//!   - `NotificationSink` — where flushed batches go
//!   - `ActionHandler` — code behind an action resource
//!   - `Integration` / `IntegrationContext` — southbound device integrations
//! - Provide **inbound services**: `PushService` for adapters, `Session` for consumers
//! - Provide **in-process infrastructure** (event bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `twinhub-domain` only (plus `tokio` for channels and the gateway loop).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod accumulator;
pub mod command;
pub mod event_bus;
pub mod gateway;
pub mod handle;
pub mod ports;
pub mod promise;
pub mod scope;
pub mod services;
