//! Application services — inbound use-cases on top of the gateway.
//!
//! Each service holds a cloneable [`Gateway`](crate::gateway::Gateway) and
//! turns its calls into commands, so callers never touch the twin directly.

pub mod integration_context;
pub mod push_service;
pub mod session;
