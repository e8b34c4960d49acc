//! Integration port — lifecycle of southbound device integrations.
//!
//! An integration bridges an external protocol (virtual devices, MQTT, …)
//! into the twin. It declares its models, pushes device data and binds
//! action handlers to the action resources it owns.

use std::future::Future;
use std::sync::Arc;

use twinhub_domain::error::TwinError;
use twinhub_domain::model::ModelDefinition;
use twinhub_domain::resource::{ResourcePath, SetOutcome};

use crate::ports::ActionHandler;
use crate::services::push_service::ResourceUpdate;

/// What an integration may do to the twin.
///
/// This is a **port**: the binary crate wires in the gateway-backed
/// implementation, tests may substitute their own.
pub trait IntegrationContext: Send + Sync {
    /// Make a model known to the twin. Providers created afterwards use it.
    fn register_model(
        &self,
        model: ModelDefinition,
    ) -> impl Future<Output = Result<(), TwinError>> + Send;

    /// Push one update (creating the provider, service and resource on demand).
    fn push(
        &self,
        update: ResourceUpdate,
    ) -> impl Future<Output = Result<SetOutcome, TwinError>> + Send;

    /// Push several updates as one atomic command.
    fn push_bulk(
        &self,
        updates: Vec<ResourceUpdate>,
    ) -> impl Future<Output = Result<Vec<SetOutcome>, TwinError>> + Send;

    /// Bind `handler` to the action resource at `path`.
    fn register_action(
        &self,
        path: ResourcePath,
        handler: Arc<dyn ActionHandler>,
    ) -> impl Future<Output = Result<(), TwinError>> + Send;
}

/// A pluggable device integration.
///
/// Implementations live in adapter crates (e.g. `adapter_virtual`).
/// The binary crate calls the lifecycle methods in order:
///
/// 1. [`setup`](Self::setup) — declare models, create providers, bind actions
/// 2. [`start_background`](Self::start_background) — spawn long-running tasks
/// 3. [`teardown`](Self::teardown) — stop those tasks
pub trait Integration {
    /// Unique name identifying this integration (e.g. `"virtual"`).
    fn name(&self) -> &'static str;

    /// Fast, non-blocking initialisation.
    fn setup(
        &mut self,
        ctx: &impl IntegrationContext,
    ) -> impl Future<Output = Result<(), TwinError>> + Send;

    /// Start pushing data in the background and return immediately.
    ///
    /// The default implementation is a no-op.
    fn start_background(
        &mut self,
        _ctx: impl IntegrationContext + Clone + 'static,
    ) -> impl Future<Output = Result<(), TwinError>> + Send {
        async { Ok(()) }
    }

    /// Called on graceful shutdown.
    fn teardown(&mut self) -> impl Future<Output = Result<(), TwinError>> + Send;
}
