//! # twinhubd — twinhub daemon
//!
//! Composition root that wires the twin, the gateway thread, the event bus
//! and the integrations together, then runs until a shutdown signal.
//!
//! ## Responsibilities
//! - Parse configuration (`twinhub.toml`, env vars)
//! - Install the `tracing` subscriber
//! - Start the gateway thread with the event bus as its notification sink
//! - Set up and start the enabled integrations
//! - Handle graceful shutdown (SIGTERM/SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use twinhub_adapter_virtual::VirtualIntegration;
use twinhub_app::event_bus::{InProcessEventBus, Subscription};
use twinhub_app::gateway::{GatewayThread, ShutdownOutcome};
use twinhub_app::ports::Integration;
use twinhub_app::services::integration_context::GatewayContext;
use twinhub_domain::model::ModelRegistry;
use twinhub_domain::twin::Twin;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;

    let filter = EnvFilter::try_new(&config.logging.filter).context("parsing log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Gateway
    let bus = Arc::new(InProcessEventBus::new(config.event_bus.capacity));
    let gateway_thread = GatewayThread::start(
        Twin::new(ModelRegistry::new()),
        Arc::clone(&bus),
        config.gateway_config(),
    )
    .context("starting gateway thread")?;
    let notification_log = tokio::spawn(log_notifications(bus.subscribe_all()));

    // Integrations
    let ctx = GatewayContext::new(gateway_thread.gateway());
    let mut virtual_integration = None;
    if config.integrations.virtual_enabled {
        let mut integration = VirtualIntegration::new(config.virtual_interval());
        integration.setup(&ctx).await.context("setting up virtual integration")?;
        integration
            .start_background(ctx.clone())
            .await
            .context("starting virtual integration")?;
        virtual_integration = Some(integration);
    }

    tracing::info!("twinhubd running");
    shutdown_signal().await;
    tracing::info!("shutdown requested");

    if let Some(integration) = virtual_integration.as_mut()
        && let Err(err) = integration.teardown().await
    {
        tracing::warn!(integration = integration.name(), error = %err, "teardown failed");
    }

    match gateway_thread.shutdown().await {
        ShutdownOutcome::Completed => tracing::info!("gateway stopped"),
        ShutdownOutcome::TimedOut => tracing::warn!("gateway did not stop in time, detached"),
    }
    notification_log.abort();

    Ok(())
}

/// Log every notification the twin emits.
async fn log_notifications(mut subscription: Subscription) {
    while let Some(notification) = subscription.recv().await {
        tracing::debug!(topic = %notification.topic(), ?notification, "notification");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
