//! End-to-end tests for the full twinhubd stack.
//!
//! Each test spins up the complete application (twin, gateway thread, event
//! bus, push service, sessions) the same way `main` wires it, without
//! reading any configuration file.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use twinhub_adapter_virtual::VirtualIntegration;
use twinhub_app::event_bus::InProcessEventBus;
use twinhub_app::gateway::{GatewayConfig, GatewayThread, ShutdownOutcome};
use twinhub_app::ports::Integration;
use twinhub_app::services::integration_context::GatewayContext;
use twinhub_app::services::push_service::{PushService, ResourceUpdate};
use twinhub_app::services::session::Session;
use twinhub_domain::model::ModelRegistry;
use twinhub_domain::notification::{Notification, NotificationKind};
use twinhub_domain::snapshot::SnapshotFilter;
use twinhub_domain::twin::Twin;
use twinhub_domain::value::Value;

struct Stack {
    thread: GatewayThread,
    session: Session,
    push: PushService,
}

fn stack() -> Stack {
    let bus = Arc::new(InProcessEventBus::new(256));
    let thread = GatewayThread::start(Twin::new(ModelRegistry::new()), Arc::clone(&bus), GatewayConfig::default())
        .expect("gateway thread should start");
    Stack {
        session: Session::new(thread.gateway(), bus),
        push: PushService::new(thread.gateway()),
        thread,
    }
}

// ---------------------------------------------------------------------------
// Push and subscribe
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_notify_subscriber_of_old_and_new_values() {
    let Stack { thread, session, push } = stack();
    let mut sub = session.subscribe("DATA/provider/service/resource").unwrap();

    push.push(ResourceUpdate::new("provider", "service", "resource").value(42))
        .await
        .unwrap();
    let Some(Notification::Data(first)) = sub.recv().await else {
        panic!("expected a data notification");
    };
    assert_eq!(first.old_value, None);
    assert_eq!(first.new_value, Value::Int(42));

    push.push(ResourceUpdate::new("provider", "service", "resource").value(84))
        .await
        .unwrap();
    let Some(second) = sub.recv().await else {
        panic!("expected a second notification");
    };
    let json = serde_json::to_value(&second).unwrap();
    assert_eq!(json["kind"], "DATA");
    assert_eq!(json["oldValue"], 42);
    assert_eq!(json["newValue"], 84);

    assert_eq!(thread.shutdown().await, ShutdownOutcome::Completed);
}

#[tokio::test]
async fn should_announce_new_provider_before_its_data() {
    let Stack { thread, session, push } = stack();
    let mut sub = session.subscribe("#").unwrap();

    push.push(ResourceUpdate::new("meter", "power", "watts").value(12.5))
        .await
        .unwrap();
    let batch = sub.recv_batch().await.unwrap();
    let kinds: Vec<NotificationKind> = batch.notifications.iter().map(Notification::kind).collect();
    assert_eq!(kinds.first(), Some(&NotificationKind::Lifecycle));
    assert_eq!(kinds.last(), Some(&NotificationKind::Data));

    thread.shutdown().await;
}

// ---------------------------------------------------------------------------
// Filtered snapshot
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_return_only_matching_provider_from_filtered_snapshot() {
    let Stack { thread, session, push } = stack();

    let mut updates = Vec::new();
    for provider in 0..2 {
        for service in 0..4_i64 {
            updates.push(
                ResourceUpdate::new(format!("provider_{provider}"), format!("service_{service}"), "resource")
                    .model(format!("model_{provider}"))
                    .value(service + 1),
            );
        }
    }
    assert_eq!(updates.len(), 8);
    push.push_bulk(updates).await.unwrap();

    let filter = SnapshotFilter::new()
        .model("model_1")
        .service(|s| s.name == "service_1")
        .resource(|r| r.name() == "resource");
    let snapshots = session.filtered_snapshot(filter).await.unwrap();

    assert_eq!(snapshots.len(), 1);
    let provider = &snapshots[0];
    assert_eq!(provider.name, "provider_1");
    assert_eq!(provider.services.len(), 5);
    let value = provider
        .resource("service_1", "resource")
        .and_then(|r| r.value.clone())
        .expect("service_1/resource should hold a value");
    assert_eq!(value.value(), &Value::Int(2));
    assert!(value.timestamp() <= provider.snapshot_time);

    thread.shutdown().await;
}

// ---------------------------------------------------------------------------
// Virtual integration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_run_virtual_light_action_end_to_end() {
    let Stack { thread, session, .. } = stack();
    let ctx = GatewayContext::new(thread.gateway());
    let mut integration = VirtualIntegration::default();
    integration.setup(&ctx).await.unwrap();
    let mut sub = session.subscribe("+/virtual_light/#").unwrap();

    let result = session
        .act("virtual_light", "light", "turn_on", HashMap::new())
        .await
        .unwrap();
    assert_eq!(result, Some(Value::Bool(true)));

    let batch = sub.recv_batch().await.unwrap();
    let topics: Vec<String> = batch.notifications.iter().map(Notification::topic).collect();
    assert_eq!(
        topics,
        vec!["ACTION/virtual_light/light/turn_on", "DATA/virtual_light/light/state"]
    );

    integration.teardown().await.unwrap();
    thread.shutdown().await;
}

#[tokio::test]
async fn should_stream_virtual_readings_while_running() {
    let Stack { thread, session, .. } = stack();
    let ctx = GatewayContext::new(thread.gateway());
    let mut integration = VirtualIntegration::new(Duration::from_millis(5));
    integration.setup(&ctx).await.unwrap();
    let mut sub = session.subscribe("DATA/virtual_thermometer/+/temperature").unwrap();
    integration.start_background(ctx).await.unwrap();

    for _ in 0..3 {
        let notification = tokio::time::timeout(Duration::from_secs(2), sub.recv())
            .await
            .expect("reading should arrive")
            .unwrap();
        assert!(matches!(notification, Notification::Data(_)));
    }

    integration.teardown().await.unwrap();
    thread.shutdown().await;
}

// ---------------------------------------------------------------------------
// Shutdown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_reject_pushes_after_shutdown() {
    let Stack { thread, push, .. } = stack();
    assert_eq!(thread.shutdown().await, ShutdownOutcome::Completed);

    let err = push
        .push(ResourceUpdate::new("late", "service", "resource").value(1))
        .await
        .unwrap_err();
    assert!(matches!(err, twinhub_domain::error::TwinError::Stopped));
}
