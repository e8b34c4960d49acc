//! Gateway — the single thread that owns the twin.
//!
//! Producers submit commands through a cloneable [`Gateway`] into a bounded
//! FIFO queue. One dedicated thread pops them one at a time and, for each:
//!
//! 1. opens a fresh [`CommandScope`] and [`NotificationAccumulator`],
//! 2. runs the command with a [`TwinHandle`] (panics are caught),
//! 3. closes the scope, so handles that escaped stop working,
//! 4. flushes the accumulated notifications to the [`NotificationSink`],
//! 5. resolves the command's [`Promise`].
//!
//! Commands therefore execute, notify and resolve in submission order.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::{Notify, mpsc, oneshot};

use twinhub_domain::error::TwinError;
use twinhub_domain::twin::Twin;

use crate::accumulator::NotificationAccumulator;
use crate::command::{Command, command};
use crate::handle::{SharedTwin, TwinHandle, TwinState};
use crate::ports::NotificationSink;
use crate::promise::Promise;
use crate::scope::CommandScope;

/// Default queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;

/// Default time [`GatewayThread::shutdown`] waits for the thread to exit.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// What happens to commands still queued when the gateway stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingPolicy {
    /// Resolve them with [`TwinError::ShuttingDown`].
    #[default]
    Fail,
    /// Drop them; their promises yield [`TwinError::Abandoned`].
    Drop,
}

/// Gateway tuning.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub queue_capacity: usize,
    pub shutdown_timeout: Duration,
    pub pending_policy: PendingPolicy,
    pub thread_name: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            pending_policy: PendingPolicy::Fail,
            thread_name: "twinhub-gateway".to_string(),
        }
    }
}

/// Type-erased queued command.
trait Job: Send {
    fn execute(&mut self, twin: &TwinHandle, notifications: &NotificationAccumulator);
    fn resolve(self: Box<Self>);
    fn abandon(self: Box<Self>, error: TwinError);
}

struct CommandJob<C: Command> {
    command: Option<C>,
    reply: oneshot::Sender<Result<C::Output, TwinError>>,
    outcome: Option<Result<C::Output, TwinError>>,
}

impl<C: Command> CommandJob<C> {
    fn boxed(command: C) -> (Box<dyn Job>, Promise<C::Output>) {
        let (reply, receiver) = oneshot::channel();
        let job = Self {
            command: Some(command),
            reply,
            outcome: None,
        };
        (Box::new(job), Promise::pending(receiver))
    }
}

impl<C: Command> Job for CommandJob<C> {
    fn execute(&mut self, twin: &TwinHandle, notifications: &NotificationAccumulator) {
        let Some(command) = self.command.take() else {
            return;
        };
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| command.call(twin, notifications))) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(panic = %message, "command panicked");
                Err(TwinError::CommandPanicked(message))
            }
        };
        if let Err(err) = &outcome {
            tracing::warn!(error = %err, "command failed");
        }
        self.outcome = Some(outcome);
    }

    fn resolve(self: Box<Self>) {
        let outcome = self.outcome.unwrap_or(Err(TwinError::Abandoned));
        // The caller may have dropped its promise.
        let _ = self.reply.send(outcome);
    }

    fn abandon(self: Box<Self>, error: TwinError) {
        let _ = self.reply.send(Err(error));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}

/// Cloneable submission side of the gateway.
#[derive(Clone)]
pub struct Gateway {
    sender: mpsc::Sender<Box<dyn Job>>,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("queued", &self.queued())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Gateway {
    /// Queue a command, waiting for room when the queue is full.
    ///
    /// The returned promise fails with [`TwinError::Stopped`] if the
    /// gateway no longer accepts commands.
    pub async fn submit<C: Command>(&self, command: C) -> Promise<C::Output> {
        let (job, promise) = CommandJob::boxed(command);
        match self.sender.send(job).await {
            Ok(()) => promise,
            Err(_) => Promise::failed(TwinError::Stopped),
        }
    }

    /// Blocking counterpart of [`submit`](Self::submit) for plain threads.
    ///
    /// Must not be called from inside an async runtime, nor from a command.
    pub fn submit_blocking<C: Command>(&self, command: C) -> Promise<C::Output> {
        let (job, promise) = CommandJob::boxed(command);
        match self.sender.blocking_send(job) {
            Ok(()) => promise,
            Err(_) => Promise::failed(TwinError::Stopped),
        }
    }

    /// Submit a closure and wait for its result.
    ///
    /// # Errors
    ///
    /// The closure's own error, or the reason it never ran.
    pub async fn execute<F, T>(&self, f: F) -> Result<T, TwinError>
    where
        F: FnOnce(&TwinHandle, &NotificationAccumulator) -> Result<T, TwinError> + Send + 'static,
        T: Send + 'static,
    {
        self.submit(command(f)).await.await
    }

    /// Blocking counterpart of [`execute`](Self::execute).
    ///
    /// # Errors
    ///
    /// The closure's own error, or the reason it never ran.
    pub fn execute_blocking<F, T>(&self, f: F) -> Result<T, TwinError>
    where
        F: FnOnce(&TwinHandle, &NotificationAccumulator) -> Result<T, TwinError> + Send + 'static,
        T: Send + 'static,
    {
        self.submit_blocking(command(f)).blocking_wait()
    }

    /// Whether the gateway stopped accepting commands.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Number of commands waiting in the queue.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }
}

/// How [`GatewayThread::shutdown`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The thread exited and was joined.
    Completed,
    /// The thread did not exit in time and was detached.
    TimedOut,
}

/// Owner of the gateway thread.
///
/// Dropping it raises the stop signal without waiting; call
/// [`shutdown`](Self::shutdown) to wait for the thread.
pub struct GatewayThread {
    gateway: Gateway,
    stop: Arc<Notify>,
    exited: Option<oneshot::Receiver<()>>,
    thread: Option<JoinHandle<()>>,
    shutdown_timeout: Duration,
}

impl GatewayThread {
    /// Spawn the gateway thread, which takes ownership of `twin`.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the thread or its runtime cannot be created.
    pub fn start<S>(twin: Twin, sink: S, config: GatewayConfig) -> io::Result<Self>
    where
        S: NotificationSink + 'static,
    {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let stop = Arc::new(Notify::new());
        let (exited_tx, exited_rx) = oneshot::channel();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;

        let state = Arc::new(Mutex::new(TwinState::new(twin)));
        let worker = Worker {
            receiver,
            stop: Arc::clone(&stop),
            state,
            sink,
            policy: config.pending_policy,
        };
        let thread = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || {
                runtime.block_on(worker.run());
                let _ = exited_tx.send(());
            })?;
        tracing::info!(
            thread = %config.thread_name,
            queue_capacity = config.queue_capacity,
            pending_policy = ?config.pending_policy,
            "gateway thread started"
        );

        Ok(Self {
            gateway: Gateway { sender },
            stop,
            exited: Some(exited_rx),
            thread: Some(thread),
            shutdown_timeout: config.shutdown_timeout,
        })
    }

    /// A new submission handle.
    #[must_use]
    pub fn gateway(&self) -> Gateway {
        self.gateway.clone()
    }

    /// Stop the loop after the current command and wait for the thread.
    ///
    /// Queued commands are handled per [`PendingPolicy`]. If the thread
    /// does not exit within the shutdown timeout it is detached.
    pub async fn shutdown(mut self) -> ShutdownOutcome {
        self.stop.notify_one();
        let Some(exited) = self.exited.take() else {
            return ShutdownOutcome::Completed;
        };
        if tokio::time::timeout(self.shutdown_timeout, exited).await.is_err() {
            tracing::error!(
                timeout_ms = u64::try_from(self.shutdown_timeout.as_millis()).unwrap_or(u64::MAX),
                "gateway thread did not stop in time, detaching it"
            );
            self.thread.take();
            return ShutdownOutcome::TimedOut;
        }
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::error!("gateway thread panicked");
        }
        ShutdownOutcome::Completed
    }
}

impl Drop for GatewayThread {
    fn drop(&mut self) {
        self.stop.notify_one();
    }
}

struct Worker<S> {
    receiver: mpsc::Receiver<Box<dyn Job>>,
    stop: Arc<Notify>,
    state: SharedTwin,
    sink: S,
    policy: PendingPolicy,
}

impl<S: NotificationSink> Worker<S> {
    async fn run(mut self) {
        let mut executed: u64 = 0;
        loop {
            tokio::select! {
                biased;
                () = self.stop.notified() => {
                    tracing::debug!("gateway stop requested");
                    break;
                }
                job = self.receiver.recv() => match job {
                    Some(job) => {
                        executed += 1;
                        self.execute(job, executed);
                    }
                    None => {
                        tracing::debug!("all gateway handles dropped");
                        break;
                    }
                },
            }
        }

        self.receiver.close();
        let mut pending = 0usize;
        while let Ok(job) = self.receiver.try_recv() {
            pending += 1;
            match self.policy {
                PendingPolicy::Fail => job.abandon(TwinError::ShuttingDown),
                PendingPolicy::Drop => drop(job),
            }
        }
        if pending > 0 {
            tracing::warn!(pending, policy = ?self.policy, "queued commands discarded on shutdown");
        }
        tracing::info!(executed, "gateway thread stopped");
    }

    fn execute(&self, mut job: Box<dyn Job>, sequence: u64) {
        let _span = tracing::trace_span!("command", sequence).entered();
        let notifications = Arc::new(NotificationAccumulator::new());
        let scope = CommandScope::open();
        let twin = TwinHandle::new(Arc::clone(&self.state), scope.clone(), Arc::clone(&notifications));

        job.execute(&twin, &notifications);

        scope.close();
        drop(twin);
        match panic::catch_unwind(AssertUnwindSafe(|| notifications.complete_and_send(&self.sink))) {
            Ok(Ok(0)) => {}
            Ok(Ok(count)) => tracing::trace!(count, "notification batch flushed"),
            Ok(Err(err)) => tracing::error!(error = %err, "failed to flush notifications"),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(panic = %message, "notification sink panicked");
            }
        }
        job.resolve();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc as std_mpsc;

    use chrono::Duration as ChronoDuration;
    use twinhub_domain::error::{InvalidStateError, NotFoundError};
    use twinhub_domain::notification::{Notification, NotificationBatch};
    use twinhub_domain::resource::{ResourcePath, SetOutcome, WriteOrigin};
    use twinhub_domain::time::now;
    use twinhub_domain::value::Value;

    use crate::command::CommandBatch;

    #[derive(Default)]
    struct CollectingSink(Mutex<Vec<NotificationBatch>>);

    impl NotificationSink for CollectingSink {
        fn deliver(&self, batch: NotificationBatch) {
            self.0.lock().unwrap().push(batch);
        }
    }

    impl CollectingSink {
        fn batches(&self) -> Vec<NotificationBatch> {
            self.0.lock().unwrap().clone()
        }
    }

    fn start(config: GatewayConfig) -> (GatewayThread, Arc<CollectingSink>) {
        let sink = Arc::new(CollectingSink::default());
        let thread = GatewayThread::start(Twin::default(), Arc::clone(&sink), config).unwrap();
        (thread, sink)
    }

    fn data_values(batches: &[NotificationBatch], provider: &str) -> Vec<Value> {
        batches
            .iter()
            .flat_map(|b| b.notifications.iter())
            .filter_map(|n| match n {
                Notification::Data(d) if d.provider == provider => Some(d.new_value.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn should_execute_and_notify_in_submission_order_per_producer() {
        const PRODUCERS: usize = 4;
        const COMMANDS: i64 = 50;
        let (thread, sink) = start(GatewayConfig::default());
        let base = now();

        let mut tasks = Vec::new();
        for producer in 0..PRODUCERS {
            let gateway = thread.gateway();
            tasks.push(tokio::spawn(async move {
                let mut promises = Vec::new();
                for i in 0..COMMANDS {
                    let path = ResourcePath::new(format!("producer{producer}"), "counter", "value");
                    let promise = gateway
                        .submit(command(move |twin, _| {
                            twin.ensure_resource(&path, None)?;
                            twin.set_value(&path, Value::Int(i), base + ChronoDuration::seconds(i), WriteOrigin::Push)
                        }))
                        .await;
                    promises.push(promise);
                }
                for promise in promises {
                    assert_eq!(promise.await.unwrap(), SetOutcome::Applied);
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let batches = sink.batches();
        for producer in 0..PRODUCERS {
            let values = data_values(&batches, &format!("producer{producer}"));
            let expected: Vec<Value> = (0..COMMANDS).map(Value::Int).collect();
            assert_eq!(values, expected);
        }
        assert_eq!(thread.shutdown().await, ShutdownOutcome::Completed);
    }

    #[tokio::test]
    async fn should_flush_notifications_before_resolving_promise() {
        let (thread, sink) = start(GatewayConfig::default());
        let path = ResourcePath::new("sensor", "data", "value");

        thread
            .gateway()
            .execute(move |twin, _| {
                twin.ensure_resource(&path, None)?;
                twin.set_value(&path, Value::Int(42), now(), WriteOrigin::Push)
            })
            .await
            .unwrap();

        let batches = sink.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(data_values(&batches, "sensor"), vec![Value::Int(42)]);
        thread.shutdown().await;
    }

    #[tokio::test]
    async fn should_ignore_stale_write_without_notification() {
        let (thread, sink) = start(GatewayConfig::default());
        let gateway = thread.gateway();
        let path = ResourcePath::new("sensor", "data", "value");
        let t1 = now();
        let t0 = t1 - ChronoDuration::seconds(10);

        let p = path.clone();
        gateway
            .execute(move |twin, _| {
                twin.ensure_resource(&p, None)?;
                twin.set_value(&p, Value::Int(42), t1, WriteOrigin::Push)
            })
            .await
            .unwrap();
        let p = path.clone();
        let outcome = gateway
            .execute(move |twin, _| twin.set_value(&p, Value::Int(7), t0, WriteOrigin::Push))
            .await
            .unwrap();
        let p = path.clone();
        let current = gateway
            .execute(move |twin, _| twin.value(&p))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome, SetOutcome::Stale);
        assert_eq!(current.value(), &Value::Int(42));
        assert_eq!(current.timestamp(), t1);
        assert_eq!(data_values(&sink.batches(), "sensor"), vec![Value::Int(42)]);
        thread.shutdown().await;
    }

    #[tokio::test]
    async fn should_invalidate_handle_that_escaped_its_command() {
        let (thread, _sink) = start(GatewayConfig::default());

        let escaped = thread
            .gateway()
            .execute(|twin, _| Ok(twin.clone()))
            .await
            .unwrap();

        assert!(matches!(
            escaped.provider_names(),
            Err(TwinError::InvalidState(InvalidStateError::ScopeClosed))
        ));
        thread.shutdown().await;
    }

    #[tokio::test]
    async fn should_survive_a_panicking_command() {
        let (thread, _sink) = start(GatewayConfig::default());
        let gateway = thread.gateway();

        let panicked = gateway.execute::<_, ()>(|_, _| panic!("boom")).await;
        let after = gateway.execute(|_, _| Ok(1)).await;

        assert!(matches!(panicked, Err(TwinError::CommandPanicked(msg)) if msg == "boom"));
        assert_eq!(after.unwrap(), 1);
        thread.shutdown().await;
    }

    struct PanickingSink;

    impl NotificationSink for PanickingSink {
        fn deliver(&self, _batch: NotificationBatch) {
            panic!("sink exploded");
        }
    }

    #[tokio::test]
    async fn should_keep_running_when_sink_panics() {
        let thread = GatewayThread::start(Twin::default(), PanickingSink, GatewayConfig::default()).unwrap();
        let gateway = thread.gateway();
        let path = ResourcePath::new("dev", "s", "r");

        let p = path.clone();
        let first = gateway
            .execute(move |twin, _| {
                twin.ensure_resource(&p, None)?;
                twin.set_value(&p, Value::Int(1), now(), WriteOrigin::Push)
            })
            .await;
        let second = gateway.execute(move |twin, _| twin.value(&path)).await;

        assert_eq!(first.unwrap(), SetOutcome::Applied);
        assert_eq!(second.unwrap().unwrap().value(), &Value::Int(1));
        assert!(!gateway.is_closed());
        assert_eq!(thread.shutdown().await, ShutdownOutcome::Completed);
    }

    #[tokio::test]
    async fn should_apply_batch_atomically_and_report_first_failure() {
        let (thread, sink) = start(GatewayConfig::default());
        let gateway = thread.gateway();
        let a = ResourcePath::new("dev", "s", "a");
        let b = ResourcePath::new("dev", "s", "b");
        let (pa, pb) = (a.clone(), b.clone());
        gateway
            .execute(move |twin, _| {
                twin.ensure_resource(&pa, None)?;
                twin.ensure_resource(&pb, None)?;
                Ok(())
            })
            .await
            .unwrap();
        let before = sink.batches().len();

        let ts = now();
        let (pa, pb) = (a.clone(), b.clone());
        let batch = CommandBatch::new()
            .with(move |twin, _| twin.set_value(&pa, Value::Int(1), ts, WriteOrigin::Push))
            .with(move |twin, _| {
                twin.set_value(&ResourcePath::new("dev", "s", "missing"), Value::Int(2), ts, WriteOrigin::Push)
            })
            .with(move |twin, _| twin.set_value(&pb, Value::Int(3), ts, WriteOrigin::Push));
        let result = gateway.submit(batch).await.await;

        match result {
            Err(TwinError::BatchFailed { index, source }) => {
                assert_eq!(index, 1);
                assert!(matches!(*source, TwinError::NotFound(NotFoundError { kind: "resource", .. })));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        let batches = sink.batches();
        assert_eq!(batches.len(), before + 1);
        assert_eq!(batches[before].len(), 2);
        assert_eq!(data_values(&batches, "dev"), vec![Value::Int(1), Value::Int(3)]);
        thread.shutdown().await;
    }

    #[tokio::test]
    async fn should_return_outputs_of_successful_batch_in_order() {
        let (thread, _sink) = start(GatewayConfig::default());
        let batch = CommandBatch::new()
            .with(|_, _| Ok("first"))
            .with(|_, _| Ok("second"));

        let outputs = thread.gateway().submit(batch).await.await.unwrap();

        assert_eq!(outputs, vec!["first", "second"]);
        thread.shutdown().await;
    }

    #[tokio::test]
    async fn should_not_deliver_batch_for_read_only_command() {
        let (thread, sink) = start(GatewayConfig::default());
        let names = thread
            .gateway()
            .execute(|twin, _| twin.provider_names())
            .await
            .unwrap();
        assert!(names.is_empty());
        assert!(sink.batches().is_empty());
        thread.shutdown().await;
    }

    /// Occupies the gateway thread until `release` fires.
    async fn block_gateway(gateway: &Gateway) -> (Promise<()>, std_mpsc::Sender<()>) {
        let (started_tx, started_rx) = oneshot::channel();
        let (release_tx, release_rx) = std_mpsc::channel::<()>();
        let promise = gateway
            .submit(command(move |_, _| {
                let _ = started_tx.send(());
                let _ = release_rx.recv();
                Ok(())
            }))
            .await;
        started_rx.await.unwrap();
        (promise, release_tx)
    }

    async fn shutdown_with_queued(policy: PendingPolicy) -> (Result<(), TwinError>, Result<i32, TwinError>) {
        let (thread, _sink) = start(GatewayConfig {
            pending_policy: policy,
            ..GatewayConfig::default()
        });
        let gateway = thread.gateway();
        let (running, release) = block_gateway(&gateway).await;
        let queued = gateway.submit(command(|_, _| Ok(2))).await;
        assert_eq!(gateway.queued(), 1);

        let (outcome, ()) = tokio::join!(thread.shutdown(), async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            release.send(()).unwrap();
        });

        assert_eq!(outcome, ShutdownOutcome::Completed);
        (running.await, queued.await)
    }

    #[tokio::test]
    async fn should_fail_queued_commands_on_shutdown() {
        let (running, queued) = shutdown_with_queued(PendingPolicy::Fail).await;
        assert!(running.is_ok());
        assert!(matches!(queued, Err(TwinError::ShuttingDown)));
    }

    #[tokio::test]
    async fn should_abandon_queued_commands_with_drop_policy() {
        let (running, queued) = shutdown_with_queued(PendingPolicy::Drop).await;
        assert!(running.is_ok());
        assert!(matches!(queued, Err(TwinError::Abandoned)));
    }

    #[tokio::test]
    async fn should_wait_for_room_when_queue_is_full() {
        let (thread, _sink) = start(GatewayConfig {
            queue_capacity: 1,
            ..GatewayConfig::default()
        });
        let gateway = thread.gateway();
        let (running, release) = block_gateway(&gateway).await;
        let queued = gateway.submit(command(|_, _| Ok(2))).await;
        assert_eq!(gateway.queued(), 1);

        let producer = gateway.clone();
        let waiting = tokio::spawn(async move { producer.submit(command(|_, _| Ok(3))).await.await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiting.is_finished());
        assert_eq!(gateway.queued(), 1);

        release.send(()).unwrap();
        assert!(running.await.is_ok());
        assert_eq!(queued.await.unwrap(), 2);
        assert_eq!(waiting.await.unwrap().unwrap(), 3);
        thread.shutdown().await;
    }

    #[tokio::test]
    async fn should_detach_thread_that_does_not_stop_in_time() {
        let (thread, _sink) = start(GatewayConfig {
            shutdown_timeout: Duration::from_millis(50),
            ..GatewayConfig::default()
        });
        let gateway = thread.gateway();
        let (_running, release) = block_gateway(&gateway).await;

        let outcome = thread.shutdown().await;

        assert_eq!(outcome, ShutdownOutcome::TimedOut);
        release.send(()).unwrap();
    }

    #[tokio::test]
    async fn should_reject_submissions_after_shutdown() {
        let (thread, _sink) = start(GatewayConfig::default());
        let gateway = thread.gateway();
        thread.shutdown().await;

        let result = gateway.execute(|_, _| Ok(())).await;

        assert!(matches!(result, Err(TwinError::Stopped)));
        assert!(gateway.is_closed());
    }

    #[test]
    fn should_serve_blocking_producers_from_plain_threads() {
        let sink = Arc::new(CollectingSink::default());
        let thread = GatewayThread::start(Twin::default(), Arc::clone(&sink), GatewayConfig::default()).unwrap();
        let gateway = thread.gateway();

        let workers: Vec<_> = (0..3)
            .map(|n| {
                let gateway = gateway.clone();
                std::thread::spawn(move || {
                    gateway.execute_blocking(move |twin, _| {
                        twin.create_provider(&format!("p{n}"), None)?;
                        Ok(n)
                    })
                })
            })
            .collect();
        let mut results: Vec<i32> = workers.into_iter().map(|w| w.join().unwrap().unwrap()).collect();
        results.sort_unstable();

        assert_eq!(results, vec![0, 1, 2]);
        let names = gateway.execute_blocking(|twin, _| twin.provider_names()).unwrap();
        assert_eq!(names, vec!["p0", "p1", "p2"]);
        drop(thread);
    }

    #[test]
    fn should_default_to_documented_configuration() {
        let config = GatewayConfig::default();
        assert_eq!(config.queue_capacity, 4096);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(config.pending_policy, PendingPolicy::Fail);
    }
}
