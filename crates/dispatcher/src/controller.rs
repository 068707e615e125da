//! EventController - watch-to-queue bridge and worker pool
//!
//! Notifications from the event source pass the staleness filter into the
//! shared queue; `workers` tasks drain it and fan every event out to the
//! registered sinks in order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use contracts::{ClusterEvent, ControllerSettings, EventSource, Notification};
use observability::metrics as obs;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::metrics::{ControllerMetrics, MetricsSnapshot, SinkMetrics};
use crate::queue::EventQueue;
use crate::registry::SinkSet;

/// Delay before a panicked worker is restarted
const WORKER_RESTART_PERIOD: Duration = Duration::from_secs(1);

/// Controller tuning
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Events older than this at enqueue time are dropped
    pub staleness_window: Duration,
    /// Upper bound on the initial cache sync
    pub sync_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::from(&ControllerSettings::default())
    }
}

impl From<&ControllerSettings> for ControllerConfig {
    fn from(settings: &ControllerSettings) -> Self {
        Self {
            staleness_window: settings.staleness_window(),
            sync_timeout: settings.sync_timeout(),
        }
    }
}

/// Lifecycle of a controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Constructed,
    /// Waiting for the initial cache sync
    Watching,
    /// Synced, workers draining the queue
    Running,
    Stopped,
}

/// How `run` ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Stop signal received after a successful sync
    Stopped,
    /// The initial sync did not complete; nothing was started
    SyncAborted,
}

/// Rejects events whose last observation is older than the window
#[derive(Debug, Clone, Copy)]
pub struct StalenessFilter {
    window: Duration,
}

impl StalenessFilter {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    /// Events with no known timestamp are stale
    pub fn is_stale(&self, event: &ClusterEvent, now: DateTime<Utc>) -> bool {
        match event.age(now) {
            Some(age) => age > self.window,
            None => true,
        }
    }
}

/// State shared between the watch loop and workers
struct Shared {
    sinks: SinkSet,
    sink_metrics: Vec<Arc<SinkMetrics>>,
    queue: EventQueue<Arc<ClusterEvent>>,
    staleness: StalenessFilter,
    metrics: ControllerMetrics,
    state: Mutex<ControllerState>,
    synced: AtomicBool,
}

impl Shared {
    fn handle(&self, notification: Notification) {
        match notification {
            Notification::Added(event) => self.enqueue(event, "added"),
            Notification::Updated(event) => self.enqueue(event, "updated"),
            Notification::Deleted(event) => {
                obs::record_event_received("deleted");
                debug!(uid = %event.uid, "Delete notification ignored");
            }
            Notification::Synced => debug!("Repeated sync notification ignored"),
        }
    }

    fn enqueue(&self, event: ClusterEvent, kind: &'static str) {
        self.metrics.inc_received();
        obs::record_event_received(kind);

        let now = Utc::now();
        debug!(
            event_type = %event.event_type,
            reason = %event.reason,
            namespace = %event.involved_object.namespace,
            object = %event.object_ref(),
            message = %event.message,
            uid = %event.involved_object.uid,
            age = ?event.age(now),
            "kube event"
        );

        if self.staleness.is_stale(&event, now) {
            self.metrics.inc_stale();
            obs::record_event_stale();
            return;
        }

        debug!(uid = %event.uid, "Event to send");
        if self.queue.add(Arc::new(event)) {
            self.metrics.inc_enqueued();
            obs::record_event_enqueued(self.queue.len());
        }
    }

    /// Fan one event out to every sink; failures are logged and skipped
    async fn process(&self, event: &ClusterEvent) {
        for (sink, metrics) in self.sinks.iter().zip(&self.sink_metrics) {
            if !sink.filter(event) {
                metrics.inc_filtered_count();
                continue;
            }
            match sink.send(event).await {
                Ok(()) => {
                    metrics.inc_send_count();
                    obs::record_sink_send(sink.name(), true);
                }
                Err(e) => {
                    metrics.inc_failure_count();
                    obs::record_sink_send(sink.name(), false);
                    error!(sink = sink.name(), uid = %event.uid, error = %e, "Send event failed");
                }
            }
        }
    }

    fn set_state(&self, state: ControllerState) {
        *self.state.lock() = state;
    }

    /// Close every sink and mark the controller stopped
    async fn finish(&self) {
        for sink in &self.sinks {
            if let Err(e) = sink.close().await {
                error!(sink = sink.name(), error = %e, "Close failed on shutdown");
            }
        }
        self.set_state(ControllerState::Stopped);
        info!(
            received = self.metrics.received(),
            stale = self.metrics.stale(),
            processed = self.metrics.processed(),
            "Stopping event controller"
        );
    }
}

/// Marks the item done when dropped, including on unwind
struct DoneGuard<'a> {
    shared: &'a Shared,
    event: &'a Arc<ClusterEvent>,
}

impl Drop for DoneGuard<'_> {
    fn drop(&mut self) {
        self.shared.queue.done(self.event);
        self.shared.metrics.inc_processed();
    }
}

async fn worker_loop(shared: Arc<Shared>) {
    while let Some(event) = shared.queue.get().await {
        let _done = DoneGuard {
            shared: &shared,
            event: &event,
        };
        shared.process(&event).await;
    }
}

/// Run a worker until the queue shuts down, restarting it after a panic
async fn supervise_worker(shared: Arc<Shared>, id: usize, stop: CancellationToken) {
    loop {
        match tokio::spawn(worker_loop(Arc::clone(&shared))).await {
            Ok(()) => break,
            Err(e) => {
                error!(worker = id, error = %e, "Worker panicked, restarting");
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = tokio::time::sleep(WORKER_RESTART_PERIOD) => {}
                }
                if shared.queue.is_shutting_down() {
                    break;
                }
            }
        }
    }
    debug!(worker = id, "Worker stopped");
}

/// Read-only view of a controller, usable while `run` owns it
#[derive(Clone)]
pub struct ControllerHandle {
    shared: Arc<Shared>,
}

impl ControllerHandle {
    pub fn state(&self) -> ControllerState {
        *self.shared.state.lock()
    }

    /// Whether the initial cache sync completed
    pub fn has_synced(&self) -> bool {
        self.shared.synced.load(Ordering::Acquire)
    }

    pub fn metrics(&self) -> &ControllerMetrics {
        &self.shared.metrics
    }

    /// Per-sink counters in registration order
    pub fn sink_metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.shared
            .sinks
            .iter()
            .zip(&self.shared.sink_metrics)
            .map(|(sink, metrics)| (sink.name().to_string(), metrics.snapshot()))
            .collect()
    }

    /// Items waiting in the queue
    pub fn queue_len(&self) -> usize {
        self.shared.queue.len()
    }

    /// Items currently held by workers
    pub fn in_flight(&self) -> usize {
        self.shared.queue.in_flight()
    }
}

/// Distributes cluster events to the configured sinks
pub struct EventController<S> {
    source: S,
    shared: Arc<Shared>,
    sync_timeout: Duration,
}

impl<S: EventSource> EventController<S> {
    /// Bind the event source and the sink list
    pub fn new(source: S, sinks: SinkSet, config: ControllerConfig) -> Self {
        let sink_metrics = sinks.iter().map(|_| Arc::new(SinkMetrics::new())).collect();
        Self {
            source,
            shared: Arc::new(Shared {
                sinks,
                sink_metrics,
                queue: EventQueue::new(),
                staleness: StalenessFilter::new(config.staleness_window),
                metrics: ControllerMetrics::new(),
                state: Mutex::new(ControllerState::Constructed),
                synced: AtomicBool::new(false),
            }),
            sync_timeout: config.sync_timeout,
        }
    }

    /// Observer for state and counters
    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Run until `stop` fires
    ///
    /// Blocks on the initial cache sync first. A sync that does not complete
    /// is logged and reported as `RunOutcome::SyncAborted`; it is not an
    /// error.
    #[instrument(name = "event_controller_run", skip(self, stop))]
    pub async fn run(mut self, workers: usize, stop: CancellationToken) -> RunOutcome {
        info!(sinks = self.shared.sinks.len(), "Starting event controller");
        self.shared.set_state(ControllerState::Watching);

        if !self.wait_for_sync(&stop).await {
            error!("Wait for cache sync failed");
            self.shared.queue.shutdown();
            self.shared.finish().await;
            return RunOutcome::SyncAborted;
        }

        self.shared.synced.store(true, Ordering::Release);
        self.shared.set_state(ControllerState::Running);
        info!("Informer cache synced, controller started");

        let workers: Vec<JoinHandle<()>> = (0..workers.max(1))
            .map(|id| tokio::spawn(supervise_worker(Arc::clone(&self.shared), id, stop.clone())))
            .collect();

        let mut source_open = true;
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                next = self.source.next(), if source_open => match next {
                    Some(notification) => self.shared.handle(notification),
                    None => {
                        warn!("Event source ended, waiting for stop signal");
                        source_open = false;
                    }
                },
            }
        }

        self.shared.queue.shutdown();
        for worker in workers {
            if let Err(e) = worker.await {
                error!(error = %e, "Worker task failed");
            }
        }
        self.shared.finish().await;
        RunOutcome::Stopped
    }

    /// Pump notifications until the source reports `Synced`
    async fn wait_for_sync(&mut self, stop: &CancellationToken) -> bool {
        let deadline = tokio::time::sleep(self.sync_timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = stop.cancelled() => {
                    warn!("Stop requested before cache sync");
                    return false;
                }
                _ = &mut deadline => {
                    error!(timeout = ?self.sync_timeout, "Timed out waiting for cache sync");
                    return false;
                }
                next = self.source.next() => match next {
                    Some(Notification::Synced) => return true,
                    Some(notification) => self.shared.handle(notification),
                    None => {
                        error!("Event source ended before cache sync");
                        return false;
                    }
                },
            }
        }
    }
}
