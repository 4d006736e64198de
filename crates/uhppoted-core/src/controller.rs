// ── Engine facade ──
//
// Owns the three coordinators, the shared context set and the background
// tasks: one poll loop per enabled coordinator, the listener bridge and the
// command processor.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uhppoted_api::{ControllerApi, EventListener, UhppoteClient};

use crate::command::{Command, CommandEnvelope, CommandResult};
use crate::config::CoreConfig;
use crate::coordinator::doors::DoorPoller;
use crate::coordinator::events::{EventCallback, EventCoordinator, listen_task};
use crate::coordinator::info::InfoPoller;
use crate::coordinator::{CoordinatorKind, CoordinatorStatus, call, poll_task};
use crate::error::CoreError;
use crate::model::{
    ContextKey, ControllerEvents, ControllerInfo, ControllerStatus, DoorId, DoorStatus, Event,
};
use crate::store::{Contexts, Entry, Snapshot};
use crate::stream::SnapshotStream;

const COMMAND_CHANNEL_SIZE: usize = 64;

// ── Uhppoted ─────────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<Inner>`. Nothing talks to a controller until
/// [`start()`](Self::start) spawns the poll loops, or one of the
/// `refresh_*` methods runs a tick on demand.
pub struct Uhppoted<A: ControllerApi = UhppoteClient> {
    inner: Arc<Inner<A>>,
}

impl<A: ControllerApi> Clone for Uhppoted<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<A: ControllerApi> {
    config: Arc<CoreConfig>,
    api: Arc<A>,
    contexts: Arc<Contexts>,
    doors: DoorPoller<A>,
    events: Arc<EventCoordinator<A>>,
    info: InfoPoller<A>,
    command_tx: mpsc::Sender<CommandEnvelope>,
    command_rx: Mutex<Option<mpsc::Receiver<CommandEnvelope>>>,
    started: AtomicBool,
    cancel: CancellationToken,
    listener: Mutex<Option<EventListener>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Uhppoted<UhppoteClient> {
    /// Create an engine that talks UDP using the configured transport.
    pub fn new(config: CoreConfig) -> Result<Self, CoreError> {
        let api = UhppoteClient::new(config.transport.clone());
        Self::with_api(config, api)
    }

    /// One-shot: run `f` against an engine with no poll loops or listener.
    ///
    /// Intended for CLI commands that need a single request-response cycle.
    pub async fn oneshot<F, Fut, T>(config: CoreConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Self) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut cfg = config;
        cfg.intervals.doors = std::time::Duration::ZERO;
        cfg.intervals.events = std::time::Duration::ZERO;
        cfg.intervals.info = std::time::Duration::ZERO;
        cfg.listen_events = false;

        let engine = Self::new(cfg)?;
        engine.start().await;
        let result = f(engine.clone()).await;
        engine.stop().await;
        result
    }
}

impl<A: ControllerApi> Uhppoted<A> {
    /// Create an engine over any [`ControllerApi`] implementation.
    pub fn with_api(config: CoreConfig, api: A) -> Result<Self, CoreError> {
        config.validate()?;

        let config = Arc::new(config);
        let api = Arc::new(api);
        let contexts = Arc::new(Contexts::new());
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);

        Ok(Self {
            inner: Arc::new(Inner {
                doors: DoorPoller::new(Arc::clone(&api), Arc::clone(&config), Arc::clone(&contexts)),
                events: Arc::new(EventCoordinator::new(
                    Arc::clone(&api),
                    Arc::clone(&config),
                    Arc::clone(&contexts),
                )),
                info: InfoPoller::new(Arc::clone(&api), Arc::clone(&config), Arc::clone(&contexts)),
                config,
                api,
                contexts,
                command_tx,
                command_rx: Mutex::new(Some(command_rx)),
                started: AtomicBool::new(false),
                cancel: CancellationToken::new(),
                listener: Mutex::new(None),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.inner.config
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the background tasks: a poll loop per coordinator with a
    /// nonzero interval, the event listener and the command processor.
    ///
    /// A listener that cannot bind is logged and skipped; polling carries on.
    pub async fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let config = &self.inner.config;
        let cancel = &self.inner.cancel;
        let mut handles = self.inner.task_handles.lock().await;

        if let Some(rx) = self.inner.command_rx.lock().await.take() {
            handles.push(tokio::spawn(command_processor_task(self.clone(), rx)));
        }

        for kind in [
            CoordinatorKind::Doors,
            CoordinatorKind::Events,
            CoordinatorKind::Info,
        ] {
            let period = match kind {
                CoordinatorKind::Doors => config.intervals.doors,
                CoordinatorKind::Events => config.intervals.events,
                CoordinatorKind::Info => config.intervals.info,
            };
            if period.is_zero() {
                debug!(coordinator = %kind, "polling disabled");
                continue;
            }
            let engine = self.clone();
            handles.push(tokio::spawn(poll_task(kind, period, cancel.clone(), move || {
                let engine = engine.clone();
                async move { engine.refresh(kind).await }
            })));
        }

        if config.listen_events {
            match EventListener::bind(config.transport.listen, cancel.child_token()).await {
                Ok(listener) => {
                    let rx = listener.subscribe();
                    handles.push(tokio::spawn(listen_task(
                        Arc::clone(&self.inner.events),
                        rx,
                        cancel.clone(),
                    )));
                    *self.inner.listener.lock().await = Some(listener);
                }
                Err(e) => {
                    warn!(error = %e, "event listener not started");
                }
            }
        }

        info!(
            controllers = config.controllers.len(),
            doors = config.doors.len(),
            "engine started"
        );
    }

    /// Cancel the background tasks and wait for them to finish.
    pub async fn stop(&self) {
        self.inner.cancel.cancel();

        if let Some(listener) = self.inner.listener.lock().await.take() {
            listener.shutdown();
        }

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("engine stopped");
    }

    // ── On-demand ticks ──────────────────────────────────────────────

    pub async fn refresh(&self, kind: CoordinatorKind) -> Result<(), CoreError> {
        match kind {
            CoordinatorKind::Doors => self.refresh_doors().await,
            CoordinatorKind::Events => self.refresh_events().await,
            CoordinatorKind::Info => self.refresh_info().await,
        }
    }

    pub async fn refresh_doors(&self) -> Result<(), CoreError> {
        self.inner.doors.refresh().await
    }

    pub async fn refresh_events(&self) -> Result<(), CoreError> {
        self.inner.events.refresh().await
    }

    pub async fn refresh_info(&self) -> Result<(), CoreError> {
        self.inner.info.refresh().await
    }

    // ── Contexts ─────────────────────────────────────────────────────

    /// Subscribe to a controller or door. The new key is published as
    /// unavailable straight away and populated by the next tick.
    pub fn add_context(&self, key: ContextKey) -> bool {
        let added = self.inner.contexts.insert(key);
        match key {
            ContextKey::Door(door) => {
                self.inner.doors.store().seed([door]);
            }
            ContextKey::Controller(serial) => {
                self.inner.events.store().seed([serial]);
                self.inner.info.store().seed([serial]);
            }
        }
        added
    }

    /// Unsubscribe. The key disappears from the next published snapshot.
    pub fn remove_context(&self, key: ContextKey) -> bool {
        let removed = self.inner.contexts.remove(&key);
        match key {
            ContextKey::Door(door) => {
                self.inner.doors.store().remove(&door);
            }
            ContextKey::Controller(serial) => {
                self.inner.events.store().remove(&serial);
                self.inner.info.store().remove(&serial);
            }
        }
        removed
    }

    pub fn contexts(&self) -> Arc<BTreeSet<ContextKey>> {
        self.inner.contexts.all()
    }

    // ── Command execution ────────────────────────────────────────────

    /// Execute a command through the command processor.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        if !self.inner.started.load(Ordering::SeqCst) || self.inner.cancel.is_cancelled() {
            return Err(CoreError::Unavailable {
                reason: "engine is not running".into(),
            });
        }

        let (tx, rx) = tokio::sync::oneshot::channel();
        self.inner
            .command_tx
            .send(CommandEnvelope {
                command: cmd,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::Internal("command processor stopped".into()))?;

        rx.await
            .map_err(|_| CoreError::Internal("command dropped".into()))?
    }

    // ── Event observation ────────────────────────────────────────────

    /// Every new event, logged or synthetic, as it is committed.
    pub fn subscribe_events(&self) -> broadcast::Receiver<Arc<Event>> {
        self.inner.events.subscribe()
    }

    /// Install a callback invoked once per new logged event.
    pub fn on_event(&self, callback: impl Fn(&Event) + Send + Sync + 'static) {
        let callback: EventCallback = Box::new(callback);
        self.inner.events.on_event(callback);
    }

    pub fn remembered_index(&self, serial: u32) -> Option<u32> {
        self.inner.events.remembered_index(serial)
    }

    // ── Coordinator health ───────────────────────────────────────────

    pub fn coordinator_status(&self, kind: CoordinatorKind) -> CoordinatorStatus {
        match kind {
            CoordinatorKind::Doors => self.inner.doors.status().current(),
            CoordinatorKind::Events => self.inner.events.status().current(),
            CoordinatorKind::Info => self.inner.info.status().current(),
        }
    }

    pub fn watch_status(&self, kind: CoordinatorKind) -> watch::Receiver<CoordinatorStatus> {
        match kind {
            CoordinatorKind::Doors => self.inner.doors.status().subscribe(),
            CoordinatorKind::Events => self.inner.events.status().subscribe(),
            CoordinatorKind::Info => self.inner.info.status().subscribe(),
        }
    }

    // ── Snapshot accessors ───────────────────────────────────────────

    pub fn doors_snapshot(&self) -> Snapshot<DoorId, DoorStatus> {
        self.inner.doors.store().snapshot()
    }

    pub fn events_snapshot(&self) -> Snapshot<u32, ControllerEvents> {
        self.inner.events.store().snapshot()
    }

    pub fn info_snapshot(&self) -> Snapshot<u32, ControllerInfo> {
        self.inner.info.store().snapshot()
    }

    pub fn door(&self, door: DoorId) -> Option<Entry<DoorStatus>> {
        self.inner.doors.store().get(&door)
    }

    /// Recent events for a controller, newest first.
    pub fn recent_events(&self, serial: u32) -> Vec<Event> {
        self.inner
            .events
            .store()
            .get(&serial)
            .and_then(|entry| entry.value)
            .map(|value| value.events)
            .unwrap_or_default()
    }

    // ── Stream accessors ─────────────────────────────────────────────

    pub fn doors(&self) -> SnapshotStream<DoorId, DoorStatus> {
        SnapshotStream::new(self.inner.doors.store().subscribe())
    }

    pub fn events(&self) -> SnapshotStream<u32, ControllerEvents> {
        SnapshotStream::new(self.inner.events.store().subscribe())
    }

    pub fn controllers(&self) -> SnapshotStream<u32, ControllerInfo> {
        SnapshotStream::new(self.inner.info.store().subscribe())
    }

    // ── Direct reads ─────────────────────────────────────────────────

    pub async fn controller_info(&self, serial: u32) -> Result<ControllerInfo, CoreError> {
        self.inner.info.fetch(serial).await
    }

    pub async fn controller_time(&self, serial: u32) -> Result<chrono::NaiveDateTime, CoreError> {
        let target = self.inner.config.target(serial);
        let reply = call(
            serial,
            self.inner.config.transport.timeout,
            self.inner.api.get_time(target),
        )
        .await?;
        Ok(reply.datetime)
    }

    /// Live status plus the most recent logged event.
    pub async fn controller_status(
        &self,
        serial: u32,
    ) -> Result<(ControllerStatus, Event), CoreError> {
        let target = self.inner.config.target(serial);
        let status = call(
            serial,
            self.inner.config.transport.timeout,
            self.inner.api.get_status(target),
        )
        .await?;
        Ok((ControllerStatus::from(&status), Event::from(&status.event)))
    }

    /// Fetch one logged event by index.
    pub async fn get_event(&self, serial: u32, index: u32) -> Result<Event, CoreError> {
        let target = self.inner.config.target(serial);
        let record = call(
            serial,
            self.inner.config.transport.timeout,
            self.inner.api.get_event(target, index),
        )
        .await?;
        if record.index != index {
            return Err(CoreError::OperationFailed {
                message: format!("event {index} not found on controller {serial}"),
            });
        }
        Ok(Event::from(&record))
    }

    pub async fn door_status(&self, door: DoorId) -> Result<DoorStatus, CoreError> {
        self.inner.doors.fetch(door).await
    }

    /// Resolve a configured door name.
    pub fn door_id(&self, name: &str) -> Result<DoorId, CoreError> {
        self.inner
            .config
            .door_by_name(name)
            .map(crate::config::DoorConfig::id)
            .ok_or_else(|| CoreError::DoorNotFound {
                identifier: name.to_owned(),
            })
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Process commands from the mpsc channel, one at a time.
async fn command_processor_task<A: ControllerApi>(
    engine: Uhppoted<A>,
    mut rx: mpsc::Receiver<CommandEnvelope>,
) {
    let cancel = engine.inner.cancel.clone();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let result = route_command(&engine, envelope.command).await;
                let _ = envelope.response_tx.send(result);
            }
        }
    }
}

async fn route_command<A: ControllerApi>(
    engine: &Uhppoted<A>,
    cmd: Command,
) -> Result<CommandResult, CoreError> {
    let doors = &engine.inner.doors;

    match cmd {
        Command::SetDoorMode { door, mode } => {
            doors.set_door_mode(door, mode).await.map(CommandResult::DoorControl)
        }
        Command::SetDoorDelay { door, delay } => {
            doors.set_door_delay(door, delay).await.map(CommandResult::DoorControl)
        }
        Command::UnlockDoor { door } => {
            let reply = doors.unlock_door(door).await?;
            Ok(CommandResult::Unlocked { door, reply })
        }
        Command::UnlockDoorByName { name } => {
            let (door, reply) = doors.unlock_door_by_name(&name).await?;
            Ok(CommandResult::Unlocked { door, reply })
        }
    }
}
