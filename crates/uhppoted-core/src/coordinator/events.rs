// ── Event stream coordinator ──
//
// Merges two sources into one bounded recent-event list per controller:
//
// - the active path: each tick fetches status and walks the controller's
//   event log forward from the remembered index, at most
//   `max_events_per_tick` records at a time;
// - the passive path: pushed notifications from the UDP listener, applied
//   to the controller's slot and published immediately.
//
// Both paths also diff the relay and button bitmasks against the previous
// observation to synthesize lock/unlock and button-release events.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uhppoted_api::{ControllerApi, EventRecord, MAX_DOORS, StatusResponse, door_mask};

use super::{CoordinatorKind, StatusCell, call, fan_out, within_budget};
use crate::config::CoreConfig;
use crate::error::CoreError;
use crate::model::{ContextKey, ControllerEvents, ControllerStatus, Event, EventReason};
use crate::store::{Contexts, Entry, Publish, RecentEvents, SlotStore};

const EVENT_CHANNEL_SIZE: usize = 256;

/// Callback invoked once per newly observed logged event.
pub type EventCallback = Box<dyn Fn(&Event) + Send + Sync>;

pub(crate) type EventStore = SlotStore<u32, EventSlot>;

// ── Per-controller slot ──────────────────────────────────────────────

/// Bookkeeping and published state for one controller.
#[derive(Debug, Default)]
pub(crate) struct EventSlot {
    index: Option<u32>,
    relays: Option<u8>,
    buttons: Option<[bool; 4]>,
    recent: RecentEvents,
    status: Option<ControllerStatus>,
    available: bool,
    updated: Option<DateTime<Utc>>,
}

/// Result of one controller's active-path fetch.
#[derive(Debug)]
pub(crate) struct Polled {
    /// Remembered index when the walk started.
    remembered: Option<u32>,
    status: StatusResponse,
    /// Log records fetched this tick, in ascending index order.
    records: Vec<EventRecord>,
}

impl EventSlot {
    pub(crate) fn index(&self) -> Option<u32> {
        self.index
    }

    /// Merge a tick's fetch. Returns the new events, logged ones first.
    fn apply_poll(&mut self, polled: &Polled, now: NaiveDateTime, capacity: usize) -> Vec<Event> {
        let controller = polled.status.controller;
        let live = polled.status.event_index();
        let mut events = Vec::new();

        match polled.remembered {
            // First observation: adopt the live index, no replay.
            None => {
                if self.index.is_none() {
                    self.index = Some(live);
                }
            }
            // Controller reset or rollover.
            Some(remembered) if live < remembered => {
                info!(controller, remembered, live, "event index went backwards, resetting");
                self.index = Some(live);
            }
            Some(_) => {
                for record in &polled.records {
                    if !self.recent.contains_index(record.index) {
                        events.push(Event::from(record));
                    }
                }
                if let Some(last) = polled.records.last().map(|r| r.index) {
                    self.index = Some(self.index.map_or(last, |i| i.max(last)));
                }
            }
        }

        events.extend(self.transitions(
            controller,
            polled.status.relays,
            polled.status.door_button,
            now,
        ));
        self.commit(&polled.status, &events, capacity);
        events
    }

    /// Merge a pushed notification. Returns the new events.
    fn apply_notification(
        &mut self,
        status: &StatusResponse,
        now: NaiveDateTime,
        capacity: usize,
    ) -> Vec<Event> {
        let index = status.event_index();
        let mut events = Vec::new();

        let seen = self.index == Some(index) || self.recent.contains_index(index);
        if !seen {
            if let Some(remembered) = self.index.filter(|i| index < *i) {
                info!(
                    controller = status.controller,
                    remembered,
                    live = index,
                    "event index went backwards, resetting"
                );
            }
            events.push(Event::from(&status.event));
            self.index = Some(index);
        }

        events.extend(self.transitions(status.controller, status.relays, status.door_button, now));
        self.commit(status, &events, capacity);
        events
    }

    fn mark_unavailable(&mut self) {
        self.available = false;
    }

    /// Diff bitmasks against the previous observation and remember the new ones.
    fn transitions(
        &mut self,
        controller: u32,
        relays: u8,
        buttons: [bool; 4],
        now: NaiveDateTime,
    ) -> Vec<Event> {
        let mut events = Vec::new();
        if let Some(previous) = self.relays {
            events.extend(relay_transitions(controller, previous, relays, now));
        }
        if let Some(previous) = self.buttons {
            events.extend(button_releases(controller, previous, buttons, now));
        }
        self.relays = Some(relays);
        self.buttons = Some(buttons);
        events
    }

    fn commit(&mut self, status: &StatusResponse, events: &[Event], capacity: usize) {
        self.recent.set_capacity(capacity);
        for event in events {
            self.recent.push(event.clone());
        }
        self.status = Some(ControllerStatus::from(status));
        self.available = true;
        self.updated = Some(Utc::now());
    }
}

impl Publish for EventSlot {
    type View = ControllerEvents;

    fn view(&self) -> Entry<ControllerEvents> {
        if !self.available {
            return Entry::unavailable(self.updated);
        }
        Entry {
            available: true,
            value: Some(ControllerEvents {
                index: self.index,
                status: self.status.clone(),
                events: self.recent.to_vec(),
            }),
            updated: self.updated,
        }
    }
}

// ── Transition detection ─────────────────────────────────────────────

/// DOOR_UNLOCKED for each relay bit that became set, DOOR_LOCKED for each
/// that cleared, in ascending door order.
pub(crate) fn relay_transitions(
    controller: u32,
    previous: u8,
    current: u8,
    now: NaiveDateTime,
) -> Vec<Event> {
    (1..=MAX_DOORS)
        .filter_map(|door| {
            let mask = door_mask(door);
            if previous & mask == current & mask {
                return None;
            }
            let reason = if current & mask == mask {
                EventReason::DoorUnlocked
            } else {
                EventReason::DoorLocked
            };
            Some(Event::synthetic(controller, door, reason, now))
        })
        .collect()
}

/// BUTTON_RELEASED for each button that changed to not-pressed.
pub(crate) fn button_releases(
    controller: u32,
    previous: [bool; 4],
    current: [bool; 4],
    now: NaiveDateTime,
) -> Vec<Event> {
    (1..=MAX_DOORS)
        .zip(previous.into_iter().zip(current))
        .filter(|(_, (was, is))| was != is && !is)
        .map(|(door, _)| Event::synthetic(controller, door, EventReason::ButtonReleased, now))
        .collect()
}

// ── Coordinator ──────────────────────────────────────────────────────

pub struct EventCoordinator<A: ControllerApi> {
    api: Arc<A>,
    config: Arc<CoreConfig>,
    contexts: Arc<Contexts>,
    store: EventStore,
    status: StatusCell,
    initialised: AtomicBool,
    event_tx: broadcast::Sender<Arc<Event>>,
    notify: ArcSwapOption<EventCallback>,
}

impl<A: ControllerApi> EventCoordinator<A> {
    pub(crate) fn new(api: Arc<A>, config: Arc<CoreConfig>, contexts: Arc<Contexts>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            api,
            config,
            contexts,
            store: EventStore::new(),
            status: StatusCell::new(CoordinatorKind::Events),
            initialised: AtomicBool::new(false),
            event_tx,
            notify: ArcSwapOption::empty(),
        }
    }

    pub(crate) fn store(&self) -> &EventStore {
        &self.store
    }

    pub(crate) fn status(&self) -> &StatusCell {
        &self.status
    }

    /// Every new event, logged or synthetic.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Event>> {
        self.event_tx.subscribe()
    }

    /// Install the callback for newly observed logged events.
    pub fn on_event(&self, callback: EventCallback) {
        self.notify.store(Some(Arc::new(callback)));
    }

    /// Remembered event index for a controller.
    pub fn remembered_index(&self, serial: u32) -> Option<u32> {
        self.store.read(&serial, EventSlot::index).flatten()
    }

    /// Run one tick and record its outcome.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        let result = self.tick().await;
        self.status.record(&result);
        result
    }

    async fn tick(&self) -> Result<(), CoreError> {
        if !self.initialised.swap(true, Ordering::SeqCst) {
            self.contexts.extend(
                self.config
                    .controllers
                    .iter()
                    .map(|c| ContextKey::Controller(c.serial)),
            );
        }

        let controllers = self.contexts.controllers();
        self.store.seed(controllers.iter().copied());
        if controllers.is_empty() {
            return Ok(());
        }

        let mut polled = within_budget(
            CoordinatorKind::Events,
            self.config.tick_timeout,
            fan_out(controllers, self.config.concurrency, |serial| async move {
                (serial, self.poll_controller(serial).await)
            }),
        )
        .await?;
        polled.sort_by_key(|(serial, _)| *serial);

        let now = Local::now().naive_local();
        let capacity = self.config.recent_events;
        let mut emitted = Vec::new();
        let mut keys = Vec::with_capacity(polled.len());

        for (serial, result) in polled {
            if !self.contexts.contains(&ContextKey::Controller(serial)) {
                continue;
            }
            let merged = match result {
                Ok(p) => self
                    .store
                    .update(serial, |slot| slot.apply_poll(&p, now, capacity))
                    .map(|events| emitted.extend(events)),
                Err(e) => {
                    warn!(controller = serial, error = %e, "controller events unavailable");
                    self.store.update(serial, EventSlot::mark_unavailable)
                }
            };
            // Unsubscribed while the tick was in flight.
            if merged.is_some() {
                keys.push(serial);
            }
        }

        self.store.publish(keys);
        self.dispatch(emitted);
        Ok(())
    }

    /// Active path for one controller: enable special events, fetch status,
    /// then walk the event log forward from the remembered index.
    async fn poll_controller(&self, serial: u32) -> Result<Polled, CoreError> {
        let target = self.config.target(serial);
        let timeout = self.config.transport.timeout;

        if self.config.record_special_events {
            match call(serial, timeout, self.api.record_special_events(target, true)).await {
                Ok(reply) if !reply.updated => {
                    warn!(controller = serial, "record special events not enabled");
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(controller = serial, error = %e, "error enabling record special events");
                }
            }
        }

        let status = call(serial, timeout, self.api.get_status(target)).await?;
        let live = status.event_index();
        let remembered = self.remembered_index(serial);

        let mut records = Vec::new();
        if let Some(mut ix) = remembered {
            let mut attempts = 0;
            while ix < live && attempts < self.config.max_events_per_tick {
                attempts += 1;
                let next = ix + 1;
                match call(serial, timeout, self.api.get_event(target, next)).await {
                    Ok(record) if record.index == next => {
                        records.push(record);
                        ix = next;
                    }
                    Ok(record) => {
                        warn!(controller = serial, expected = next, got = record.index, "event index mismatch");
                        break;
                    }
                    Err(e) => {
                        warn!(controller = serial, index = next, error = %e, "error fetching event");
                        break;
                    }
                }
            }
        }

        debug!(
            controller = serial,
            live,
            remembered = ?remembered,
            fetched = records.len(),
            "controller events polled"
        );
        Ok(Polled {
            remembered,
            status,
            records,
        })
    }

    /// Passive path: apply one pushed notification and publish it.
    pub fn handle_notification(&self, status: &StatusResponse) {
        let serial = status.controller;
        if !self.contexts.contains(&ContextKey::Controller(serial)) {
            debug!(controller = serial, "ignoring event from unsubscribed controller");
            return;
        }

        let now = Local::now().naive_local();
        let capacity = self.config.recent_events;
        let Some(events) = self
            .store
            .update(serial, |slot| slot.apply_notification(status, now, capacity))
        else {
            return;
        };
        self.store.publish([serial]);
        self.dispatch(events);
    }

    fn dispatch(&self, events: Vec<Event>) {
        let notify = self.notify.load();
        for event in events {
            let event = Arc::new(event);
            if !event.is_synthetic() {
                if let Some(callback) = notify.as_ref() {
                    callback(&*event);
                }
            }
            // No subscribers is fine.
            let _ = self.event_tx.send(event);
        }
    }
}

/// Forward listener notifications to the coordinator until cancelled.
pub(crate) async fn listen_task<A: ControllerApi>(
    coordinator: Arc<EventCoordinator<A>>,
    mut rx: broadcast::Receiver<Arc<StatusResponse>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            received = rx.recv() => match received {
                Ok(status) => coordinator.handle_notification(&status),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event listener lagged, notifications dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
    debug!("listener bridge exiting");
}
