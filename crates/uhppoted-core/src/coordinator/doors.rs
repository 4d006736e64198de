// ── Door state poller ──
//
// Per tick: fetch status from every controller that owns a subscribed door,
// then fetch each door's control record and merge it with its controller's
// status. Failures are isolated per controller and per door. Also hosts the
// user-initiated door mutations.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::TryFutureExt;
use tracing::{debug, info, warn};
use uhppoted_api::{
    ControllerApi, DoorControlResponse, DoorMode, MAX_DOORS, OpenDoorResponse, StatusResponse,
};

use super::{CoordinatorKind, StatusCell, call, fan_out, within_budget};
use crate::config::CoreConfig;
use crate::error::{CoreError, mutation_error};
use crate::model::{ContextKey, DoorId, DoorState, DoorStatus};
use crate::store::{Contexts, Entry, SlotStore};

pub(crate) type DoorStore = SlotStore<DoorId, Entry<DoorStatus>>;

pub struct DoorPoller<A: ControllerApi> {
    api: Arc<A>,
    config: Arc<CoreConfig>,
    contexts: Arc<Contexts>,
    store: DoorStore,
    status: StatusCell,
    initialised: AtomicBool,
}

impl<A: ControllerApi> DoorPoller<A> {
    pub(crate) fn new(api: Arc<A>, config: Arc<CoreConfig>, contexts: Arc<Contexts>) -> Self {
        Self {
            api,
            config,
            contexts,
            store: DoorStore::new(),
            status: StatusCell::new(CoordinatorKind::Doors),
            initialised: AtomicBool::new(false),
        }
    }

    pub(crate) fn store(&self) -> &DoorStore {
        &self.store
    }

    pub(crate) fn status(&self) -> &StatusCell {
        &self.status
    }

    /// Run one tick and record its outcome.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        let result = self.tick().await;
        self.status.record(&result);
        result
    }

    async fn tick(&self) -> Result<(), CoreError> {
        if !self.initialised.swap(true, Ordering::SeqCst) {
            self.contexts
                .extend(self.config.doors.iter().map(|d| ContextKey::Door(d.id())));
        }

        let doors = self.contexts.doors();
        self.store.seed(doors.iter().copied());
        if doors.is_empty() {
            return Ok(());
        }

        let results = within_budget(
            CoordinatorKind::Doors,
            self.config.tick_timeout,
            self.poll(&doors),
        )
        .await?;

        // Whole-tick merge. Doors unsubscribed mid-tick are skipped.
        let keys: Vec<DoorId> = results
            .into_iter()
            .filter(|(door, _)| self.contexts.contains(&ContextKey::Door(*door)))
            .filter_map(|(door, entry)| {
                self.store
                    .update(door, |slot| *slot = entry)
                    .map(|()| door)
            })
            .collect();
        self.store.publish(keys);
        Ok(())
    }

    /// Fetch controller status, then door control, for every door.
    async fn poll(&self, doors: &BTreeSet<DoorId>) -> Vec<(DoorId, Entry<DoorStatus>)> {
        let controllers: BTreeSet<u32> = doors.iter().map(|d| d.controller).collect();
        let limit = self.config.concurrency;

        let statuses: HashMap<u32, StatusResponse> =
            fan_out(controllers, limit, |serial| async move {
                match self.fetch_status(serial).await {
                    Ok(status) => Some((serial, status)),
                    Err(e) => {
                        warn!(controller = serial, error = %e, "door status unavailable");
                        None
                    }
                }
            })
            .await
            .into_iter()
            .flatten()
            .collect();

        let statuses = &statuses;
        fan_out(doors.iter().copied(), limit, |door| async move {
            let previous = self.store.read(&door, |e| e.updated).flatten();
            let Some(status) = statuses.get(&door.controller) else {
                return (door, Entry::unavailable(previous));
            };
            match self.fetch_control(door).await {
                Ok(control) => {
                    let state = DoorState::from_status(status, door.door);
                    debug!(%door, mode = %control.mode, state = %state.describe(), "door updated");
                    (
                        door,
                        Entry::available(DoorStatus {
                            mode: control.mode,
                            delay: control.delay,
                            state,
                        }),
                    )
                }
                Err(e) => {
                    warn!(%door, error = %e, "door control unavailable");
                    (door, Entry::unavailable(previous))
                }
            }
        })
        .await
    }

    async fn fetch_status(&self, serial: u32) -> Result<StatusResponse, CoreError> {
        let target = self.config.target(serial);
        call(
            serial,
            self.config.transport.timeout,
            self.api.get_status(target),
        )
        .await
    }

    async fn fetch_control(&self, door: DoorId) -> Result<DoorControlResponse, CoreError> {
        validate_door(door.door)?;
        let target = self.config.target(door.controller);
        let control = call(
            door.controller,
            self.config.transport.timeout,
            self.api.get_door_control(target, door.door),
        )
        .await?;

        if control.door != door.door {
            return Err(CoreError::Unavailable {
                reason: format!("reply for door {}, expected door {}", control.door, door.door),
            });
        }
        Ok(control)
    }

    /// One-off read of a single door's status and control settings.
    pub async fn fetch(&self, door: DoorId) -> Result<DoorStatus, CoreError> {
        let status = self.fetch_status(door.controller).await?;
        let control = self.fetch_control(door).await?;
        Ok(DoorStatus {
            mode: control.mode,
            delay: control.delay,
            state: DoorState::from_status(&status, door.door),
        })
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Change a door's control mode, keeping its current delay.
    pub async fn set_door_mode(
        &self,
        door: DoorId,
        mode: DoorMode,
    ) -> Result<DoorControlResponse, CoreError> {
        if matches!(mode, DoorMode::Unknown(_)) {
            return Err(CoreError::ValidationFailed {
                message: format!("unsupported door mode {}", mode.to_byte()),
            });
        }
        let current = self.current_control(door).await?;
        self.write_control(door, mode, current.delay).await
    }

    /// Change a door's unlock delay, keeping its current mode.
    pub async fn set_door_delay(
        &self,
        door: DoorId,
        delay: u8,
    ) -> Result<DoorControlResponse, CoreError> {
        if !(1..=60).contains(&delay) {
            return Err(CoreError::InvalidDelay { delay });
        }
        let current = self.current_control(door).await?;
        self.write_control(door, current.mode, delay).await
    }

    /// Remotely open a door. Only an echoed `opened` flag counts as success.
    pub async fn unlock_door(&self, door: DoorId) -> Result<OpenDoorResponse, CoreError> {
        validate_door(door.door)?;
        let target = self.config.target(door.controller);

        let reply = self.mutate(door, self.api.open_door(target, door.door)).await?;

        if reply.controller != door.controller {
            return Err(CoreError::ValidationFailed {
                message: format!(
                    "open-door reply from controller {}, expected {}",
                    reply.controller, door.controller
                ),
            });
        }
        if !reply.opened {
            return Err(CoreError::OperationFailed {
                message: format!("controller did not open door {door}"),
            });
        }

        info!(%door, "door unlocked");
        Ok(reply)
    }

    /// Resolve a configured door name and open it.
    pub async fn unlock_door_by_name(
        &self,
        name: &str,
    ) -> Result<(DoorId, OpenDoorResponse), CoreError> {
        let door = self
            .config
            .door_by_name(name)
            .map(crate::config::DoorConfig::id)
            .ok_or_else(|| CoreError::DoorNotFound {
                identifier: name.to_owned(),
            })?;
        let reply = self.unlock_door(door).await?;
        Ok((door, reply))
    }

    async fn current_control(&self, door: DoorId) -> Result<DoorControlResponse, CoreError> {
        validate_door(door.door)?;
        let target = self.config.target(door.controller);
        let current = self
            .mutate(door, self.api.get_door_control(target, door.door))
            .await?;
        verify_echo(door, &current, "get-door-control")?;
        Ok(current)
    }

    /// A mutation request under the per-call timeout.
    async fn mutate<T>(
        &self,
        door: DoorId,
        request: impl Future<Output = Result<T, uhppoted_api::Error>>,
    ) -> Result<T, CoreError> {
        call(
            door.controller,
            self.config.transport.timeout,
            request.map_err(mutation_error),
        )
        .await
    }

    /// The hardware has no single-field setter: write the combined triple.
    async fn write_control(
        &self,
        door: DoorId,
        mode: DoorMode,
        delay: u8,
    ) -> Result<DoorControlResponse, CoreError> {
        let target = self.config.target(door.controller);
        let reply = self
            .mutate(door, self.api.set_door_control(target, door.door, mode, delay))
            .await?;
        verify_echo(door, &reply, "set-door-control")?;

        info!(%door, mode = %reply.mode, delay = reply.delay, "door control updated");

        // Reflect the new settings without waiting for the next tick.
        let refreshed = self.store.read(&door, |e| e.available).unwrap_or(false);
        if refreshed {
            self.store.update(door, |entry| {
                if let Some(status) = entry.value.as_mut() {
                    status.mode = reply.mode;
                    status.delay = reply.delay;
                }
            });
            self.store.publish([door]);
        }
        Ok(reply)
    }
}

fn validate_door(door: u8) -> Result<(), CoreError> {
    if (1..=MAX_DOORS).contains(&door) {
        Ok(())
    } else {
        Err(CoreError::InvalidDoor { door })
    }
}

fn verify_echo(door: DoorId, reply: &DoorControlResponse, op: &str) -> Result<(), CoreError> {
    if reply.controller == door.controller && reply.door == door.door {
        Ok(())
    } else {
        Err(CoreError::ValidationFailed {
            message: format!(
                "invalid response to {op}: got {}/{}, expected {door}",
                reply.controller, reply.door
            ),
        })
    }
}
