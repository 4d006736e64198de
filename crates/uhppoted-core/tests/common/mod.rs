// Scripted in-memory controller fleet shared by the core integration tests.
#![allow(dead_code, clippy::unwrap_used)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use uhppoted_api::{
    ControllerApi, ControllerResponse, DoorControlResponse, DoorMode, EventRecord,
    OpenDoorResponse, RecordSpecialEventsResponse, StatusResponse, Target, TimeResponse,
};
use uhppoted_core::{ControllerConfig, CoreConfig, DoorConfig, PollIntervals};

pub const ALPHA: u32 = 405_419_896;
pub const BRAVO: u32 = 303_986_753;

// ── Fake controller ─────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FakeController {
    pub relays: u8,
    pub buttons: [bool; 4],
    pub doors_open: [bool; 4],
    /// Event log; record `n` lives at position `n - 1`.
    pub events: Vec<EventRecord>,
    pub controls: [(DoorMode, u8); 4],
    pub failing: bool,
    /// Log indices whose `get_event` request goes unanswered.
    pub failing_events: BTreeSet<u32>,
    pub latency: Duration,
    /// Reply as if from this serial instead.
    pub impostor: Option<u32>,
    pub opens: bool,
}

impl Default for FakeController {
    fn default() -> Self {
        Self {
            relays: 0,
            buttons: [false; 4],
            doors_open: [false; 4],
            events: Vec::new(),
            controls: [(DoorMode::Controlled, 5); 4],
            failing: false,
            failing_events: BTreeSet::new(),
            latency: Duration::ZERO,
            impostor: None,
            opens: true,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct Calls {
    pub get_status: usize,
    pub get_event: Vec<u32>,
    pub open_door: usize,
    pub set_door_control: Vec<(u32, u8, DoorMode, u8)>,
    pub record_special_events: usize,
}

#[derive(Default)]
struct State {
    controllers: BTreeMap<u32, FakeController>,
    calls: Calls,
}

#[derive(Clone, Default)]
pub struct FakeApi {
    state: Arc<Mutex<State>>,
}

impl FakeApi {
    pub fn with_controllers(serials: &[u32]) -> Self {
        let api = Self::default();
        for serial in serials {
            api.controller(*serial, |_| {});
        }
        api
    }

    /// Mutate (or create) a fake controller.
    pub fn controller(&self, serial: u32, f: impl FnOnce(&mut FakeController)) {
        let mut state = self.state.lock().unwrap();
        f(state.controllers.entry(serial).or_default());
    }

    /// Append `n` card-swipe records to a controller's log.
    pub fn log_events(&self, serial: u32, n: u32) {
        self.controller(serial, |c| {
            for _ in 0..n {
                let index = u32::try_from(c.events.len()).unwrap() + 1;
                c.events.push(record(serial, index, 1));
            }
        });
    }

    pub fn calls(&self) -> Calls {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn reset_calls(&self) {
        self.state.lock().unwrap().calls = Calls::default();
    }

    /// Look up the scripted controller, recording the call first.
    async fn answer<T>(
        &self,
        serial: u32,
        note: impl FnOnce(&mut Calls),
        f: impl FnOnce(u32, &mut FakeController) -> T,
    ) -> Result<T, uhppoted_api::Error> {
        let (latency, failing) = {
            let mut state = self.state.lock().unwrap();
            note(&mut state.calls);
            let c = state.controllers.entry(serial).or_default();
            (c.latency, c.failing)
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if failing {
            return Err(uhppoted_api::Error::Timeout {
                controller: serial,
                timeout_ms: 1000,
            });
        }
        let mut state = self.state.lock().unwrap();
        let c = state.controllers.entry(serial).or_default();
        let echo = c.impostor.unwrap_or(serial);
        Ok(f(echo, c))
    }
}

pub fn record(controller: u32, index: u32, reason: u8) -> EventRecord {
    EventRecord {
        controller,
        index,
        event_type: 1,
        access_granted: true,
        door: 1,
        direction: 1,
        card: 10_058_400,
        timestamp: None,
        reason,
    }
}

fn status(echo: u32, c: &FakeController) -> StatusResponse {
    let event = c
        .events
        .last()
        .cloned()
        .unwrap_or_else(|| record(echo, 0, 0));
    StatusResponse {
        controller: echo,
        event,
        door_open: c.doors_open,
        door_button: c.buttons,
        system_error: 0,
        system_datetime: None,
        sequence_no: 0,
        special_info: 0,
        relays: c.relays,
        inputs: 0,
    }
}

fn slot(door: u8) -> usize {
    usize::from(door.clamp(1, 4) - 1)
}

impl ControllerApi for FakeApi {
    async fn get_controller(&self, target: Target) -> Result<ControllerResponse, uhppoted_api::Error> {
        self.answer(target.serial, |_| {}, |echo, _| ControllerResponse {
            controller: echo,
            ip_address: "192.168.1.100".parse().unwrap(),
            subnet_mask: "255.255.255.0".parse().unwrap(),
            gateway: "192.168.1.1".parse().unwrap(),
            mac_address: "00:12:23:34:45:56".to_owned(),
            version: "v8.92".to_owned(),
            date: chrono::NaiveDate::from_ymd_opt(2018, 11, 5),
        })
        .await
    }

    async fn get_time(&self, target: Target) -> Result<TimeResponse, uhppoted_api::Error> {
        self.answer(target.serial, |_| {}, |echo, _| TimeResponse {
            controller: echo,
            datetime: chrono::NaiveDate::from_ymd_opt(2024, 11, 5)
                .and_then(|d| d.and_hms_opt(12, 34, 56))
                .unwrap(),
        })
        .await
    }

    async fn get_status(&self, target: Target) -> Result<StatusResponse, uhppoted_api::Error> {
        self.answer(target.serial, |calls| calls.get_status += 1, |echo, c| status(echo, c))
            .await
    }

    async fn get_door_control(
        &self,
        target: Target,
        door: u8,
    ) -> Result<DoorControlResponse, uhppoted_api::Error> {
        self.answer(target.serial, |_| {}, |echo, c| {
            let (mode, delay) = c.controls[slot(door)];
            DoorControlResponse {
                controller: echo,
                door,
                mode,
                delay,
            }
        })
        .await
    }

    async fn set_door_control(
        &self,
        target: Target,
        door: u8,
        mode: DoorMode,
        delay: u8,
    ) -> Result<DoorControlResponse, uhppoted_api::Error> {
        let serial = target.serial;
        self.answer(
            serial,
            |calls| calls.set_door_control.push((serial, door, mode, delay)),
            |echo, c| {
                c.controls[slot(door)] = (mode, delay);
                DoorControlResponse {
                    controller: echo,
                    door,
                    mode,
                    delay,
                }
            },
        )
        .await
    }

    async fn open_door(&self, target: Target, _door: u8) -> Result<OpenDoorResponse, uhppoted_api::Error> {
        self.answer(target.serial, |calls| calls.open_door += 1, |echo, c| OpenDoorResponse {
            controller: echo,
            opened: c.opens,
        })
        .await
    }

    async fn get_event(&self, target: Target, index: u32) -> Result<EventRecord, uhppoted_api::Error> {
        let serial = target.serial;
        self.answer(serial, |calls| calls.get_event.push(index), |echo, c| {
            if c.failing_events.contains(&index) {
                return Err(uhppoted_api::Error::Timeout {
                    controller: serial,
                    timeout_ms: 1000,
                });
            }
            Ok(usize::try_from(index)
                .ok()
                .and_then(|i| i.checked_sub(1))
                .and_then(|i| c.events.get(i).cloned())
                .unwrap_or_else(|| record(echo, 0, 0)))
        })
        .await?
    }

    async fn record_special_events(
        &self,
        target: Target,
        _enable: bool,
    ) -> Result<RecordSpecialEventsResponse, uhppoted_api::Error> {
        self.answer(
            target.serial,
            |calls| calls.record_special_events += 1,
            |echo, _| RecordSpecialEventsResponse {
                controller: echo,
                updated: true,
            },
        )
        .await
    }
}

// ── Config helpers ──────────────────────────────────────────────────

/// Two controllers, two doors on ALPHA, no timers or listener.
pub fn config() -> CoreConfig {
    CoreConfig {
        controllers: vec![ControllerConfig::new(ALPHA), ControllerConfig::new(BRAVO)],
        doors: vec![
            DoorConfig {
                name: "front".to_owned(),
                controller: ALPHA,
                door: 1,
            },
            DoorConfig {
                name: "garage".to_owned(),
                controller: ALPHA,
                door: 3,
            },
        ],
        intervals: PollIntervals {
            doors: Duration::ZERO,
            events: Duration::ZERO,
            info: Duration::ZERO,
        },
        listen_events: false,
        ..CoreConfig::default()
    }
}
