// ── Runtime configuration ──
//
// These types describe which controllers and doors to coordinate and how
// often to poll them. They never touch disk: the CLI (via uhppoted-config)
// builds a `CoreConfig` and hands it in.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

use uhppoted_api::{MAX_DOORS, Target, TransportConfig};

use crate::error::CoreError;
use crate::model::DoorId;

/// A configured controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    pub serial: u32,
    /// Display name.
    pub name: Option<String>,
    /// Unicast address. `None` reaches the controller by broadcast.
    pub address: Option<SocketAddr>,
    /// IANA timezone name of the controller's local clock.
    pub timezone: Option<String>,
}

impl ControllerConfig {
    pub fn new(serial: u32) -> Self {
        Self {
            serial,
            name: None,
            address: None,
            timezone: None,
        }
    }

    pub fn target(&self) -> Target {
        Target::new(self.serial, self.address)
    }
}

/// A configured door, mapped to exactly one controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoorConfig {
    pub name: String,
    pub controller: u32,
    /// Door number, 1-4.
    pub door: u8,
}

impl DoorConfig {
    pub fn id(&self) -> DoorId {
        DoorId::new(self.controller, self.door)
    }
}

/// Per-coordinator poll intervals. A zero interval disables the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
    pub doors: Duration,
    pub events: Duration,
    pub info: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            doors: Duration::from_secs(30),
            events: Duration::from_secs(30),
            info: Duration::from_secs(60),
        }
    }
}

/// Everything the coordinators need to run.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub transport: TransportConfig,
    pub controllers: Vec<ControllerConfig>,
    pub doors: Vec<DoorConfig>,
    pub intervals: PollIntervals,
    /// Budget for one whole poll tick; an overrunning tick is abandoned.
    pub tick_timeout: Duration,
    /// Maximum concurrent controller or door requests within a tick.
    pub concurrency: usize,
    /// Number of recent events kept per controller.
    pub recent_events: usize,
    /// Maximum event log records fetched per controller per tick.
    pub max_events_per_tick: u32,
    /// Bind the passive listener for pushed event notifications.
    pub listen_events: bool,
    /// Ask controllers to log door and button events on every events tick.
    pub record_special_events: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            controllers: Vec::new(),
            doors: Vec::new(),
            intervals: PollIntervals::default(),
            tick_timeout: Duration::from_millis(2500),
            concurrency: 5,
            recent_events: 16,
            max_events_per_tick: 16,
            listen_events: true,
            record_special_events: true,
        }
    }
}

impl CoreConfig {
    /// Check the controller and door tables for consistency.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.concurrency == 0 {
            return Err(config_error("concurrency must be at least 1"));
        }
        if self.recent_events == 0 {
            return Err(config_error("recent event capacity must be at least 1"));
        }

        let mut serials = HashSet::new();
        for controller in &self.controllers {
            if controller.serial == 0 {
                return Err(config_error("controller serial number 0 is reserved"));
            }
            if !serials.insert(controller.serial) {
                return Err(config_error(format!(
                    "duplicate controller {}",
                    controller.serial
                )));
            }
        }

        let mut names = HashSet::new();
        let mut ids = HashSet::new();
        for door in &self.doors {
            if door.name.trim().is_empty() {
                return Err(config_error("door name must not be empty"));
            }
            if !(1..=MAX_DOORS).contains(&door.door) {
                return Err(config_error(format!(
                    "door '{}': door number {} out of range (1-{MAX_DOORS})",
                    door.name, door.door
                )));
            }
            if !serials.contains(&door.controller) {
                return Err(config_error(format!(
                    "door '{}': unknown controller {}",
                    door.name, door.controller
                )));
            }
            if !names.insert(door.name.as_str()) {
                return Err(config_error(format!("duplicate door name '{}'", door.name)));
            }
            if !ids.insert(door.id()) {
                return Err(config_error(format!(
                    "door '{}': {} is already configured",
                    door.name,
                    door.id()
                )));
            }
        }

        Ok(())
    }

    pub fn controller(&self, serial: u32) -> Option<&ControllerConfig> {
        self.controllers.iter().find(|c| c.serial == serial)
    }

    /// Addressing for `serial`; unconfigured controllers are reached by broadcast.
    pub fn target(&self, serial: u32) -> Target {
        self.controller(serial)
            .map_or_else(|| Target::from(serial), ControllerConfig::target)
    }

    pub fn door_by_name(&self, name: &str) -> Option<&DoorConfig> {
        self.doors.iter().find(|d| d.name == name)
    }

    pub fn door_name(&self, id: DoorId) -> Option<&str> {
        self.doors
            .iter()
            .find(|d| d.id() == id)
            .map(|d| d.name.as_str())
    }
}

fn config_error(message: impl Into<String>) -> CoreError {
    CoreError::Config {
        message: message.into(),
    }
}
