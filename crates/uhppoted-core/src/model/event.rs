// ── Events ──
//
// An `Event` is either a record from a controller's on-board event log
// (real index, real type) or a transition synthesized locally from two
// consecutive status bitmasks (no index, no type).

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uhppoted_api::EventRecord;

/// Reason code attached to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventReason {
    /// Door push button pressed (device code 20).
    ButtonPressed,
    /// Door contact opened (device code 23).
    DoorOpen,
    /// Door contact closed (device code 24).
    DoorClosed,
    /// Any other device reason code.
    Other(u8),

    // Synthesized locally from status bitmask transitions.
    DoorLocked,
    DoorUnlocked,
    ButtonReleased,
}

impl EventReason {
    pub const BUTTON_PRESSED: u8 = 20;
    pub const DOOR_OPEN: u8 = 23;
    pub const DOOR_CLOSED: u8 = 24;

    /// The device reason code, or `None` for synthesized reasons.
    pub fn code(self) -> Option<u8> {
        match self {
            Self::ButtonPressed => Some(Self::BUTTON_PRESSED),
            Self::DoorOpen => Some(Self::DOOR_OPEN),
            Self::DoorClosed => Some(Self::DOOR_CLOSED),
            Self::Other(code) => Some(code),
            Self::DoorLocked | Self::DoorUnlocked | Self::ButtonReleased => None,
        }
    }

    pub fn is_synthetic(self) -> bool {
        self.code().is_none()
    }
}

impl From<u8> for EventReason {
    fn from(code: u8) -> Self {
        match code {
            Self::BUTTON_PRESSED => Self::ButtonPressed,
            Self::DOOR_OPEN => Self::DoorOpen,
            Self::DOOR_CLOSED => Self::DoorClosed,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for EventReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ButtonPressed => f.write_str("BUTTON_PRESSED"),
            Self::DoorOpen => f.write_str("DOOR_OPEN"),
            Self::DoorClosed => f.write_str("DOOR_CLOSED"),
            Self::Other(code) => write!(f, "{code}"),
            Self::DoorLocked => f.write_str("DOOR_LOCKED"),
            Self::DoorUnlocked => f.write_str("DOOR_UNLOCKED"),
            Self::ButtonReleased => f.write_str("BUTTON_RELEASED"),
        }
    }
}

/// An immutable controller event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub controller: u32,
    /// Position in the controller's event log; `None` for synthetic events.
    pub index: Option<u32>,
    pub event_type: Option<u8>,
    pub access_granted: Option<bool>,
    pub door: u8,
    pub direction: Option<u8>,
    pub card: Option<u32>,
    pub timestamp: Option<NaiveDateTime>,
    pub reason: EventReason,
}

impl Event {
    /// A locally derived transition event.
    pub fn synthetic(
        controller: u32,
        door: u8,
        reason: EventReason,
        timestamp: NaiveDateTime,
    ) -> Self {
        Self {
            controller,
            index: None,
            event_type: None,
            access_granted: None,
            door,
            direction: None,
            card: None,
            timestamp: Some(timestamp),
            reason,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.index.is_none()
    }

    /// Event index with `-1` standing in for synthetic events.
    pub fn display_index(&self) -> i64 {
        self.index.map_or(-1, i64::from)
    }

    pub fn is_door_open(&self) -> bool {
        self.reason == EventReason::DoorOpen
    }

    pub fn is_door_closed(&self) -> bool {
        self.reason == EventReason::DoorClosed
    }

    pub fn is_button_pressed(&self) -> bool {
        self.reason == EventReason::ButtonPressed
    }

    pub fn is_button_released(&self) -> bool {
        self.reason == EventReason::ButtonReleased
    }
}

impl From<&EventRecord> for Event {
    fn from(record: &EventRecord) -> Self {
        Self {
            controller: record.controller,
            index: Some(record.index),
            event_type: Some(record.event_type),
            access_granted: Some(record.access_granted),
            door: record.door,
            direction: Some(record.direction),
            card: Some(record.card),
            timestamp: record.timestamp,
            reason: EventReason::from(record.reason),
        }
    }
}
