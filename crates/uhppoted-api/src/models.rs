// Reply payloads decoded from controller datagrams.
//
// Field names follow the controller's own terminology. Door-indexed
// arrays are zero-based (`door_open[0]` is door 1); use the accessor
// methods when working with 1-based door numbers.

use std::fmt;
use std::net::Ipv4Addr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Number of doors a controller can manage.
pub const MAX_DOORS: u8 = 4;

/// Bitmask for a 1-based door number, or `0` if out of range.
pub fn door_mask(door: u8) -> u8 {
    match door {
        1..=MAX_DOORS => 1 << (door - 1),
        _ => 0,
    }
}

// ── Door control mode ────────────────────────────────────────────────

/// Door control mode as stored on the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoorMode {
    /// Normally open: the door is held unlocked.
    Unlocked,
    /// Normally closed: the door is held locked.
    Locked,
    /// Controlled by card access.
    Controlled,
    /// Any other value reported by the controller.
    Unknown(u8),
}

impl DoorMode {
    pub fn to_byte(self) -> u8 {
        match self {
            Self::Unlocked => 1,
            Self::Locked => 2,
            Self::Controlled => 3,
            Self::Unknown(v) => v,
        }
    }
}

impl From<u8> for DoorMode {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::Unlocked,
            2 => Self::Locked,
            3 => Self::Controlled,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for DoorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlocked => f.write_str("UNLOCKED"),
            Self::Locked => f.write_str("LOCKED"),
            Self::Controlled => f.write_str("CONTROLLED"),
            Self::Unknown(_) => f.write_str("UNKNOWN"),
        }
    }
}

// ── Event records ────────────────────────────────────────────────────

/// One entry of the controller's on-board event log.
///
/// Returned by `get-event` and embedded in every status reply and
/// pushed notification (describing the most recent event).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub controller: u32,
    pub index: u32,
    pub event_type: u8,
    pub access_granted: bool,
    pub door: u8,
    pub direction: u8,
    pub card: u32,
    pub timestamp: Option<NaiveDateTime>,
    pub reason: u8,
}

// ── Status ───────────────────────────────────────────────────────────

/// Reply to `get-status`, and the payload of unsolicited event notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub controller: u32,
    /// Most recent event. `event.index` is the controller's live event index.
    pub event: EventRecord,
    pub door_open: [bool; 4],
    pub door_button: [bool; 4],
    pub system_error: u8,
    pub system_datetime: Option<NaiveDateTime>,
    pub sequence_no: u32,
    pub special_info: u8,
    /// Bit `n` set = door `n+1` lock relay energized (unlocked).
    pub relays: u8,
    pub inputs: u8,
}

impl StatusResponse {
    pub fn event_index(&self) -> u32 {
        self.event.index
    }

    /// Door open sensor for a 1-based door number.
    pub fn is_open(&self, door: u8) -> Option<bool> {
        door_slot(&self.door_open, door)
    }

    /// Door button input for a 1-based door number.
    pub fn is_pressed(&self, door: u8) -> Option<bool> {
        door_slot(&self.door_button, door)
    }

    /// `true` if the door's relay is energized.
    pub fn is_unlocked(&self, door: u8) -> Option<bool> {
        let mask = door_mask(door);
        (mask != 0).then_some(self.relays & mask == mask)
    }
}

fn door_slot(values: &[bool; 4], door: u8) -> Option<bool> {
    if door == 0 {
        return None;
    }
    values.get(usize::from(door - 1)).copied()
}

// ── Door control ─────────────────────────────────────────────────────

/// Reply to `get-door-control` and `set-door-control`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorControlResponse {
    pub controller: u32,
    pub door: u8,
    pub mode: DoorMode,
    /// Unlock delay in seconds.
    pub delay: u8,
}

/// Reply to `open-door`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenDoorResponse {
    pub controller: u32,
    pub opened: bool,
}

/// Reply to `record-special-events`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSpecialEventsResponse {
    pub controller: u32,
    pub updated: bool,
}

// ── Controller info ──────────────────────────────────────────────────

/// Reply to `get-controller`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerResponse {
    pub controller: u32,
    pub ip_address: Ipv4Addr,
    pub subnet_mask: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub mac_address: String,
    /// Firmware version, e.g. `v6.62`.
    pub version: String,
    /// Firmware release date.
    pub date: Option<NaiveDate>,
}

/// Reply to `get-time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeResponse {
    pub controller: u32,
    pub datetime: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn door_mask_covers_four_doors() {
        assert_eq!(door_mask(1), 0x01);
        assert_eq!(door_mask(2), 0x02);
        assert_eq!(door_mask(3), 0x04);
        assert_eq!(door_mask(4), 0x08);
        assert_eq!(door_mask(0), 0);
        assert_eq!(door_mask(5), 0);
    }

    #[test]
    fn door_mode_byte_mapping() {
        assert_eq!(DoorMode::from(1), DoorMode::Unlocked);
        assert_eq!(DoorMode::from(2), DoorMode::Locked);
        assert_eq!(DoorMode::from(3), DoorMode::Controlled);
        assert_eq!(DoorMode::from(9), DoorMode::Unknown(9));
        assert_eq!(DoorMode::Controlled.to_byte(), 3);
        assert_eq!(DoorMode::Unknown(9).to_string(), "UNKNOWN");
    }
}
