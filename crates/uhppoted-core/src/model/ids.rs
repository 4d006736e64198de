// ── Identity types ──
//
// Controllers are identified by serial number; doors by the pair
// (controller serial, door number). `ContextKey` unifies both as the key a
// consumer subscribes with.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ── DoorId ──────────────────────────────────────────────────────────

/// A door on a specific controller. Displays as `serial/door`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DoorId {
    pub controller: u32,
    pub door: u8,
}

impl DoorId {
    pub fn new(controller: u32, door: u8) -> Self {
        Self { controller, door }
    }
}

impl fmt::Display for DoorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.controller, self.door)
    }
}

impl FromStr for DoorId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (controller, door) = s
            .split_once('/')
            .ok_or_else(|| format!("expected <controller>/<door>, got '{s}'"))?;
        let controller = controller
            .trim()
            .parse()
            .map_err(|_| format!("invalid controller serial '{controller}'"))?;
        let door = door
            .trim()
            .parse()
            .map_err(|_| format!("invalid door number '{door}'"))?;
        Ok(Self { controller, door })
    }
}

// ── ContextKey ──────────────────────────────────────────────────────

/// A consumer's subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum ContextKey {
    Controller(u32),
    Door(DoorId),
}

impl ContextKey {
    pub fn controller(&self) -> u32 {
        match self {
            Self::Controller(serial) => *serial,
            Self::Door(door) => door.controller,
        }
    }
}

impl From<DoorId> for ContextKey {
    fn from(door: DoorId) -> Self {
        Self::Door(door)
    }
}

impl From<u32> for ContextKey {
    fn from(serial: u32) -> Self {
        Self::Controller(serial)
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Controller(serial) => write!(f, "controller:{serial}"),
            Self::Door(door) => write!(f, "door:{door}"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn door_id_display_and_parse() {
        let id = DoorId::new(405_419_896, 3);
        assert_eq!(id.to_string(), "405419896/3");
        assert_eq!("405419896/3".parse::<DoorId>().unwrap(), id);
        assert!("405419896".parse::<DoorId>().is_err());
        assert!("x/1".parse::<DoorId>().is_err());
    }

    #[test]
    fn context_keys_order_controllers_before_doors() {
        let mut keys = vec![
            ContextKey::Door(DoorId::new(1, 2)),
            ContextKey::Controller(2),
            ContextKey::Door(DoorId::new(1, 1)),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                ContextKey::Controller(2),
                ContextKey::Door(DoorId::new(1, 1)),
                ContextKey::Door(DoorId::new(1, 2)),
            ]
        );
        assert_eq!(keys[1].controller(), 1);
        assert_eq!(keys[0].to_string(), "controller:2");
    }
}
