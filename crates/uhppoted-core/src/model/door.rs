use serde::{Deserialize, Serialize};
use uhppoted_api::{DoorMode, StatusResponse};

/// Physical state of one door, as last reported in a controller status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorState {
    pub open: Option<bool>,
    pub button: Option<bool>,
    pub locked: Option<bool>,
}

impl DoorState {
    /// Extract door `door` (1-4) from a status reply. The lock state is the
    /// inverse of the door's relay bit.
    pub fn from_status(status: &StatusResponse, door: u8) -> Self {
        Self {
            open: status.is_open(door),
            button: status.is_pressed(door),
            locked: status.is_unlocked(door).map(|unlocked| !unlocked),
        }
    }

    /// Space-separated summary, e.g. `PRESSED UNLOCKED OPEN`.
    /// Unknown fields are omitted.
    pub fn describe(&self) -> String {
        let mut parts = Vec::with_capacity(3);
        if self.button == Some(true) {
            parts.push("PRESSED");
        }
        match self.locked {
            Some(false) => parts.push("UNLOCKED"),
            Some(true) => parts.push("LOCKED"),
            None => {}
        }
        match self.open {
            Some(false) => parts.push("CLOSED"),
            Some(true) => parts.push("OPEN"),
            None => {}
        }
        parts.join(" ")
    }
}

/// Published state of one door: its control settings plus physical state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorStatus {
    pub mode: DoorMode,
    /// Unlock delay in seconds.
    pub delay: u8,
    #[serde(flatten)]
    pub state: DoorState,
}
