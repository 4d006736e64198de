// ── Command API ──
//
// User-initiated mutations flow through a unified `Command` enum. The
// facade routes each variant to the door poller, which talks to the
// controller and validates the echoed reply.

use uhppoted_api::{DoorControlResponse, DoorMode, OpenDoorResponse};

use crate::error::CoreError;
use crate::model::DoorId;

/// A command envelope sent through the command channel.
/// Contains the command and a oneshot response channel.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

/// All write operations against the controllers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Change the control mode, keeping the current delay.
    SetDoorMode { door: DoorId, mode: DoorMode },
    /// Change the unlock delay (1-60 s), keeping the current mode.
    SetDoorDelay { door: DoorId, delay: u8 },
    UnlockDoor { door: DoorId },
    /// Unlock a door by its configured name.
    UnlockDoorByName { name: String },
}

/// Result of a command execution.
#[derive(Debug, Clone)]
pub enum CommandResult {
    DoorControl(DoorControlResponse),
    Unlocked { door: DoorId, reply: OpenDoorResponse },
}
