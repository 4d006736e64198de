// uhppoted-core: Polling and event coordination between uhppoted-api and consumers (CLI, integrations).

pub mod command;
pub mod config;
pub mod controller;
pub mod coordinator;
pub mod error;
pub mod model;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandResult};
pub use config::{ControllerConfig, CoreConfig, DoorConfig, PollIntervals};
pub use controller::Uhppoted;
pub use coordinator::events::EventCallback;
pub use coordinator::{CoordinatorKind, CoordinatorStatus};
pub use error::CoreError;
pub use store::{Entry, Snapshot};
pub use stream::{SnapshotStream, SnapshotWatchStream};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    ContextKey, ControllerEvents, ControllerInfo, ControllerStatus, DoorId, DoorState, DoorStatus,
    Event, EventReason,
};

// Wire-level types consumers need to drive commands or plug in a transport.
pub use uhppoted_api::{ControllerApi, DoorMode, TransportConfig, UhppoteClient};
