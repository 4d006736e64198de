// ── Domain model ──
//
// Canonical types published by the coordinators. Wire-level reply types
// stay in `uhppoted-api`; these are what consumers read.

pub mod controller;
pub mod door;
pub mod event;
pub mod ids;

pub use controller::{ControllerEvents, ControllerInfo, ControllerStatus};
pub use door::{DoorState, DoorStatus};
pub use event::{Event, EventReason};
pub use ids::{ContextKey, DoorId};
