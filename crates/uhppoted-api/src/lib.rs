// uhppoted-api: Async Rust client for UHPPOTE access controllers (UDP wire protocol + event listener)

pub mod client;
pub mod codec;
pub mod error;
pub mod listener;
pub mod models;
pub mod transport;

pub use client::{ControllerApi, Target, UhppoteClient};
pub use error::Error;
pub use listener::EventListener;
pub use models::{
    ControllerResponse, DoorControlResponse, DoorMode, EventRecord, OpenDoorResponse,
    RecordSpecialEventsResponse, StatusResponse, TimeResponse, MAX_DOORS, door_mask,
};
pub use transport::{TransportConfig, UdpTransport};
