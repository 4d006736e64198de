//! Typed controller client.
//!
//! [`UhppoteClient`] wraps a [`UdpTransport`] with one method per controller
//! command. Every reply is decoded and its echoed serial number checked
//! against the controller that was addressed; a reply from any other
//! controller is reported as [`Error::Mismatch`] and never returned as data.
//!
//! The [`ControllerApi`] trait is the seam the coordinators in
//! `uhppoted-core` are written against, so they can be driven by a scripted
//! fake in tests.

use std::future::Future;
use std::net::SocketAddr;

use crate::codec::{self, Decode, Request};
use crate::error::Error;
use crate::models::{
    ControllerResponse, DoorControlResponse, DoorMode, EventRecord, OpenDoorResponse,
    RecordSpecialEventsResponse, StatusResponse, TimeResponse,
};
use crate::transport::{TransportConfig, UdpTransport};

// ── Target ───────────────────────────────────────────────────────────

/// Addressing for one controller: its serial number and, optionally, a
/// unicast address. Controllers without an address are reached by broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    pub serial: u32,
    pub address: Option<SocketAddr>,
}

impl Target {
    pub fn new(serial: u32, address: Option<SocketAddr>) -> Self {
        Self { serial, address }
    }
}

impl From<u32> for Target {
    fn from(serial: u32) -> Self {
        Self {
            serial,
            address: None,
        }
    }
}

// ── ControllerApi ────────────────────────────────────────────────────

/// One async operation per controller command.
pub trait ControllerApi: Send + Sync + 'static {
    fn get_controller(
        &self,
        target: Target,
    ) -> impl Future<Output = Result<ControllerResponse, Error>> + Send;

    fn get_time(&self, target: Target) -> impl Future<Output = Result<TimeResponse, Error>> + Send;

    fn get_status(
        &self,
        target: Target,
    ) -> impl Future<Output = Result<StatusResponse, Error>> + Send;

    fn get_door_control(
        &self,
        target: Target,
        door: u8,
    ) -> impl Future<Output = Result<DoorControlResponse, Error>> + Send;

    fn set_door_control(
        &self,
        target: Target,
        door: u8,
        mode: DoorMode,
        delay: u8,
    ) -> impl Future<Output = Result<DoorControlResponse, Error>> + Send;

    fn open_door(
        &self,
        target: Target,
        door: u8,
    ) -> impl Future<Output = Result<OpenDoorResponse, Error>> + Send;

    fn get_event(
        &self,
        target: Target,
        index: u32,
    ) -> impl Future<Output = Result<EventRecord, Error>> + Send;

    fn record_special_events(
        &self,
        target: Target,
        enable: bool,
    ) -> impl Future<Output = Result<RecordSpecialEventsResponse, Error>> + Send;
}

// ── UhppoteClient ────────────────────────────────────────────────────

/// UDP client for UHPPOTE-compatible access controllers.
#[derive(Debug, Clone, Default)]
pub struct UhppoteClient {
    transport: UdpTransport,
}

impl UhppoteClient {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            transport: UdpTransport::new(config),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        self.transport.config()
    }

    /// Send one request, decode the reply and check the echoed serial.
    async fn call<T>(&self, target: Target, request: Request) -> Result<T, Error>
    where
        T: Decode + Echo,
    {
        let function = request.function;
        let bytes = self.transport.send(&request, target.address).await?;
        let reply: T = codec::decode(&bytes, function)?;

        if reply.controller() != target.serial {
            tracing::debug!(
                controller = target.serial,
                got = reply.controller(),
                "reply from unexpected controller"
            );
            return Err(Error::controller_mismatch(target.serial, reply.controller()));
        }
        Ok(reply)
    }
}

impl ControllerApi for UhppoteClient {
    async fn get_controller(&self, target: Target) -> Result<ControllerResponse, Error> {
        self.call(target, Request::get_controller(target.serial)).await
    }

    async fn get_time(&self, target: Target) -> Result<TimeResponse, Error> {
        self.call(target, Request::get_time(target.serial)).await
    }

    async fn get_status(&self, target: Target) -> Result<StatusResponse, Error> {
        self.call(target, Request::get_status(target.serial)).await
    }

    async fn get_door_control(&self, target: Target, door: u8) -> Result<DoorControlResponse, Error> {
        self.call(target, Request::get_door_control(target.serial, door))
            .await
    }

    async fn set_door_control(
        &self,
        target: Target,
        door: u8,
        mode: DoorMode,
        delay: u8,
    ) -> Result<DoorControlResponse, Error> {
        self.call(
            target,
            Request::set_door_control(target.serial, door, mode, delay),
        )
        .await
    }

    async fn open_door(&self, target: Target, door: u8) -> Result<OpenDoorResponse, Error> {
        self.call(target, Request::open_door(target.serial, door)).await
    }

    async fn get_event(&self, target: Target, index: u32) -> Result<EventRecord, Error> {
        self.call(target, Request::get_event(target.serial, index))
            .await
    }

    async fn record_special_events(
        &self,
        target: Target,
        enable: bool,
    ) -> Result<RecordSpecialEventsResponse, Error> {
        self.call(target, Request::record_special_events(target.serial, enable))
            .await
    }
}

// ── Echo ─────────────────────────────────────────────────────────────

/// Replies that echo the addressed controller's serial number.
pub trait Echo {
    fn controller(&self) -> u32;
}

macro_rules! impl_echo {
    ($($ty:ty),+ $(,)?) => {
        $(impl Echo for $ty {
            fn controller(&self) -> u32 {
                self.controller
            }
        })+
    };
}

impl_echo!(
    ControllerResponse,
    TimeResponse,
    StatusResponse,
    DoorControlResponse,
    OpenDoorResponse,
    EventRecord,
    RecordSpecialEventsResponse,
);
