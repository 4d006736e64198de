use std::net::Ipv4Addr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uhppoted_api::{ControllerResponse, StatusResponse};

use super::event::Event;

/// Network and firmware details for one controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerInfo {
    pub serial: u32,
    pub address: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub mac: String,
    pub firmware: String,
    pub firmware_date: Option<NaiveDate>,
    /// Controller clock, if `get-time` answered in the same tick.
    pub datetime: Option<NaiveDateTime>,
}

impl ControllerInfo {
    pub fn new(reply: ControllerResponse, datetime: Option<NaiveDateTime>) -> Self {
        Self {
            serial: reply.controller,
            address: reply.ip_address,
            netmask: reply.subnet_mask,
            gateway: reply.gateway,
            mac: reply.mac_address,
            firmware: reply.version,
            firmware_date: reply.date,
            datetime,
        }
    }
}

/// Controller status detail retained alongside its recent events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerStatus {
    pub event_index: u32,
    /// Bit `n` set = door `n+1` unlocked.
    pub relays: u8,
    pub inputs: u8,
    pub door_open: [bool; 4],
    pub door_button: [bool; 4],
    pub system_error: u8,
    pub system_datetime: Option<NaiveDateTime>,
    pub sequence_no: u32,
}

impl From<&StatusResponse> for ControllerStatus {
    fn from(status: &StatusResponse) -> Self {
        Self {
            event_index: status.event_index(),
            relays: status.relays,
            inputs: status.inputs,
            door_open: status.door_open,
            door_button: status.door_button,
            system_error: status.system_error,
            system_datetime: status.system_datetime,
            sequence_no: status.sequence_no,
        }
    }
}

/// Published event state for one controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerEvents {
    /// Last event index seen.
    pub index: Option<u32>,
    pub status: Option<ControllerStatus>,
    /// Most recent events, newest first.
    pub events: Vec<Event>,
}
