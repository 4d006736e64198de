//! Fixed-layout 64-byte wire codec.
//!
//! Every request, reply and pushed event notification is exactly
//! [`PACKET_SIZE`] bytes:
//!
//! | offset | size | field                                   |
//! |--------|------|-----------------------------------------|
//! | 0      | 1    | start-of-message (`0x17`, `0x19` events) |
//! | 1      | 1    | function code                            |
//! | 2      | 2    | reserved                                 |
//! | 4      | 4    | controller serial number (LE)            |
//! | 8      | 56   | function-specific payload                |
//!
//! Multi-byte integers are little-endian; dates and times are packed BCD.

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::Error;
use crate::models::{
    ControllerResponse, DoorControlResponse, DoorMode, EventRecord, OpenDoorResponse,
    RecordSpecialEventsResponse, StatusResponse, TimeResponse,
};

pub const PACKET_SIZE: usize = 64;
pub const SOM: u8 = 0x17;
/// Start-of-message used by newer firmware for pushed events.
pub const SOM_V6_62: u8 = 0x19;

// ── Function codes ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Function {
    GetStatus = 0x20,
    GetTime = 0x32,
    OpenDoor = 0x40,
    SetDoorControl = 0x80,
    GetDoorControl = 0x82,
    RecordSpecialEvents = 0x8e,
    GetController = 0x94,
    GetEvent = 0xb0,
}

impl Function {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Pushed event notifications reuse the `get-status` layout and code.
pub const EVENT_NOTIFICATION: Function = Function::GetStatus;

// ── Requests ─────────────────────────────────────────────────────────

/// An encoded request datagram plus the identity needed to match its reply.
#[derive(Debug, Clone)]
pub struct Request {
    pub function: Function,
    pub controller: u32,
    pub packet: Bytes,
}

impl Request {
    fn build(function: Function, controller: u32, payload: impl FnOnce(&mut BytesMut)) -> Self {
        let mut buf = BytesMut::with_capacity(PACKET_SIZE);
        buf.put_u8(SOM);
        buf.put_u8(function.code());
        buf.put_u16(0);
        buf.put_u32_le(controller);
        payload(&mut buf);
        buf.resize(PACKET_SIZE, 0);

        Self {
            function,
            controller,
            packet: buf.freeze(),
        }
    }

    pub fn get_controller(controller: u32) -> Self {
        Self::build(Function::GetController, controller, |_| {})
    }

    pub fn get_time(controller: u32) -> Self {
        Self::build(Function::GetTime, controller, |_| {})
    }

    pub fn get_status(controller: u32) -> Self {
        Self::build(Function::GetStatus, controller, |_| {})
    }

    pub fn get_door_control(controller: u32, door: u8) -> Self {
        Self::build(Function::GetDoorControl, controller, |b| b.put_u8(door))
    }

    pub fn set_door_control(controller: u32, door: u8, mode: DoorMode, delay: u8) -> Self {
        Self::build(Function::SetDoorControl, controller, |b| {
            b.put_u8(door);
            b.put_u8(mode.to_byte());
            b.put_u8(delay);
        })
    }

    pub fn open_door(controller: u32, door: u8) -> Self {
        Self::build(Function::OpenDoor, controller, |b| b.put_u8(door))
    }

    pub fn get_event(controller: u32, index: u32) -> Self {
        Self::build(Function::GetEvent, controller, |b| b.put_u32_le(index))
    }

    pub fn record_special_events(controller: u32, enable: bool) -> Self {
        Self::build(Function::RecordSpecialEvents, controller, |b| {
            b.put_u8(u8::from(enable));
        })
    }
}

// ── Packet reader ────────────────────────────────────────────────────

/// A validated 64-byte packet with fixed-offset field accessors.
#[derive(Debug, Clone, Copy)]
pub struct Packet<'a> {
    bytes: &'a [u8; PACKET_SIZE],
}

impl<'a> Packet<'a> {
    /// Validate length, start-of-message and function code.
    pub fn parse(bytes: &'a [u8], function: Function) -> Result<Self, Error> {
        let bytes: &[u8; PACKET_SIZE] = bytes.try_into().map_err(|_| Error::InvalidLength {
            expected: PACKET_SIZE,
            actual: bytes.len(),
        })?;

        let som = bytes[0];
        if som != SOM && !(som == SOM_V6_62 && function == EVENT_NOTIFICATION) {
            return Err(Error::InvalidStartOfMessage(som));
        }

        if bytes[1] != function.code() {
            return Err(Error::UnexpectedFunction {
                expected: function.code(),
                got: bytes[1],
            });
        }

        Ok(Self { bytes })
    }

    pub fn controller(&self) -> u32 {
        self.u32(4)
    }

    fn u8(&self, offset: usize) -> u8 {
        self.bytes[offset]
    }

    fn bool(&self, offset: usize) -> bool {
        self.bytes[offset] == 0x01
    }

    fn u32(&self, offset: usize) -> u32 {
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.bytes[offset..offset + 4]);
        u32::from_le_bytes(word)
    }

    fn ipv4(&self, offset: usize) -> std::net::Ipv4Addr {
        let b = &self.bytes[offset..offset + 4];
        std::net::Ipv4Addr::new(b[0], b[1], b[2], b[3])
    }

    fn mac(&self, offset: usize) -> String {
        self.bytes[offset..offset + 6]
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(":")
    }

    fn version(&self, offset: usize) -> String {
        format!("v{:x}.{:02x}", self.bytes[offset], self.bytes[offset + 1])
    }

    /// Decode `len` packed BCD bytes into a decimal digit string.
    fn bcd(&self, offset: usize, len: usize) -> Option<String> {
        let mut digits = String::with_capacity(len * 2);
        for b in &self.bytes[offset..offset + len] {
            let (hi, lo) = (b >> 4, b & 0x0f);
            if hi > 9 || lo > 9 {
                return None;
            }
            digits.push(char::from(b'0' + hi));
            digits.push(char::from(b'0' + lo));
        }
        Some(digits)
    }

    /// `yyyymmdd`, 4 bytes.
    fn date(&self, offset: usize) -> Option<NaiveDate> {
        let s = self.bcd(offset, 4)?;
        NaiveDate::parse_from_str(&s, "%Y%m%d").ok()
    }

    /// `yymmdd`, 3 bytes, 21st century.
    fn short_date(&self, offset: usize) -> Option<NaiveDate> {
        let s = self.bcd(offset, 3)?;
        NaiveDate::parse_from_str(&format!("20{s}"), "%Y%m%d").ok()
    }

    /// `HHMMSS`, 3 bytes.
    fn time(&self, offset: usize) -> Option<NaiveTime> {
        let s = self.bcd(offset, 3)?;
        NaiveTime::parse_from_str(&s, "%H%M%S").ok()
    }

    /// `yyyymmddHHMMSS`, 7 bytes. Zeroed or invalid fields decode as `None`.
    fn optional_datetime(&self, offset: usize) -> Option<NaiveDateTime> {
        let s = self.bcd(offset, 7)?;
        NaiveDateTime::parse_from_str(&s, "%Y%m%d%H%M%S").ok()
    }

    fn datetime(&self, offset: usize) -> Result<NaiveDateTime, Error> {
        self.optional_datetime(offset)
            .ok_or(Error::InvalidDateTime { offset })
    }

    /// Event record fields shared by status, notification and get-event replies.
    fn event_record(&self) -> EventRecord {
        EventRecord {
            controller: self.controller(),
            index: self.u32(8),
            event_type: self.u8(12),
            access_granted: self.bool(13),
            door: self.u8(14),
            direction: self.u8(15),
            card: self.u32(16),
            timestamp: self.optional_datetime(20),
            reason: self.u8(27),
        }
    }
}

// ── Reply decoding ───────────────────────────────────────────────────

/// A reply payload that can be decoded from a validated packet.
pub trait Decode: Sized {
    fn decode(packet: &Packet<'_>) -> Result<Self, Error>;
}

/// Decode a raw datagram as a reply to `function`.
pub fn decode<T: Decode>(bytes: &[u8], function: Function) -> Result<T, Error> {
    let packet = Packet::parse(bytes, function)?;
    T::decode(&packet)
}

/// Decode an unsolicited event notification pushed by a controller.
pub fn decode_event_notification(bytes: &[u8]) -> Result<StatusResponse, Error> {
    decode(bytes, EVENT_NOTIFICATION)
}

impl Decode for StatusResponse {
    fn decode(p: &Packet<'_>) -> Result<Self, Error> {
        let system_datetime = match (p.short_date(51), p.time(37)) {
            (Some(date), Some(time)) => Some(date.and_time(time)),
            _ => None,
        };

        Ok(Self {
            controller: p.controller(),
            event: p.event_record(),
            door_open: [p.bool(28), p.bool(29), p.bool(30), p.bool(31)],
            door_button: [p.bool(32), p.bool(33), p.bool(34), p.bool(35)],
            system_error: p.u8(36),
            system_datetime,
            sequence_no: p.u32(40),
            special_info: p.u8(48),
            relays: p.u8(49),
            inputs: p.u8(50),
        })
    }
}

impl Decode for EventRecord {
    fn decode(p: &Packet<'_>) -> Result<Self, Error> {
        Ok(p.event_record())
    }
}

impl Decode for DoorControlResponse {
    fn decode(p: &Packet<'_>) -> Result<Self, Error> {
        Ok(Self {
            controller: p.controller(),
            door: p.u8(8),
            mode: DoorMode::from(p.u8(9)),
            delay: p.u8(10),
        })
    }
}

impl Decode for OpenDoorResponse {
    fn decode(p: &Packet<'_>) -> Result<Self, Error> {
        Ok(Self {
            controller: p.controller(),
            opened: p.bool(8),
        })
    }
}

impl Decode for RecordSpecialEventsResponse {
    fn decode(p: &Packet<'_>) -> Result<Self, Error> {
        Ok(Self {
            controller: p.controller(),
            updated: p.bool(8),
        })
    }
}

impl Decode for ControllerResponse {
    fn decode(p: &Packet<'_>) -> Result<Self, Error> {
        Ok(Self {
            controller: p.controller(),
            ip_address: p.ipv4(8),
            subnet_mask: p.ipv4(12),
            gateway: p.ipv4(16),
            mac_address: p.mac(20),
            version: p.version(26),
            date: p.date(28),
        })
    }
}

impl Decode for TimeResponse {
    fn decode(p: &Packet<'_>) -> Result<Self, Error> {
        Ok(Self {
            controller: p.controller(),
            datetime: p.datetime(8)?,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn reply(function: Function, controller: u32) -> [u8; PACKET_SIZE] {
        let mut p = [0u8; PACKET_SIZE];
        p[0] = SOM;
        p[1] = function.code();
        p[4..8].copy_from_slice(&controller.to_le_bytes());
        p
    }

    #[test]
    fn request_header_layout() {
        let req = Request::get_status(405_419_896);
        assert_eq!(req.packet.len(), PACKET_SIZE);
        assert_eq!(req.packet[0], SOM);
        assert_eq!(req.packet[1], 0x20);
        assert_eq!(&req.packet[4..8], &405_419_896u32.to_le_bytes());
        assert!(req.packet[8..].iter().all(|b| *b == 0));
    }

    #[test]
    fn set_door_control_payload() {
        let req = Request::set_door_control(123, 2, DoorMode::Controlled, 7);
        assert_eq!(req.packet[1], 0x80);
        assert_eq!(&req.packet[8..11], &[2, 3, 7]);
    }

    #[test]
    fn get_event_payload_is_little_endian_index() {
        let req = Request::get_event(123, 0x0102_0304);
        assert_eq!(&req.packet[8..12], &[0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn record_special_events_payload() {
        assert_eq!(Request::record_special_events(1, true).packet[8], 1);
        assert_eq!(Request::record_special_events(1, false).packet[8], 0);
    }

    #[test]
    fn decode_status_reply() {
        let mut p = reply(Function::GetStatus, 405_419_896);
        p[8..12].copy_from_slice(&78u32.to_le_bytes());
        p[12] = 2; // event type
        p[13] = 1; // granted
        p[14] = 3; // door
        p[15] = 1; // direction
        p[16..20].copy_from_slice(&8_165_538u32.to_le_bytes());
        p[20..27].copy_from_slice(&[0x20, 0x24, 0x11, 0x05, 0x12, 0x34, 0x56]);
        p[27] = 6;
        p[29] = 1; // door 2 open
        p[34] = 1; // door 3 button
        p[37..40].copy_from_slice(&[0x08, 0x30, 0x00]);
        p[49] = 0x05;
        p[50] = 0x04;
        p[51..54].copy_from_slice(&[0x24, 0x11, 0x05]);

        let status: StatusResponse = decode(&p, Function::GetStatus).unwrap();
        assert_eq!(status.controller, 405_419_896);
        assert_eq!(status.event_index(), 78);
        assert_eq!(status.event.card, 8_165_538);
        assert!(status.event.access_granted);
        assert_eq!(status.event.door, 3);
        assert_eq!(status.event.reason, 6);
        assert_eq!(
            status.event.timestamp.unwrap().to_string(),
            "2024-11-05 12:34:56"
        );
        assert_eq!(status.door_open, [false, true, false, false]);
        assert_eq!(status.is_pressed(3), Some(true));
        assert_eq!(status.relays, 0x05);
        assert_eq!(status.is_unlocked(1), Some(true));
        assert_eq!(status.is_unlocked(2), Some(false));
        assert_eq!(
            status.system_datetime.unwrap().to_string(),
            "2024-11-05 08:30:00"
        );
    }

    #[test]
    fn zeroed_timestamp_decodes_as_none() {
        let p = reply(Function::GetStatus, 1);
        let status: StatusResponse = decode(&p, Function::GetStatus).unwrap();
        assert!(status.event.timestamp.is_none());
        assert!(status.system_datetime.is_none());
    }

    #[test]
    fn event_notification_accepts_v6_62_marker() {
        let mut p = reply(Function::GetStatus, 1);
        p[0] = SOM_V6_62;
        assert!(decode_event_notification(&p).is_ok());

        // ...but only for event notifications
        let mut q = reply(Function::GetTime, 1);
        q[0] = SOM_V6_62;
        let err = decode::<TimeResponse>(&q, Function::GetTime).unwrap_err();
        assert!(matches!(err, Error::InvalidStartOfMessage(0x19)));
    }

    #[test]
    fn short_packet_is_rejected() {
        let err = decode_event_notification(&[SOM, 0x20, 0, 0]).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidLength {
                expected: 64,
                actual: 4
            }
        ));
        assert!(err.is_decode());
    }

    #[test]
    fn wrong_function_code_is_rejected() {
        let p = reply(Function::GetTime, 1);
        let err = decode::<OpenDoorResponse>(&p, Function::OpenDoor).unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedFunction {
                expected: 0x40,
                got: 0x32
            }
        ));
    }

    #[test]
    fn decode_controller_reply() {
        let mut p = reply(Function::GetController, 405_419_896);
        p[8..12].copy_from_slice(&[192, 168, 1, 100]);
        p[12..16].copy_from_slice(&[255, 255, 255, 0]);
        p[16..20].copy_from_slice(&[192, 168, 1, 1]);
        p[20..26].copy_from_slice(&[0x00, 0x12, 0x23, 0x34, 0x45, 0x56]);
        p[26..28].copy_from_slice(&[0x08, 0x92]);
        p[28..32].copy_from_slice(&[0x20, 0x19, 0x08, 0x15]);

        let info: ControllerResponse = decode(&p, Function::GetController).unwrap();
        assert_eq!(info.ip_address.to_string(), "192.168.1.100");
        assert_eq!(info.subnet_mask.to_string(), "255.255.255.0");
        assert_eq!(info.gateway.to_string(), "192.168.1.1");
        assert_eq!(info.mac_address, "00:12:23:34:45:56");
        assert_eq!(info.version, "v8.92");
        assert_eq!(info.date.unwrap().to_string(), "2019-08-15");
    }

    #[test]
    fn decode_door_control_reply() {
        let mut p = reply(Function::GetDoorControl, 123);
        p[8] = 4;
        p[9] = 2;
        p[10] = 10;
        let dc: DoorControlResponse = decode(&p, Function::GetDoorControl).unwrap();
        assert_eq!(dc.door, 4);
        assert_eq!(dc.mode, DoorMode::Locked);
        assert_eq!(dc.delay, 10);
    }

    #[test]
    fn invalid_time_reply_is_an_error() {
        let mut p = reply(Function::GetTime, 123);
        p[8..15].copy_from_slice(&[0x20, 0x24, 0x13, 0x45, 0x00, 0x00, 0x00]);
        let err = decode::<TimeResponse>(&p, Function::GetTime).unwrap_err();
        assert!(matches!(err, Error::InvalidDateTime { offset: 8 }));
    }
}
