use std::net::SocketAddr;

use thiserror::Error;

/// Top-level error type for the `uhppoted-api` crate.
///
/// Covers every failure mode of a single request/reply exchange and of the
/// event listener: socket I/O, timeouts, malformed packets and replies that
/// echo the wrong controller. `uhppoted-core` maps these into its
/// availability taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// Socket error (bind failure, send failure, unreachable network, etc.)
    #[error("UDP transport error: {0}")]
    Io(#[from] std::io::Error),

    /// No reply arrived within the per-call timeout.
    #[error("no reply from controller {controller} after {timeout_ms}ms")]
    Timeout { controller: u32, timeout_ms: u64 },

    /// Address string could not be parsed as `host:port`.
    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    /// The listener could not bind its local endpoint.
    #[error("failed to bind event listener on {addr}: {reason}")]
    ListenerBind { addr: SocketAddr, reason: String },

    // ── Decoding ────────────────────────────────────────────────────
    /// Packet is not the fixed 64-byte protocol length.
    #[error("invalid packet length {actual} (expected {expected})")]
    InvalidLength { expected: usize, actual: usize },

    /// First byte is not a recognised start-of-message marker.
    #[error("invalid start-of-message byte 0x{0:02x}")]
    InvalidStartOfMessage(u8),

    /// Reply carries a different function code than the request.
    #[error("unexpected function code 0x{got:02x} (expected 0x{expected:02x})")]
    UnexpectedFunction { expected: u8, got: u8 },

    /// A packed BCD date/time field is not a valid calendar value.
    #[error("invalid date/time field at offset {offset}")]
    InvalidDateTime { offset: usize },

    // ── Identity ────────────────────────────────────────────────────
    /// Reply echoes a controller (or door) other than the one addressed.
    #[error("reply identity mismatch: expected {expected}, got {got}")]
    Mismatch { expected: String, got: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying next tick.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Io(_) | Self::Mismatch { .. })
    }

    /// Returns `true` if the controller never answered.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if a reply arrived but named a different controller or door.
    pub fn is_mismatch(&self) -> bool {
        matches!(self, Self::Mismatch { .. })
    }

    /// Returns `true` if the packet itself was malformed.
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            Self::InvalidLength { .. }
                | Self::InvalidStartOfMessage(_)
                | Self::UnexpectedFunction { .. }
                | Self::InvalidDateTime { .. }
        )
    }

    pub(crate) fn controller_mismatch(expected: u32, got: u32) -> Self {
        Self::Mismatch {
            expected: format!("controller {expected}"),
            got: format!("controller {got}"),
        }
    }
}
