// ── Core error types ──
//
// Errors surfaced by the coordinators and the facade. Consumers never see
// raw packet or socket errors: the `From<uhppoted_api::Error>` impl folds
// transport-layer failures into the availability taxonomy.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Availability ─────────────────────────────────────────────────
    /// The controller did not produce a usable reply (socket error or a
    /// reply from some other controller).
    #[error("Controller unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("No reply from controller {controller} after {timeout_ms}ms")]
    Timeout { controller: u32, timeout_ms: u64 },

    /// A whole poll tick overran its budget and was abandoned.
    #[error("{coordinator} update timed out after {timeout_ms}ms")]
    TickTimeout {
        coordinator: String,
        timeout_ms: u64,
    },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Operation failed: {message}")]
    OperationFailed { message: String },

    // ── Lookup errors ────────────────────────────────────────────────
    #[error("Controller not found: {serial}")]
    ControllerNotFound { serial: u32 },

    #[error("Door not found: {identifier}")]
    DoorNotFound { identifier: String },

    #[error("Invalid door number {door} (expected 1-4)")]
    InvalidDoor { door: u8 },

    #[error("Invalid door delay {delay}s (expected 1-60)")]
    InvalidDelay { delay: u8 },

    // ── Wrapped errors ───────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Malformed reply from a controller.
    #[error("API error: {message}")]
    Api { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// `true` for failures that only mean "no data from this unit right now".
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable { .. } | Self::Timeout { .. } | Self::Api { .. }
        )
    }

    /// `true` for a user-initiated command the controller did not carry out.
    pub fn is_operation_failure(&self) -> bool {
        matches!(
            self,
            Self::ValidationFailed { .. } | Self::OperationFailed { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<uhppoted_api::Error> for CoreError {
    fn from(err: uhppoted_api::Error) -> Self {
        use uhppoted_api::Error as ApiError;

        match err {
            ApiError::Timeout {
                controller,
                timeout_ms,
            } => CoreError::Timeout {
                controller,
                timeout_ms,
            },
            ApiError::Io(e) => CoreError::Unavailable {
                reason: e.to_string(),
            },
            ApiError::Mismatch { expected, got } => CoreError::Unavailable {
                reason: format!("reply from {got}, expected {expected}"),
            },
            ApiError::ListenerBind { addr, reason } => CoreError::Unavailable {
                reason: format!("event listener {addr}: {reason}"),
            },
            ApiError::InvalidAddress(addr) => CoreError::Config {
                message: format!("invalid address '{addr}'"),
            },
            e @ (ApiError::InvalidLength { .. }
            | ApiError::InvalidStartOfMessage(_)
            | ApiError::UnexpectedFunction { .. }
            | ApiError::InvalidDateTime { .. }) => CoreError::Api {
                message: e.to_string(),
            },
        }
    }
}

/// Map an error from a user-initiated mutation: an echo mismatch is a
/// validation failure rather than a missing reply.
pub(crate) fn mutation_error(err: uhppoted_api::Error) -> CoreError {
    match err {
        uhppoted_api::Error::Mismatch { expected, got } => CoreError::ValidationFailed {
            message: format!("reply from {got}, expected {expected}"),
        },
        other => other.into(),
    }
}
