//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a process exit code.

use miette::Diagnostic;
use thiserror::Error;

use uhppoted_config::ConfigError;
use uhppoted_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Controller unavailable: {reason}")]
    #[diagnostic(
        code(uhppoted::unavailable),
        help(
            "Check that the controller is powered and reachable.\n\
             Set its address in the config file, or check --bind and --broadcast."
        )
    )]
    Unavailable { reason: String },

    #[error("{what} timed out after {millis}ms")]
    #[diagnostic(
        code(uhppoted::timeout),
        help("Increase the timeout with --timeout or check the controller address.")
    )]
    Timeout { what: String, millis: u64 },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(uhppoted::not_found),
        help("Run: uhppoted {list_command} to see configured {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Operations ───────────────────────────────────────────────────
    #[error("Operation failed: {message}")]
    #[diagnostic(code(uhppoted::operation_failed))]
    OperationFailed { message: String },

    #[error("Unexpected reply: {message}")]
    #[diagnostic(code(uhppoted::api_error))]
    Api { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(uhppoted::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration file already exists at {path}")]
    #[diagnostic(
        code(uhppoted::config_exists),
        help("Use --force to overwrite it, or edit it directly.")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(
        code(uhppoted::config),
        help("Check the config file, or create one with: uhppoted config init")
    )]
    Config(#[from] ConfigError),

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    #[diagnostic(code(uhppoted::json))]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(uhppoted::internal))]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Unavailable { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::ConfigExists { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Unavailable { reason } => CliError::Unavailable { reason },

            CoreError::Timeout {
                controller,
                timeout_ms,
            } => CliError::Timeout {
                what: format!("Request to controller {controller}"),
                millis: timeout_ms,
            },

            CoreError::TickTimeout {
                coordinator,
                timeout_ms,
            } => CliError::Timeout {
                what: format!("{coordinator} update"),
                millis: timeout_ms,
            },

            CoreError::ValidationFailed { message } | CoreError::OperationFailed { message } => {
                CliError::OperationFailed { message }
            }

            CoreError::ControllerNotFound { serial } => CliError::NotFound {
                resource_type: "controller".into(),
                identifier: serial.to_string(),
                list_command: "controllers list".into(),
            },

            CoreError::DoorNotFound { identifier } => CliError::NotFound {
                resource_type: "door".into(),
                identifier,
                list_command: "doors list".into(),
            },

            e @ CoreError::InvalidDoor { .. } => CliError::Validation {
                field: "door".into(),
                reason: e.to_string(),
            },

            e @ CoreError::InvalidDelay { .. } => CliError::Validation {
                field: "delay".into(),
                reason: e.to_string(),
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Api { message } => CliError::Api { message },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_door_maps_to_not_found_exit_code() {
        let err = CliError::from(CoreError::DoorNotFound {
            identifier: "cellar".into(),
        });
        assert_eq!(err.exit_code(), exit_code::NOT_FOUND);
        assert_eq!(err.to_string(), "door 'cellar' not found");
    }

    #[test]
    fn transport_failures_map_to_connection_and_timeout_codes() {
        let unavailable = CliError::from(CoreError::Unavailable {
            reason: "no route".into(),
        });
        assert_eq!(unavailable.exit_code(), exit_code::CONNECTION);

        let timeout = CliError::from(CoreError::Timeout {
            controller: 405_419_896,
            timeout_ms: 1000,
        });
        assert_eq!(timeout.exit_code(), exit_code::TIMEOUT);
    }

    #[test]
    fn rejected_delay_is_a_usage_error() {
        let err = CliError::from(CoreError::InvalidDelay { delay: 61 });
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }
}
