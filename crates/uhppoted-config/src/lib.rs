//! Shared configuration for the uhppoted tools.
//!
//! A TOML file (platform config dir or an explicit path) layered with
//! `UHPPOTED_` environment variables via `figment`, and translation to
//! `uhppoted_core::CoreConfig`. The CLI applies its own flag overrides on
//! top of the translated config.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use uhppoted_api::TransportConfig;
use uhppoted_api::transport::{DEFAULT_LISTEN_PORT, DEFAULT_PORT, parse_addr};
use uhppoted_core::{ControllerConfig, CoreConfig, DoorConfig, PollIntervals};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub transport: Transport,

    #[serde(default)]
    pub polling: Polling,

    #[serde(default)]
    pub controllers: Vec<Controller>,

    #[serde(default)]
    pub doors: Vec<Door>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Transport {
    /// Local address request sockets bind to.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Destination for controllers without a unicast address.
    #[serde(default = "default_broadcast")]
    pub broadcast: String,

    /// Local endpoint for pushed event notifications.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Per-call reply timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            broadcast: default_broadcast(),
            listen: default_listen(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:0".into()
}
fn default_broadcast() -> String {
    format!("255.255.255.255:{DEFAULT_PORT}")
}
fn default_listen() -> String {
    format!("0.0.0.0:{DEFAULT_LISTEN_PORT}")
}
fn default_timeout_ms() -> u64 {
    1000
}

/// Coordinator timing. Intervals are in seconds; `0` disables a coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Polling {
    #[serde(default = "default_doors_secs")]
    pub doors: u64,

    #[serde(default = "default_events_secs")]
    pub events: u64,

    #[serde(default = "default_info_secs")]
    pub info: u64,

    #[serde(default = "default_tick_timeout_ms")]
    pub tick_timeout_ms: u64,

    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_recent_events")]
    pub recent_events: usize,

    #[serde(default = "default_max_events_per_tick")]
    pub max_events_per_tick: u32,

    #[serde(default = "default_true")]
    pub listen_events: bool,

    #[serde(default = "default_true")]
    pub record_special_events: bool,
}

impl Default for Polling {
    fn default() -> Self {
        Self {
            doors: default_doors_secs(),
            events: default_events_secs(),
            info: default_info_secs(),
            tick_timeout_ms: default_tick_timeout_ms(),
            concurrency: default_concurrency(),
            recent_events: default_recent_events(),
            max_events_per_tick: default_max_events_per_tick(),
            listen_events: true,
            record_special_events: true,
        }
    }
}

fn default_doors_secs() -> u64 {
    30
}
fn default_events_secs() -> u64 {
    30
}
fn default_info_secs() -> u64 {
    60
}
fn default_tick_timeout_ms() -> u64 {
    2500
}
fn default_concurrency() -> usize {
    5
}
fn default_recent_events() -> usize {
    16
}
fn default_max_events_per_tick() -> u32 {
    16
}
fn default_true() -> bool {
    true
}

/// One access controller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Controller {
    pub serial: u32,

    pub name: Option<String>,

    /// Unicast address, `host` or `host:port`. Omit to use broadcast.
    pub address: Option<String>,

    /// IANA timezone of the controller's clock.
    pub timezone: Option<String>,
}

/// A named door on one controller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Door {
    pub name: String,
    pub controller: u32,
    /// Door number on the controller (1-4).
    pub door: u8,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "uhppoted", "uhppoted").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("uhppoted");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file yields the defaults.
///
/// Nested keys use a double underscore, e.g.
/// `UHPPOTED_TRANSPORT__TIMEOUT_MS=2000`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("UHPPOTED_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file is missing or invalid.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

/// Starter configuration written by `config init`.
pub fn template() -> Config {
    Config {
        controllers: vec![Controller {
            serial: 405_419_896,
            name: Some("Alpha".into()),
            address: Some(format!("192.168.1.100:{DEFAULT_PORT}")),
            timezone: None,
        }],
        doors: vec![Door {
            name: "Front door".into(),
            controller: 405_419_896,
            door: 1,
        }],
        ..Config::default()
    }
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    /// Build a validated `CoreConfig`.
    pub fn to_core_config(&self) -> Result<CoreConfig, ConfigError> {
        let transport = TransportConfig {
            bind: addr("transport.bind", &self.transport.bind, 0)?,
            broadcast: addr("transport.broadcast", &self.transport.broadcast, DEFAULT_PORT)?,
            listen: addr("transport.listen", &self.transport.listen, DEFAULT_LISTEN_PORT)?,
            timeout: Duration::from_millis(self.transport.timeout_ms),
        };

        let controllers = self
            .controllers
            .iter()
            .map(|c| -> Result<ControllerConfig, ConfigError> {
                let address = c
                    .address
                    .as_deref()
                    .map(|a| addr(&format!("controller {} address", c.serial), a, DEFAULT_PORT))
                    .transpose()?;
                Ok(ControllerConfig {
                    serial: c.serial,
                    name: c.name.clone(),
                    address,
                    timezone: c.timezone.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let doors = self
            .doors
            .iter()
            .map(|d| DoorConfig {
                name: d.name.clone(),
                controller: d.controller,
                door: d.door,
            })
            .collect();

        let polling = &self.polling;
        let core = CoreConfig {
            transport,
            controllers,
            doors,
            intervals: PollIntervals {
                doors: Duration::from_secs(polling.doors),
                events: Duration::from_secs(polling.events),
                info: Duration::from_secs(polling.info),
            },
            tick_timeout: Duration::from_millis(polling.tick_timeout_ms),
            concurrency: polling.concurrency,
            recent_events: polling.recent_events,
            max_events_per_tick: polling.max_events_per_tick,
            listen_events: polling.listen_events,
            record_special_events: polling.record_special_events,
        };

        core.validate().map_err(|e| ConfigError::Validation {
            field: "config".into(),
            reason: e.to_string(),
        })?;
        Ok(core)
    }
}

fn addr(field: &str, value: &str, default_port: u16) -> Result<std::net::SocketAddr, ConfigError> {
    parse_addr(value, default_port).map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
[transport]
broadcast = "192.168.1.255"
timeout_ms = 750

[polling]
doors = 0
concurrency = 3

[[controllers]]
serial = 405419896
name = "Alpha"
address = "192.168.1.100"

[[controllers]]
serial = 303986753

[[doors]]
name = "Front"
controller = 405419896
door = 1
"#;

    fn write(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.polling, Polling::default());
        assert!(cfg.controllers.is_empty());
    }

    #[test]
    fn file_values_override_defaults() {
        let (_dir, path) = write(SAMPLE);
        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.transport.timeout_ms, 750);
        assert_eq!(cfg.transport.listen, default_listen());
        assert_eq!(cfg.polling.doors, 0);
        assert_eq!(cfg.polling.events, 30);
        assert_eq!(cfg.controllers.len(), 2);
    }

    #[test]
    fn translates_to_core_config() {
        let (_dir, path) = write(SAMPLE);
        let core = load_config_from(&path).unwrap().to_core_config().unwrap();

        assert_eq!(core.transport.broadcast.to_string(), "192.168.1.255:60000");
        assert_eq!(core.transport.timeout, Duration::from_millis(750));
        assert_eq!(core.intervals.doors, Duration::ZERO);
        assert_eq!(core.intervals.info, Duration::from_secs(60));
        assert_eq!(core.concurrency, 3);
        assert_eq!(
            core.controllers[0].address.map(|a| a.to_string()).as_deref(),
            Some("192.168.1.100:60000")
        );
        assert_eq!(core.controllers[1].address, None);
        assert_eq!(core.door_by_name("Front").map(DoorConfig::id).map(|d| d.door), Some(1));
    }

    #[test]
    fn invalid_address_is_reported_with_field() {
        let mut cfg = template();
        cfg.controllers[0].address = Some("not-an-address".into());
        let err = cfg.to_core_config().unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field.contains("405419896")));
    }

    #[test]
    fn core_validation_errors_surface() {
        let mut cfg = template();
        cfg.doors[0].door = 5;
        assert!(matches!(
            cfg.to_core_config(),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn save_then_load_preserves_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let cfg = template();

        save_config_to(&cfg, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.controllers, cfg.controllers);
        assert_eq!(loaded.doors, cfg.doors);
    }
}
