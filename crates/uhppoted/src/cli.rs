//! Clap derive structures for the `uhppoted` CLI.
//!
//! Defines the command tree, global flags, and shared value types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use uhppoted_core::DoorMode;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// uhppoted -- poll, watch and drive UHPPOTE access controllers
#[derive(Debug, Parser)]
#[command(
    name = "uhppoted",
    version,
    about = "Monitor and control UHPPOTE access controllers",
    long_about = "Talks to UHPPOTE access controllers over their UDP protocol.\n\n\
        One-shot commands query or change a single controller or door;\n\
        `watch` runs the pollers and event listener until interrupted.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "UHPPOTED_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Local address request sockets bind to
    #[arg(long, env = "UHPPOTED_BIND", global = true)]
    pub bind: Option<String>,

    /// Broadcast address for controllers without a unicast address
    #[arg(long, env = "UHPPOTED_BROADCAST", global = true)]
    pub broadcast: Option<String>,

    /// Local address for pushed event notifications
    #[arg(long, env = "UHPPOTED_LISTEN", global = true)]
    pub listen: Option<String>,

    /// Per-request reply timeout in milliseconds
    #[arg(long, env = "UHPPOTED_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "UHPPOTED_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,
}

// ── Output ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Query configured controllers
    #[command(alias = "c")]
    Controllers(ControllersArgs),

    /// Inspect and control doors
    #[command(alias = "d")]
    Doors(DoorsArgs),

    /// Read controller event logs
    #[command(alias = "e")]
    Events(EventsArgs),

    /// Run the pollers and event listener, printing changes until Ctrl-C
    Watch(WatchArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Controllers ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ControllersArgs {
    #[command(subcommand)]
    pub command: ControllersCommand,
}

#[derive(Debug, Subcommand)]
pub enum ControllersCommand {
    /// List configured controllers
    #[command(alias = "ls")]
    List,

    /// Network and firmware details
    Info {
        /// Controller serial number
        serial: u32,
    },

    /// Controller clock
    Time {
        /// Controller serial number
        serial: u32,
    },

    /// Live door, relay and input state plus the last logged event
    Status {
        /// Controller serial number
        serial: u32,
    },
}

// ── Doors ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DoorsArgs {
    #[command(subcommand)]
    pub command: DoorsCommand,
}

#[derive(Debug, Subcommand)]
pub enum DoorsCommand {
    /// List configured doors with their current state
    #[command(alias = "ls")]
    List,

    /// Show one door
    Get {
        /// Configured door name
        name: String,
    },

    /// Set the door control mode
    Mode {
        /// Configured door name
        name: String,
        /// New control mode
        mode: ModeArg,
    },

    /// Set the unlock delay in seconds
    Delay {
        /// Configured door name
        name: String,
        /// Delay in seconds (1-60)
        #[arg(value_parser = clap::value_parser!(u8).range(1..=60))]
        delay: u8,
    },

    /// Unlock a door remotely
    Unlock {
        /// Configured door name
        name: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Controlled,
    Locked,
    Unlocked,
}

impl From<ModeArg> for DoorMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Controlled => DoorMode::Controlled,
            ModeArg::Locked => DoorMode::Locked,
            ModeArg::Unlocked => DoorMode::Unlocked,
        }
    }
}

// ── Events ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct EventsArgs {
    #[command(subcommand)]
    pub command: EventsCommand,
}

#[derive(Debug, Subcommand)]
pub enum EventsCommand {
    /// Fetch one event log record
    Get {
        /// Controller serial number
        serial: u32,
        /// Event index
        index: u32,
    },

    /// Most recent events, newest first
    Recent {
        /// Controller serial number
        serial: u32,
    },
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Do not bind the event listener; rely on polling only
    #[arg(long)]
    pub no_listen: bool,

    /// Print door snapshot changes as well as events
    #[arg(long)]
    pub doors: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the resolved configuration
    Show,

    /// Write a starter config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the config file path
    Path,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
