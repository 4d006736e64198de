//! Command dispatch: bridges CLI args -> engine calls -> output formatting.

pub mod config_cmd;
pub mod controllers;
pub mod doors;
pub mod events;
pub mod util;
pub mod watch;

use uhppoted_core::Uhppoted;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a one-shot command to the appropriate handler.
pub async fn dispatch(cmd: Command, engine: &Uhppoted, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Controllers(args) => controllers::handle(engine, args, global).await,
        Command::Doors(args) => doors::handle(engine, args, global).await,
        Command::Events(args) => events::handle(engine, args, global).await,
        // Handled before dispatch
        Command::Watch(_) | Command::Config(_) | Command::Completions(_) => Err(
            CliError::Internal("command does not take a one-shot engine".into()),
        ),
    }
}
