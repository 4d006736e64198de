//! Door command handlers.

use serde::Serialize;
use tabled::Tabled;
use uhppoted_core::{Command, CommandResult, DoorId, DoorStatus, Entry, Uhppoted};

use crate::cli::{DoorsArgs, DoorsCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Views ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct DoorView {
    name: String,
    door: DoorId,
    #[serde(flatten)]
    entry: Entry<DoorStatus>,
}

#[derive(Serialize)]
struct DoorDetail {
    name: String,
    door: DoorId,
    #[serde(flatten)]
    status: DoorStatus,
}

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DoorRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Door")]
    door: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Delay")]
    delay: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

impl From<&DoorView> for DoorRow {
    fn from(d: &DoorView) -> Self {
        let (mode, delay, state) = match d.entry.value.as_ref() {
            Some(s) => (s.mode.to_string(), format!("{}s", s.delay), s.state.describe()),
            None => ("-".into(), "-".into(), "unavailable".into()),
        };
        Self {
            name: d.name.clone(),
            door: d.door.to_string(),
            mode,
            delay,
            state,
            updated: util::opt_time(d.entry.updated),
        }
    }
}

fn detail(d: &DoorDetail) -> String {
    let s = &d.status;
    [
        format!("Name:   {}", d.name),
        format!("Door:   {}", d.door),
        format!("Mode:   {}", s.mode),
        format!("Delay:  {}s", s.delay),
        format!("Open:   {}", util::opt_bool(s.state.open, "yes", "no")),
        format!("Locked: {}", util::opt_bool(s.state.locked, "yes", "no")),
        format!("Button: {}", util::opt_bool(s.state.button, "pressed", "released")),
    ]
    .join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(engine: &Uhppoted, args: DoorsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        DoorsCommand::List => {
            if let Err(e) = engine.refresh_doors().await {
                tracing::warn!(error = %e, "door state incomplete");
            }
            let snap = engine.doors_snapshot();
            let views: Vec<DoorView> = snap
                .iter()
                .map(|(id, entry)| DoorView {
                    name: util::door_label(engine, *id),
                    door: *id,
                    entry: entry.clone(),
                })
                .collect();
            let out = output::render_list(&global.output, &views, |d| DoorRow::from(d))?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DoorsCommand::Get { name } => {
            let door = engine.door_id(&name)?;
            let status = engine.door_status(door).await?;
            let view = DoorDetail { name, door, status };
            let out = output::render_single(&global.output, &view, detail)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DoorsCommand::Mode { name, mode } => {
            let door = engine.door_id(&name)?;
            let result = engine
                .execute(Command::SetDoorMode {
                    door,
                    mode: mode.into(),
                })
                .await?;
            report(&name, &result, global)
        }

        DoorsCommand::Delay { name, delay } => {
            let door = engine.door_id(&name)?;
            let result = engine
                .execute(Command::SetDoorDelay { door, delay })
                .await?;
            report(&name, &result, global)
        }

        DoorsCommand::Unlock { name } => {
            let result = engine
                .execute(Command::UnlockDoorByName { name: name.clone() })
                .await?;
            report(&name, &result, global)
        }
    }
}

fn report(name: &str, result: &CommandResult, global: &GlobalOpts) -> Result<(), CliError> {
    let out = match result {
        CommandResult::DoorControl(reply) => {
            output::render_single(&global.output, reply, |r| {
                format!("{name}: mode {} delay {}s", r.mode, r.delay)
            })?
        }
        CommandResult::Unlocked { door, reply } => {
            output::render_single(&global.output, reply, |_| format!("{name} ({door}) unlocked"))?
        }
    };
    output::print_output(&out, global.quiet);
    Ok(())
}
