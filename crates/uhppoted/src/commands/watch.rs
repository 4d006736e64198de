//! `watch`: run the pollers and listener, streaming changes until Ctrl-C.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use uhppoted_core::{DoorId, DoorStatus, Entry, Event, Uhppoted};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Serialize)]
struct DoorChange<'a> {
    name: String,
    door: DoorId,
    #[serde(flatten)]
    entry: &'a Entry<DoorStatus>,
}

pub async fn handle(engine: &Uhppoted, args: &WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    // Subscribe before starting so the first tick is not missed.
    let mut events = engine.subscribe_events();
    let mut doors = engine.doors();
    let mut last = doors.latest();

    engine.start().await;
    if !global.quiet {
        eprintln!("Watching {} controller(s), Ctrl-C to stop", engine.config().controllers.len());
    }

    let color = output::should_color();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let result = loop {
        tokio::select! {
            _ = &mut shutdown => break Ok(()),

            received = events.recv() => match received {
                Ok(event) => {
                    if let Err(e) = print_event(engine, &event, global, color) {
                        break Err(e);
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "event output fell behind");
                }
                Err(RecvError::Closed) => break Ok(()),
            },

            changed = doors.changed(), if args.doors => match changed {
                Some(snap) => {
                    let printed = snap
                        .iter()
                        .filter(|(id, entry)| {
                            !last.get(*id).is_some_and(|prev| {
                                prev.available == entry.available && prev.value == entry.value
                            })
                        })
                        .try_for_each(|(id, entry)| print_door(engine, *id, entry, global));
                    last = snap;
                    if let Err(e) = printed {
                        break Err(e);
                    }
                }
                None => break Ok(()),
            },
        }
    };

    engine.stop().await;
    result
}

fn print_event(
    engine: &Uhppoted,
    event: &Arc<Event>,
    global: &GlobalOpts,
    color: bool,
) -> Result<(), CliError> {
    let out = match global.output {
        OutputFormat::Table => {
            let name = engine
                .config()
                .door_name(DoorId::new(event.controller, event.door));
            output::event_line(event, name, color)
        }
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(&**event, true)?,
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

fn print_door(
    engine: &Uhppoted,
    door: DoorId,
    entry: &Entry<DoorStatus>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let name = util::door_label(engine, door);
    let out = match global.output {
        OutputFormat::Table => {
            let state = entry.value.as_ref().map_or_else(
                || "unavailable".to_owned(),
                |s| format!("{} {} {}s", s.state.describe(), s.mode, s.delay),
            );
            format!("{}  {name:<12}  {state}", util::opt_time(entry.updated))
        }
        OutputFormat::Json | OutputFormat::JsonCompact => {
            output::render_json(&DoorChange { name, door, entry }, true)?
        }
    };
    output::print_output(&out, global.quiet);
    Ok(())
}
