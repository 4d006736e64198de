//! Event log command handlers.

use tabled::Tabled;
use uhppoted_core::{Event, Uhppoted};

use crate::cli::{EventsArgs, EventsCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct EventRow {
    #[tabled(rename = "Index")]
    index: i64,
    #[tabled(rename = "Timestamp")]
    timestamp: String,
    #[tabled(rename = "Door")]
    door: String,
    #[tabled(rename = "Reason")]
    reason: String,
    #[tabled(rename = "Card")]
    card: String,
    #[tabled(rename = "Granted")]
    granted: String,
}

fn row(engine: &Uhppoted, e: &Event) -> EventRow {
    EventRow {
        index: e.display_index(),
        timestamp: e.timestamp.map(|t| t.to_string()).unwrap_or_default(),
        door: door_label(engine, e),
        reason: e.reason.to_string(),
        card: e.card.map(|c| c.to_string()).unwrap_or_default(),
        granted: util::opt_bool(e.access_granted, "yes", "no"),
    }
}

fn door_label(engine: &Uhppoted, e: &Event) -> String {
    util::door_label(engine, uhppoted_core::DoorId::new(e.controller, e.door))
}

fn detail(engine: &Uhppoted, e: &Event) -> String {
    [
        format!("Controller: {}", e.controller),
        format!("Index:      {}", e.display_index()),
        format!(
            "Timestamp:  {}",
            e.timestamp.map_or_else(|| "-".into(), |t| t.to_string())
        ),
        format!("Door:       {}", door_label(engine, e)),
        format!("Reason:     {}", e.reason),
        format!(
            "Type:       {}",
            e.event_type.map_or_else(|| "-".into(), |t| t.to_string())
        ),
        format!(
            "Card:       {}",
            e.card.map_or_else(|| "-".into(), |c| c.to_string())
        ),
        format!("Granted:    {}", util::opt_bool(e.access_granted, "yes", "no")),
        format!(
            "Direction:  {}",
            match e.direction {
                Some(1) => "in",
                Some(2) => "out",
                _ => "-",
            }
        ),
    ]
    .join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(engine: &Uhppoted, args: EventsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        EventsCommand::Get { serial, index } => {
            let event = engine.get_event(serial, index).await?;
            let out = output::render_single(&global.output, &event, |e| detail(engine, e))?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        EventsCommand::Recent { serial } => {
            let events = recent(engine, serial).await?;
            let out = output::render_list(&global.output, &events, |e| row(engine, e))?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}

/// Walk back from the controller's current event index, newest first.
async fn recent(engine: &Uhppoted, serial: u32) -> Result<Vec<Event>, CliError> {
    let (status, _) = engine.controller_status(serial).await?;
    let limit = engine.config().recent_events;

    let mut events = Vec::with_capacity(limit);
    let mut index = status.event_index;
    while index > 0 && events.len() < limit {
        match engine.get_event(serial, index).await {
            Ok(event) => events.push(event),
            Err(e) => {
                tracing::debug!(index, error = %e, "stopping at unreadable event");
                break;
            }
        }
        index -= 1;
    }
    Ok(events)
}
