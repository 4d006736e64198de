//! Controller command handlers.

use chrono::NaiveDateTime;
use serde::Serialize;
use tabled::Tabled;
use uhppoted_core::{ControllerInfo, ControllerStatus, Entry, Event, Uhppoted};

use crate::cli::{ControllersArgs, ControllersCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Views ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ControllerView {
    serial: u32,
    name: Option<String>,
    address: Option<String>,
    #[serde(flatten)]
    info: Entry<ControllerInfo>,
}

#[derive(Serialize)]
struct TimeView {
    controller: u32,
    datetime: NaiveDateTime,
}

#[derive(Serialize)]
struct StatusView {
    controller: u32,
    status: ControllerStatus,
    event: Event,
}

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ControllerRow {
    #[tabled(rename = "Serial")]
    serial: u32,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "Firmware")]
    firmware: String,
    #[tabled(rename = "Clock")]
    clock: String,
}

impl From<&ControllerView> for ControllerRow {
    fn from(c: &ControllerView) -> Self {
        let info = c.info.value.as_ref();
        Self {
            serial: c.serial,
            name: c.name.clone().unwrap_or_default(),
            address: c.address.clone().unwrap_or_else(|| "(broadcast)".into()),
            state: if c.info.available {
                "online".into()
            } else {
                "unavailable".into()
            },
            ip: info.map(|i| i.address.to_string()).unwrap_or_default(),
            firmware: info.map(|i| i.firmware.clone()).unwrap_or_default(),
            clock: info
                .and_then(|i| i.datetime)
                .map(|t| t.to_string())
                .unwrap_or_default(),
        }
    }
}

fn info_detail(i: &ControllerInfo) -> String {
    [
        format!("Serial:   {}", i.serial),
        format!("IP:       {}", i.address),
        format!("Netmask:  {}", i.netmask),
        format!("Gateway:  {}", i.gateway),
        format!("MAC:      {}", i.mac),
        format!(
            "Firmware: {} ({})",
            i.firmware,
            i.firmware_date
                .map_or_else(|| "-".into(), |d| d.to_string())
        ),
        format!(
            "Clock:    {}",
            i.datetime.map_or_else(|| "-".into(), |t| t.to_string())
        ),
    ]
    .join("\n")
}

fn status_detail(v: &StatusView) -> String {
    let s = &v.status;
    let mut lines = vec![
        format!("Controller:   {}", v.controller),
        format!("Event index:  {}", s.event_index),
        format!(
            "Clock:        {}",
            s.system_datetime
                .map_or_else(|| "-".into(), |t| t.to_string())
        ),
        format!("Relays:       {:#06b}", s.relays),
        format!("Inputs:       {:#010b}", s.inputs),
        format!("System error: {}", s.system_error),
    ];
    for (n, (open, button)) in s.door_open.iter().zip(s.door_button.iter()).enumerate() {
        let unlocked = s.relays & (1 << n) != 0;
        lines.push(format!(
            "Door {}:       {} {}{}",
            n + 1,
            if unlocked { "UNLOCKED" } else { "LOCKED" },
            if *open { "OPEN" } else { "CLOSED" },
            if *button { " PRESSED" } else { "" },
        ));
    }
    if v.event.index.is_some_and(|i| i > 0) {
        lines.push(format!(
            "Last event:   {}",
            output::event_line(&v.event, None, false)
        ));
    }
    lines.join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    engine: &Uhppoted,
    args: ControllersArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        ControllersCommand::List => {
            // Partial results are still worth listing.
            if let Err(e) = engine.refresh_info().await {
                tracing::warn!(error = %e, "controller info incomplete");
            }
            let snap = engine.info_snapshot();
            let views: Vec<ControllerView> = engine
                .config()
                .controllers
                .iter()
                .map(|c| ControllerView {
                    serial: c.serial,
                    name: c.name.clone(),
                    address: c.address.map(|a| a.to_string()),
                    info: snap.get(&c.serial).cloned().unwrap_or_default(),
                })
                .collect();
            let out = output::render_list(&global.output, &views, |c| ControllerRow::from(c))?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ControllersCommand::Info { serial } => {
            let info = engine.controller_info(serial).await?;
            let out = output::render_single(&global.output, &info, info_detail)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ControllersCommand::Time { serial } => {
            let view = TimeView {
                controller: serial,
                datetime: engine.controller_time(serial).await?,
            };
            let out = output::render_single(&global.output, &view, |v| {
                let name = util::controller_name(engine, v.controller);
                if name.is_empty() {
                    format!("{}  {}", v.controller, v.datetime)
                } else {
                    format!("{} ({name})  {}", v.controller, v.datetime)
                }
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ControllersCommand::Status { serial } => {
            let (status, event) = engine.controller_status(serial).await?;
            let view = StatusView {
                controller: serial,
                status,
                event,
            };
            let out = output::render_single(&global.output, &view, status_detail)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
