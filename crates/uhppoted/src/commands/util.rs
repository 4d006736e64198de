//! Shared helpers for command handlers.

use chrono::{DateTime, Utc};

use uhppoted_core::{DoorId, Uhppoted};

/// Configured name of a door, or its `serial/door` id.
pub fn door_label(engine: &Uhppoted, id: DoorId) -> String {
    engine
        .config()
        .door_name(id)
        .map_or_else(|| id.to_string(), str::to_owned)
}

/// Configured display name of a controller.
pub fn controller_name(engine: &Uhppoted, serial: u32) -> String {
    engine
        .config()
        .controller(serial)
        .and_then(|c| c.name.clone())
        .unwrap_or_default()
}

pub fn opt_bool(v: Option<bool>, yes: &str, no: &str) -> String {
    match v {
        Some(true) => yes.to_owned(),
        Some(false) => no.to_owned(),
        None => "-".to_owned(),
    }
}

pub fn opt_time(t: Option<DateTime<Utc>>) -> String {
    t.map_or_else(
        || "-".to_owned(),
        |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_values_render_as_dash() {
        assert_eq!(opt_bool(None, "open", "closed"), "-");
        assert_eq!(opt_bool(Some(true), "open", "closed"), "open");
        assert_eq!(opt_time(None), "-");
    }
}
