//! Config resolution for the CLI: file + environment from `uhppoted-config`,
//! then global flag overrides, then translation to a `CoreConfig`.

use std::path::PathBuf;

use uhppoted_config::Config;
use uhppoted_core::CoreConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// The config file in effect: `--config` or the platform default.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(uhppoted_config::config_path)
}

/// Load the file + environment layers and apply flag overrides.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = uhppoted_config::load_config_from(&config_path(global))?;

    if let Some(ref bind) = global.bind {
        cfg.transport.bind.clone_from(bind);
    }
    if let Some(ref broadcast) = global.broadcast {
        cfg.transport.broadcast.clone_from(broadcast);
    }
    if let Some(ref listen) = global.listen {
        cfg.transport.listen.clone_from(listen);
    }
    if let Some(timeout) = global.timeout {
        cfg.transport.timeout_ms = timeout;
    }

    Ok(cfg)
}

/// Resolved, validated engine configuration.
pub fn core_config(global: &GlobalOpts) -> Result<CoreConfig, CliError> {
    Ok(load(global)?.to_core_config()?)
}
