mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use uhppoted_core::Uhppoted;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose, cli.global.quiet, cli.global.log_json);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, quiet: bool, json: bool) {
    let filter = match (quiet, verbosity) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let global = cli.global;
    match cli.command {
        // Config commands don't talk to controllers
        Command::Config(args) => commands::config_cmd::handle(args, &global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "uhppoted", &mut std::io::stdout());
            Ok(())
        }

        // Long-running: pollers on their own timers plus the listener
        Command::Watch(args) => {
            let mut core = config::core_config(&global)?;
            if args.no_listen {
                core.listen_events = false;
            }
            let engine = Uhppoted::new(core)?;
            commands::watch::handle(&engine, &args, &global).await
        }

        // Everything else is a single request-response cycle
        cmd => {
            let core = config::core_config(&global)?;
            tracing::debug!(command = ?cmd, "dispatching command");
            Uhppoted::oneshot(core, |engine| async move {
                Ok(commands::dispatch(cmd, &engine, &global).await)
            })
            .await?
        }
    }
}
