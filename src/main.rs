//! `dotlink` command-line entry point.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use clap::{CommandFactory as _, Parser as _};

use dotlink_cli::cli::{Cli, Command};
use dotlink_cli::commands;
use dotlink_cli::logging::{self, Logger};

const fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Restore(_) => "restore",
        Command::Backup => "backup",
        Command::List => "list",
        Command::Templates(_) => "templates",
        Command::Completions { .. } => "completions",
        Command::Version => "version",
    }
}

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = Cli::parse();
    let name = command_name(&args.command);
    logging::init_subscriber(args.verbose, name);
    let log = Arc::new(Logger::new(name));

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        if let Err(e) = ctrlc::set_handler(move || cancel.store(true, Ordering::SeqCst)) {
            log.debug(&format!("cannot install Ctrl-C handler: {e}"));
        }
    }

    match &args.command {
        Command::Restore(opts) => commands::restore::run(&args.global, opts, &log, cancel),
        Command::Backup => commands::backup::run(&args.global, &log, cancel),
        Command::List => commands::list::run(&args.global, log.as_ref()),
        Command::Templates(opts) => commands::templates::run(&args.global, opts, log.as_ref()),
        Command::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "dotlink", &mut std::io::stdout());
            Ok(())
        }
        Command::Version => {
            commands::version::run();
            Ok(())
        }
    }
}
