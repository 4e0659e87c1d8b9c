use anyhow::Result;
use clap::Parser;
use colored::*;
use std::process::ExitCode;
use tutoria::cli::{COMMANDS, Cli, Command, Dispatcher};
use tutoria::config::AppConfig;
use tutoria::{SheetError, SheetStore, logging};

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(err) => report(&err),
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let command = Command::parse(&cli.args)?;
    if command == Command::Help {
        tutoria::cli::print_usage();
        return Ok(ExitCode::from(1));
    }

    let cfg = AppConfig::load(cli.data_home.as_deref())?;
    let dispatcher = Dispatcher {
        store: SheetStore::open(&cfg.base_dir, cfg.write_options())?,
        editor: cfg.editor(cli.editor.as_deref()),
        assume_yes: cli.yes,
        indent: cfg.settings.indent,
    };
    dispatcher.run(command)
}

fn report(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<SheetError>() {
        Some(err @ SheetError::InvalidArgument(_)) => {
            eprintln!("{} {err}", "error:".red());
            eprintln!();
            eprintln!("{COMMANDS}");
            ExitCode::from(2)
        }
        // Already carries its source in the message.
        Some(err) => {
            eprintln!("{} {err}", "error:".red());
            ExitCode::FAILURE
        }
        None => {
            eprintln!("{} {err:#}", "error:".red());
            ExitCode::FAILURE
        }
    }
}
