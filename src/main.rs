//! CLI binary for `tasktree`.
//!
//! This binary is a thin wrapper that sets up configuration and logging,
//! then delegates to the library.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tasktree::cli::{read_input, run, Cli, CliOutput};
use tasktree::{Config, SharedTaskStore};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = match cli.config.as_deref() {
        Some(path) => Config::load_or_default(path),
        None => Config::load(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(e) => return emit(CliOutput::failure(&e)),
    };

    init_logging(config.log_filter.as_deref());

    let store = cli.data_file.as_ref().map_or_else(
        || config.open_store(),
        |path| SharedTaskStore::new(path, config.load_policy),
    );
    tracing::debug!(path = %store.path().display(), "using task file");

    // Only read stdin for commands that need it (avoids blocking on terminal)
    let stdin = if cli.command.needs_stdin() {
        match read_input(io::stdin().lock()) {
            Ok(input) => input,
            Err(e) => return emit(CliOutput::failure(&e)),
        }
    } else {
        String::new()
    };

    emit(run(cli.command, &store, &stdin))
}

fn init_logging(config_filter: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config_filter.unwrap_or("warn")));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

fn emit(output: CliOutput) -> ExitCode {
    for msg in output.stdout {
        println!("{msg}");
    }
    for msg in output.stderr {
        eprintln!("{msg}");
    }
    output.exit_code
}
