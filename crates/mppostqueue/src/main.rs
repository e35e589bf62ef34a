//! mppostqueue - Postfix queue plugin for the Mackerel agent
//!
//! Prints one value line per message category plus the queue length.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use mppostqueue::app;
use mppostqueue::cli::{normalize_args, Cli};
use tracing::error;
use tracing_subscriber::EnvFilter;

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // stdout belongs to the agent
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse_from(normalize_args(std::env::args_os()));
    init_logging(cli.debug);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match app::run(&cli, &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(kind = app::error_kind(&e), "{:#}", e);
            ExitCode::FAILURE
        }
    }
}
