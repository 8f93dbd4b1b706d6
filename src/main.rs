//! Cachelock: inspect and exercise cache lock files.
//!
//! This is the main entry point for the `cachelock` CLI. It parses arguments,
//! sets up logging, loads the lock configuration, dispatches to the
//! appropriate command handler, and handles errors with proper exit codes.

mod cli;
mod commands;

use cachelock::config::LockConfig;
use cachelock::error::Result;
use cachelock::exit_codes;
use cli::Cli;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse_args();

    // 0 = warn, 1 = info, 2+ = debug; RUST_LOG takes precedence.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("cachelock=warn"),
        1 => EnvFilter::new("cachelock=info"),
        _ => EnvFilter::new("cachelock=debug"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            // Print user-actionable error message to stderr
            eprintln!("Error: {}", err);

            // Return appropriate exit code
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => LockConfig::load(path)?,
        None => LockConfig::default(),
    };

    commands::dispatch(cli.command, &config)
}
