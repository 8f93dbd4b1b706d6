//! Command implementations for cachelock.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations.

mod hold;
mod inspect;
mod list;

use crate::cli::Command;
use cachelock::config::LockConfig;
use cachelock::error::Result;
use cachelock::protocol::StateCodec;

/// Dispatch a command to its implementation.
pub fn dispatch(command: Command, config: &LockConfig) -> Result<()> {
    match command {
        Command::Inspect(args) => inspect::cmd_inspect(args, config),
        Command::List(args) => list::cmd_list(args, config),
        Command::Hold(args) => hold::cmd_hold(args, config),
    }
}

/// State format for read-only commands: `--legacy`, else the configured one.
fn codec_for(legacy: bool, config: &LockConfig) -> StateCodec {
    if legacy || config.use_cross_version_format {
        StateCodec::Legacy
    } else {
        StateCodec::Current
    }
}
