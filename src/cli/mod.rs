//! CLI argument parsing for cachelock.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Cachelock: inspect and exercise cache lock files.
///
/// A lock file guards a shared cache directory:
/// - its state region records whether the cache was left clean
/// - its information region records who holds the lock right now
#[derive(Parser, Debug)]
#[command(name = "cachelock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Path to a YAML lock configuration file.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for cachelock.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the state and owner of a lock file.
    ///
    /// Never blocks and never creates the file. Owner info is shown only
    /// when the information region is not being written.
    Inspect(InspectArgs),

    /// List the lock files in a cache directory.
    List(ListArgs),

    /// Acquire a lock on a target and hold it for a while.
    ///
    /// Prints `locked <lock-file>` once acquired, then sleeps and releases.
    Hold(HoldArgs),
}

/// Arguments for the `inspect` command.
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// The lock file to inspect.
    pub lock_file: PathBuf,

    /// Read the state region in the legacy cross-version format.
    #[arg(long)]
    pub legacy: bool,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `list` command.
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Directory to scan for `*.lock` files.
    pub dir: PathBuf,

    /// Read state regions in the legacy cross-version format.
    #[arg(long)]
    pub legacy: bool,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `hold` command.
#[derive(Parser, Debug)]
pub struct HoldArgs {
    /// Cache directory or file to lock.
    pub target: PathBuf,

    /// Operation recorded as owner info.
    #[arg(long, default_value = "hold")]
    pub operation: String,

    /// Take a shared lock instead of an exclusive one.
    #[arg(long)]
    pub shared: bool,

    /// Keep the cache marked dirty while holding (exclusive only).
    #[arg(long, conflicts_with = "shared")]
    pub dirty: bool,

    /// How long to hold the lock, in seconds.
    #[arg(long, default_value_t = 5)]
    pub seconds: u64,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
