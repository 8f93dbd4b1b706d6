//! Implementation of the `cachelock hold` command.
//!
//! Mostly useful to reproduce contention: a second `hold` on the same target
//! waits for the first one, then times out naming it as the owner.

use crate::cli::HoldArgs;
use cachelock::config::LockConfig;
use cachelock::error::{CacheLockError, Result};
use cachelock::locks::{LockManager, format_age};
use cachelock::options::LockMode;
use std::io::Write;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::info;

/// Execute the `cachelock hold` command.
pub fn cmd_hold(args: HoldArgs, config: &LockConfig) -> Result<()> {
    let mode = if args.shared {
        LockMode::Shared
    } else {
        LockMode::Exclusive
    };
    let manager = LockManager::new(config.clone());
    let display_name = args.target.display().to_string();

    let mut lock = manager.lock(&args.target, config.options(mode), &display_name, &args.operation)?;

    info!(
        "holding {} lock on {} (previous state: {})",
        mode,
        display_name,
        if lock.unlocked_cleanly() { "clean" } else { "dirty" }
    );

    let hold = Duration::from_secs(args.seconds);
    let lock_file = lock.lock_file().to_path_buf();
    if args.dirty {
        // Announce only once the dirty marker is on disk.
        lock.write_file(|| {
            announce(&lock_file)?;
            thread::sleep(hold);
            Ok::<_, CacheLockError>(())
        })?;
    } else {
        announce(&lock_file)?;
        thread::sleep(hold);
    }

    let held_for = lock.held_for();
    lock.close()?;
    println!("released {} after {}", lock_file.display(), format_age(held_for));

    Ok(())
}

fn announce(lock_file: &Path) -> Result<()> {
    println!("locked {}", lock_file.display());
    std::io::stdout()
        .flush()
        .map_err(|e| CacheLockError::io("failed to write to stdout", e))
}
