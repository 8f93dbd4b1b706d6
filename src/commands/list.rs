//! Implementation of the `cachelock list` command.

use super::codec_for;
use crate::cli::ListArgs;
use cachelock::config::LockConfig;
use cachelock::error::{CacheLockError, Result};
use cachelock::locks::{self, LockInfo, LockStatus, format_age};
use chrono::{DateTime, Utc};
use std::fs;

/// Execute the `cachelock list` command.
pub fn cmd_list(args: ListArgs, config: &LockConfig) -> Result<()> {
    let locks = locks::list_locks(&args.dir, codec_for(args.legacy, config))?;

    if args.json {
        let json = serde_json::to_string_pretty(&locks).map_err(|e| {
            CacheLockError::UserError(format!("failed to serialize lock list: {}", e))
        })?;
        println!("{}", json);
        return Ok(());
    }

    if locks.is_empty() {
        println!("No lock files in {}.", args.dir.display());
        return Ok(());
    }

    println!("Lock files ({}):", locks.len());
    println!();

    for lock in &locks {
        print_lock(lock);
    }

    // Summary
    let dirty_count = locks
        .iter()
        .filter(|l| l.status == LockStatus::Dirty && !l.held)
        .count();
    if dirty_count > 0 {
        println!(
            "Note: {} cache(s) are dirty and not held. Their content must be rebuilt before use.",
            dirty_count
        );
    }

    Ok(())
}

fn print_lock(lock: &LockInfo) {
    println!("  {}:", lock.name);
    println!("    State:      {}", lock.status);
    println!("    Held:       {}", if lock.held { "yes" } else { "no" });
    if let Some(owner) = &lock.owner {
        println!("    Owner PID:  {}", owner.pid);
        println!("    Operation:  {}", owner.operation);
    }
    if let Some(modified) = modified_at(lock) {
        println!("    Modified:   {}", modified.format("%Y-%m-%d %H:%M:%S UTC"));
        println!(
            "    Age:        {}",
            format_age(Utc::now().signed_duration_since(modified))
        );
    }
    println!("    Path:       {}", lock.path.display());
    println!();
}

fn modified_at(lock: &LockInfo) -> Option<DateTime<Utc>> {
    fs::metadata(&lock.path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}
