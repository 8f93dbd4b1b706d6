//! Implementation of the `cachelock inspect` command.

use super::codec_for;
use crate::cli::InspectArgs;
use cachelock::config::LockConfig;
use cachelock::error::{CacheLockError, Result};
use cachelock::locks::{self, LockInfo};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// JSON output of `inspect`.
#[derive(Serialize)]
struct InspectReport<'a> {
    inspected_at: DateTime<Utc>,
    #[serde(flatten)]
    info: &'a LockInfo,
}

/// Execute the `cachelock inspect` command.
pub fn cmd_inspect(args: InspectArgs, config: &LockConfig) -> Result<()> {
    let info = locks::inspect_lock_file(&args.lock_file, codec_for(args.legacy, config))?;

    if args.json {
        let report = InspectReport {
            inspected_at: Utc::now(),
            info: &info,
        };
        let json = serde_json::to_string_pretty(&report).map_err(|e| {
            CacheLockError::UserError(format!("failed to serialize lock info: {}", e))
        })?;
        println!("{}", json);
        return Ok(());
    }

    println!("Lock file:  {}", info.path.display());
    println!("State:      {}", info.status);
    println!("Held:       {}", if info.held { "yes" } else { "no" });
    match &info.owner {
        Some(owner) => {
            println!("Owner PID:  {}", owner.pid);
            println!("Operation:  {}", owner.operation);
            println!("Lock id:    {}", owner.lock_id);
            if owner.port != 0 {
                println!("Port:       {}", owner.port);
            }
        }
        None => println!("Owner:      (none recorded)"),
    }

    Ok(())
}
