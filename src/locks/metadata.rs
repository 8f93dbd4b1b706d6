//! Identity of the current process as recorded in owner info.

use chrono::Duration;
use std::process;

/// Who is locking: recorded in the information region and quoted in timeout messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessMetadata {
    /// Process identifier (`<pid>@<host>`).
    pub process_identifier: String,

    /// Port on which this process answers contention pings (0 = none).
    pub port: i32,
}

impl ProcessMetadata {
    /// Metadata for the running process.
    pub fn current(port: i32) -> Self {
        Self {
            process_identifier: get_process_identifier(),
            port,
        }
    }

    pub fn new(process_identifier: impl Into<String>, port: i32) -> Self {
        Self {
            process_identifier: process_identifier.into(),
            port,
        }
    }
}

/// `<pid>@<host>` for the running process.
pub(crate) fn get_process_identifier() -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", process::id(), host)
}

/// Format a duration as a short human-readable age.
pub fn format_age(age: Duration) -> String {
    let seconds = age.num_seconds();
    let minutes = age.num_minutes();
    let hours = age.num_hours();
    let days = age.num_days();

    if days > 0 {
        format!("{}d {}h", days, hours % 24)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes % 60)
    } else if minutes > 0 {
        format!("{}m", minutes)
    } else {
        format!("{}s", seconds.max(0))
    }
}
