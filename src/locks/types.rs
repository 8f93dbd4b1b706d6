//! Lock inspection results.

use crate::protocol::{LockState, OwnerId, OwnerInfo};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// What the state region of a lock file says about the protected cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LockStatus {
    /// Left in a valid state, by `previous_owner` when the format records it.
    Clean { previous_owner: Option<OwnerId> },
    /// Never marked clean, or its last writer did not finish.
    Dirty,
    /// Stamped with a protocol version this codec does not read.
    Corrupt { expected: u8, found: u8 },
}

impl From<LockState> for LockStatus {
    fn from(state: LockState) -> Self {
        if state.is_dirty() {
            Self::Dirty
        } else {
            Self::Clean {
                previous_owner: state.previous_owner(),
            }
        }
    }
}

impl fmt::Display for LockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clean {
                previous_owner: Some(owner),
            } => write!(f, "clean (owner {})", owner),
            Self::Clean {
                previous_owner: None,
            } => write!(f, "clean"),
            Self::Dirty => write!(f, "dirty"),
            Self::Corrupt { expected, found } => {
                write!(f, "corrupt (expected v{}, found v{})", expected, found)
            }
        }
    }
}

/// Information about a lock file, gathered without blocking.
#[derive(Debug, Clone, Serialize)]
pub struct LockInfo {
    /// The lock file path.
    pub path: PathBuf,

    /// The lock name (file stem).
    pub name: String,

    /// State region contents.
    pub status: LockStatus,

    /// Owner record, when one is present and was readable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerInfo>,

    /// Whether another handle holds the state region right now, in either mode.
    pub held: bool,
}

impl fmt::Display for LockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.status)?;
        if self.held {
            write!(f, ", HELD")?;
        }
        if let Some(owner) = &self.owner {
            write!(
                f,
                " (pid: {}, operation: {}, lock id: {})",
                owner.pid, owner.operation, owner.lock_id
            )?;
        }
        Ok(())
    }
}
