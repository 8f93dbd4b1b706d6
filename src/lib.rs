//! Cachelock: crash-safe, cross-process locking for shared on-disk caches.
//!
//! Several processes sharing one cache directory coordinate through a small
//! lock file next to the cache. The file carries two independently lockable
//! regions:
//!
//! - a state record saying whether the cache was left clean, and by whom
//! - an owner record saying who holds the lock now and what they are doing
//!
//! A holder marks the state dirty before mutating the cache and clean after,
//! so a crash in between is detected by the next holder.
//!
//! The crate is layered bottom-up:
//!
//! - [`protocol`]: binary codecs for both records
//! - [`region`]: non-blocking byte-range locks
//! - [`access`]: one open lock file, combining the two
//! - [`options`]: lock mode and state format selection
//! - [`locks`]: the waiting caller, with timeouts and RAII handles

pub mod access;
pub mod backoff;
pub mod config;
pub mod error;
pub mod exit_codes;
pub mod locks;
pub mod options;
pub mod protocol;
pub mod region;

pub use access::LockFileAccess;
pub use config::LockConfig;
pub use error::{CacheLockError, Result};
pub use locks::{FileLock, LockManager};
pub use options::{LockMode, LockOptions};
pub use protocol::{LockState, OwnerId, OwnerInfo, StateCodec};
pub use region::RegionLock;
