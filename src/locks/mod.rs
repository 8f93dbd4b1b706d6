//! Cache locking on top of the lock file protocol.
//!
//! The protocol layer (`access`, `region`) only ever *tries* to lock. This
//! module is the caller that waits:
//!
//! - [`LockManager::lock`] polls the state region with exponential backoff
//!   until the configured timeout, then fails with a message quoting the
//!   current owner's process id and operation
//! - [`FileLock`] is the RAII handle for an acquired lock
//!
//! # Lock Files
//!
//! A cache directory `d` is guarded by `d/<name of d>.lock`; a file target `f`
//! by the sibling `<name of f>.lock`. Lock files are never deleted.
//!
//! # Writes
//!
//! Mutations of the protected cache go through [`FileLock::write_file`] or
//! [`FileLock::update_file`], which mark the state dirty first and clean only
//! after the action returned successfully. A crash in between leaves the cache
//! dirty for the next holder to detect.
//!
//! # RAII Guards
//!
//! A `FileLock` releases its lock when dropped. If release fails during drop,
//! a warning is logged but the program does not crash.

mod guard;
mod metadata;
mod operations;
mod types;

#[cfg(test)]
mod tests;

// Re-export public API
pub use guard::FileLock;
pub use metadata::{ProcessMetadata, format_age};
pub use operations::{LockManager, inspect_lock_file, list_locks, lock_file_for};
pub use types::{LockInfo, LockStatus};
