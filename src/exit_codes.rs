//! Exit code constants for the cachelock CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config)
//! - 2: I/O failure on the lock file or cache directory
//! - 3: Lock acquisition failure (timeout, already held by this process)
//! - 4: Lock file integrity failure (protocol mismatch, dirty cache)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments or invalid configuration.
pub const USER_ERROR: i32 = 1;

/// I/O failure while reading or writing a lock file.
pub const IO_FAILURE: i32 = 2;

/// Lock acquisition failure: the lock is held elsewhere or the mode is insufficient.
pub const LOCK_FAILURE: i32 = 3;

/// Lock file integrity failure: unexpected protocol version or a dirty cache.
pub const INTEGRITY_FAILURE: i32 = 4;
