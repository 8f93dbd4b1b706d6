//! Configuration for lock acquisition.
//!
//! This module defines the `LockConfig` struct, usually loaded from a
//! `cachelock.yaml` file. It supports forward-compatible YAML parsing (unknown
//! fields are ignored), defaults for every field, and validation.
//!
//! None of these values affect the on-disk protocol. They only drive how
//! long and how often callers poll for a lock.

mod model;
mod operations;
pub mod types;


// Re-export public API
pub use model::LockConfig;
