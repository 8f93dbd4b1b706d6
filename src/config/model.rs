//! LockConfig struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};

/// Configuration for acquiring cache locks.
///
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    // =========================================================================
    // Timeouts
    // =========================================================================
    /// How long to poll for the state region before giving up.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// How long to poll for the information region (owner diagnostics, release).
    #[serde(default = "default_info_region_timeout_ms")]
    pub info_region_timeout_ms: u64,

    // =========================================================================
    // Backoff
    // =========================================================================
    /// First sleep between two lock attempts.
    #[serde(default = "default_backoff_initial_ms")]
    pub backoff_initial_ms: u64,

    /// Upper bound for the sleep between two lock attempts.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    // =========================================================================
    // Ownership
    // =========================================================================
    /// Port recorded in owner info so waiters can contact the holder (0 = none).
    #[serde(default)]
    pub contention_port: i32,

    /// Write the state region in the legacy format shared with older tool versions.
    #[serde(default)]
    pub use_cross_version_format: bool,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
            info_region_timeout_ms: default_info_region_timeout_ms(),
            backoff_initial_ms: default_backoff_initial_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            contention_port: 0,
            use_cross_version_format: false,
        }
    }
}
