//! Default values for configuration fields.

// Default value functions for serde
pub(crate) fn default_lock_timeout_ms() -> u64 {
    60_000
}
pub(crate) fn default_info_region_timeout_ms() -> u64 {
    10_000
}
pub(crate) fn default_backoff_initial_ms() -> u64 {
    10
}
pub(crate) fn default_backoff_max_ms() -> u64 {
    1_000
}
