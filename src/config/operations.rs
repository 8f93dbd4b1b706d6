//! Config loading, validation, and utility operations.

use super::model::LockConfig;
use crate::backoff::BackoffPolicy;
use crate::error::{CacheLockError, Result};
use crate::options::{LockMode, LockOptions};
use std::path::Path;
use std::time::Duration;

impl LockConfig {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    ///
    /// # Returns
    ///
    /// * `Ok(LockConfig)` - Successfully loaded and validated config
    /// * `Err(CacheLockError::UserError)` - Read error, parse error or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            CacheLockError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document deserializes as unit, not as an empty mapping.
        let config: LockConfig = if yaml.trim().is_empty() {
            LockConfig::default()
        } else {
            serde_yaml::from_str(yaml).map_err(|e| {
                CacheLockError::UserError(format!("failed to parse config YAML: {}", e))
            })?
        };

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            CacheLockError::UserError(format!("failed to serialize config to YAML: {}", e))
        })
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `lock_timeout_ms` and `info_region_timeout_ms` must be positive
    /// - `backoff_initial_ms` must be positive and not exceed `backoff_max_ms`
    pub fn validate(&self) -> Result<()> {
        if self.lock_timeout_ms == 0 {
            return Err(CacheLockError::UserError(
                "config validation failed: lock_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.info_region_timeout_ms == 0 {
            return Err(CacheLockError::UserError(
                "config validation failed: info_region_timeout_ms must be greater than 0"
                    .to_string(),
            ));
        }

        if self.backoff_initial_ms == 0 {
            return Err(CacheLockError::UserError(
                "config validation failed: backoff_initial_ms must be greater than 0".to_string(),
            ));
        }

        if self.backoff_initial_ms > self.backoff_max_ms {
            return Err(CacheLockError::UserError(format!(
                "config validation failed: backoff_initial_ms ({}) must not exceed backoff_max_ms ({})",
                self.backoff_initial_ms, self.backoff_max_ms
            )));
        }

        Ok(())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn info_region_timeout(&self) -> Duration {
        Duration::from_millis(self.info_region_timeout_ms)
    }

    /// Polling policy for the state region.
    pub fn state_backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            self.lock_timeout(),
            Duration::from_millis(self.backoff_initial_ms),
            Duration::from_millis(self.backoff_max_ms),
        )
    }

    /// Polling policy for the information region.
    pub fn info_backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            self.info_region_timeout(),
            Duration::from_millis(self.backoff_initial_ms),
            Duration::from_millis(self.backoff_max_ms),
        )
    }

    /// Lock options for `mode`, honoring `use_cross_version_format`.
    pub fn options(&self, mode: LockMode) -> LockOptions {
        let options = LockOptions::new(mode);
        if self.use_cross_version_format {
            options.use_cross_version_implementation()
        } else {
            options
        }
    }
}
