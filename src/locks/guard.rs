//! RAII handle for an acquired cache lock.

use super::operations::LockRegistry;
use crate::access::LockFileAccess;
use crate::backoff::BackoffPolicy;
use crate::error::{CacheLockError, Result};
use crate::options::LockMode;
use crate::protocol::{LockState, OwnerId};
use crate::region::RegionLock;
use chrono::{DateTime, Duration, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// A held lock on a cache target.
///
/// When dropped, the lock is released: an exclusive holder first clears its
/// owner info, then the state region is unlocked. Failures during drop are
/// logged, never raised. Use [`FileLock::close`] to observe them.
#[derive(Debug)]
pub struct FileLock {
    access: LockFileAccess,
    state_lock: Option<RegionLock>,
    target: PathBuf,
    mode: LockMode,
    state: LockState,
    lock_id: i64,
    acquired_at: DateTime<Utc>,
    info_backoff: BackoffPolicy,
    registry: Arc<LockRegistry>,
}

impl FileLock {
    pub(super) fn new(
        access: LockFileAccess,
        state_lock: RegionLock,
        target: PathBuf,
        state: LockState,
        lock_id: i64,
        info_backoff: BackoffPolicy,
        registry: Arc<LockRegistry>,
    ) -> Self {
        let mode = if state_lock.is_shared() {
            LockMode::Shared
        } else {
            LockMode::Exclusive
        };
        Self {
            access,
            state_lock: Some(state_lock),
            target,
            mode,
            state,
            lock_id,
            acquired_at: Utc::now(),
            info_backoff,
            registry,
        }
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// State of the protected cache as last read or written by this lock.
    pub fn state(&self) -> LockState {
        self.state
    }

    /// Whether the previous owner left the cache in a valid state.
    pub fn unlocked_cleanly(&self) -> bool {
        !self.state.is_dirty()
    }

    pub fn lock_id(&self) -> i64 {
        self.lock_id
    }

    /// The protected target (not the lock file).
    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn lock_file(&self) -> &Path {
        self.access.path()
    }

    pub fn is_lock_file(&self, path: &Path) -> bool {
        self.access.path() == path
    }

    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    pub fn held_for(&self) -> Duration {
        Utc::now().signed_duration_since(self.acquired_at)
    }

    /// Run `action` against the protected cache, which must be clean.
    pub fn read_file<T>(&self, action: impl FnOnce() -> T) -> Result<T> {
        self.assert_integral()?;
        Ok(action())
    }

    /// Run a mutating `action` against a cache that must be clean.
    ///
    /// Same as [`FileLock::write_file`] once the integrity check passed.
    pub fn update_file<T, E>(&mut self, action: impl FnOnce() -> std::result::Result<T, E>) -> std::result::Result<T, E>
    where
        E: From<CacheLockError>,
    {
        self.assert_integral()?;
        self.write_file(action)
    }

    /// Run a mutating `action` against the protected cache, whatever its state.
    ///
    /// The cache is marked dirty first and marked clean with a fresh owner id
    /// only if `action` succeeds. Requires an exclusive lock.
    pub fn write_file<T, E>(&mut self, action: impl FnOnce() -> std::result::Result<T, E>) -> std::result::Result<T, E>
    where
        E: From<CacheLockError>,
    {
        if self.mode != LockMode::Exclusive {
            return Err(CacheLockError::InsufficientLockMode(self.access.display_name().to_string()).into());
        }

        self.state = self.access.mark_dirty()?;
        let value = action()?;
        self.state = self.access.mark_clean(OwnerId::random())?;
        Ok(value)
    }

    /// Release the lock, reporting the first failure.
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    fn assert_integral(&self) -> Result<()> {
        if self.state.is_dirty() {
            return Err(CacheLockError::FileIntegrityViolation(self.target.clone()));
        }
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        let Some(mut state_lock) = self.state_lock.take() else {
            return Ok(());
        };
        debug!("releasing lock on {}", self.access.display_name());

        let cleared = if state_lock.is_shared() {
            Ok(())
        } else {
            self.discard_owner_info()
        };

        let released = state_lock
            .release()
            .map_err(|e| CacheLockError::io(format!("failed to release lock on {}", self.access.display_name()), e));
        self.registry.remove(&self.target);

        cleared.and(released)
    }

    fn discard_owner_info(&self) -> Result<()> {
        let access = &self.access;
        match self
            .info_backoff
            .start()
            .retry_until(|| access.try_lock_owner_region(false))?
        {
            Some(mut info_lock) => {
                let cleared = access.clear_owner_info();
                let released = info_lock.release().map_err(|e| {
                    CacheLockError::io(
                        format!("failed to release information region of {}", access.display_name()),
                        e,
                    )
                });
                cleared.and(released)
            }
            None => {
                debug!(
                    "could not lock information region of {}, leaving owner info in place",
                    access.display_name()
                );
                Ok(())
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("failed to release lock on '{}': {}", self.target.display(), e);
        }
    }
}
