//! Lock acquisition and inspection operations.

use super::guard::FileLock;
use super::metadata::ProcessMetadata;
use super::types::{LockInfo, LockStatus};
use crate::access::LockFileAccess;
use crate::config::LockConfig;
use crate::error::{CacheLockError, Result};
use crate::options::LockOptions;
use crate::protocol::{OwnerInfo, StateCodec};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Targets currently locked through one [`LockManager`].
#[derive(Debug, Default)]
pub(crate) struct LockRegistry {
    locked: Mutex<HashSet<PathBuf>>,
}

impl LockRegistry {
    fn entries(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        // A panic while holding the set cannot leave it half-updated.
        self.locked.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns `false` if `target` is already registered.
    pub(crate) fn insert(&self, target: &Path) -> bool {
        self.entries().insert(target.to_path_buf())
    }

    pub(crate) fn remove(&self, target: &Path) {
        self.entries().remove(target);
    }

    pub(crate) fn contains(&self, target: &Path) -> bool {
        self.entries().contains(target)
    }
}

/// Acquires cache locks, polling with backoff until the configured timeout.
#[derive(Debug)]
pub struct LockManager {
    config: LockConfig,
    metadata: ProcessMetadata,
    registry: Arc<LockRegistry>,
}

impl LockManager {
    /// A manager for the running process.
    pub fn new(config: LockConfig) -> Self {
        let metadata = ProcessMetadata::current(config.contention_port);
        Self::with_metadata(config, metadata)
    }

    pub fn with_metadata(config: LockConfig, metadata: ProcessMetadata) -> Self {
        Self {
            config,
            metadata,
            registry: Arc::new(LockRegistry::default()),
        }
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    pub fn metadata(&self) -> &ProcessMetadata {
        &self.metadata
    }

    /// Whether `target` is currently locked through this manager.
    pub fn is_locked(&self, target: &Path) -> bool {
        self.registry.contains(&canonicalize(target))
    }

    /// Lock `target`.
    ///
    /// # Arguments
    ///
    /// * `target` - The cache directory or file to protect
    /// * `options` - Mode and state format
    /// * `display_name` - Name of the target in messages
    /// * `operation` - What this process is about to do, recorded as owner info
    ///
    /// # Returns
    ///
    /// * `Ok(FileLock)` - Lock acquired; released on drop
    /// * `Err(CacheLockError::AlreadyLockedByThisProcess)` - Target already locked by this manager
    /// * `Err(CacheLockError::LockTimeout)` - Another holder kept the lock for the whole timeout
    pub fn lock(&self, target: &Path, options: LockOptions, display_name: &str, operation: &str) -> Result<FileLock> {
        let target = canonicalize(target);
        if !self.registry.insert(&target) {
            return Err(CacheLockError::AlreadyLockedByThisProcess(
                display_name.to_string(),
            ));
        }

        self.acquire(&target, options, display_name, operation)
            .inspect_err(|_| self.registry.remove(&target))
    }

    fn acquire(&self, target: &Path, options: LockOptions, display_name: &str, operation: &str) -> Result<FileLock> {
        let lock_file = lock_file_for(target);
        if let Some(parent) = lock_file.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| {
                CacheLockError::io(
                    format!("failed to create lock directory '{}'", parent.display()),
                    e,
                )
            })?;
        }

        let access = LockFileAccess::open(&lock_file, display_name, options.state_codec())?;
        let shared = options.mode().is_shared();
        debug!("waiting to acquire {} lock on {}", options.mode(), display_name);

        let mut backoff = self.config.state_backoff().start();
        let Some(state_lock) = backoff.retry_until(|| access.try_lock_state_region(shared))? else {
            return Err(self.timeout(&access, operation));
        };

        let lock_id = new_lock_id();
        let state = if shared {
            access.read_state()
        } else {
            access
                .ensure_state_initialized()
                .and_then(|state| self.publish_owner_info(&access, lock_id, operation).map(|_| state))
        };
        // On error `state_lock` is dropped, which releases it.
        let state = state?;

        info!(
            "acquired {} lock on {} after {:?}",
            options.mode(),
            display_name,
            backoff.elapsed()
        );
        Ok(FileLock::new(
            access,
            state_lock,
            target.to_path_buf(),
            state,
            lock_id,
            self.config.info_backoff(),
            Arc::clone(&self.registry),
        ))
    }

    fn publish_owner_info(&self, access: &LockFileAccess, lock_id: i64, operation: &str) -> Result<()> {
        let Some(mut info_lock) = self
            .config
            .info_backoff()
            .start()
            .retry_until(|| access.try_lock_owner_region(false))?
        else {
            return Err(CacheLockError::io(
                format!("unable to lock the information region for {}", access.display_name()),
                std::io::Error::new(std::io::ErrorKind::WouldBlock, "information region held"),
            ));
        };

        let written = access.write_owner_info(
            self.metadata.port,
            lock_id,
            &self.metadata.process_identifier,
            operation,
        );
        let released = info_lock.release().map_err(|e| {
            CacheLockError::io(
                format!("failed to release information region of {}", access.display_name()),
                e,
            )
        });
        written.and(released)
    }

    /// Build the timeout error, quoting the current owner when it can be read.
    fn timeout(&self, access: &LockFileAccess, operation: &str) -> CacheLockError {
        let owner = read_owner_info(access, &self.config).unwrap_or_else(|e| {
            debug!("could not read owner info of {}: {}", access.display_name(), e);
            None
        });
        let (owner_pid, owner_operation) = owner
            .map(|o| (o.pid, o.operation))
            .unwrap_or_default();

        let message = format!(
            "Timeout waiting to lock {}. It is currently in use by another process.\n\
             Owner PID: {}\n\
             Our PID: {}\n\
             Owner Operation: {}\n\
             Our operation: {}\n\
             Lock file: {}",
            access.display_name(),
            owner_pid,
            self.metadata.process_identifier,
            owner_operation,
            operation,
            access.path().display()
        );
        CacheLockError::LockTimeout {
            lock_file: access.path().to_path_buf(),
            message,
        }
    }
}

/// Read owner info under a shared information-region lock.
///
/// Returns `None` if the region stays locked for the short timeout or no
/// owner info was ever written.
fn read_owner_info(access: &LockFileAccess, config: &LockConfig) -> Result<Option<OwnerInfo>> {
    let Some(mut info_lock) = config
        .info_backoff()
        .start()
        .retry_until(|| access.try_lock_owner_region(true))?
    else {
        debug!(
            "could not lock information region of {}, ignoring",
            access.display_name()
        );
        return Ok(None);
    };

    let owner = access.read_owner_info();
    let _ = info_lock.release();
    owner
}

/// The lock file guarding `target`.
///
/// A directory `d` is guarded by `d/<name of d>.lock`, anything else by a
/// sibling `<name>.lock`.
pub fn lock_file_for(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let lock_name = format!("{}.lock", name);

    if target.is_dir() {
        target.join(lock_name)
    } else {
        match target.parent() {
            Some(parent) => parent.join(lock_name),
            None => PathBuf::from(lock_name),
        }
    }
}

/// Inspect one lock file without blocking and without creating it.
///
/// Owner info is read only when the information region can be locked shared
/// right away.
pub fn inspect_lock_file(lock_file: &Path, codec: StateCodec) -> Result<LockInfo> {
    if !lock_file.is_file() {
        return Err(CacheLockError::UserError(format!(
            "lock file '{}' does not exist",
            lock_file.display()
        )));
    }

    let name = lock_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let access = LockFileAccess::open(lock_file, name.clone(), codec)?;

    let status = match access.read_state() {
        Ok(state) => LockStatus::from(state),
        Err(CacheLockError::CorruptLockFile {
            expected, found, ..
        }) => LockStatus::Corrupt { expected, found },
        Err(e) => return Err(e),
    };

    let held = access.is_state_region_locked()?;

    let owner = match access.try_lock_owner_region(true)? {
        Some(mut info_lock) => {
            let owner = access.read_owner_info().unwrap_or_else(|e| {
                debug!("ignoring unreadable owner info in {}: {}", lock_file.display(), e);
                None
            });
            let _ = info_lock.release();
            owner
        }
        None => None,
    };

    Ok(LockInfo {
        path: lock_file.to_path_buf(),
        name,
        status,
        owner,
        held,
    })
}

/// List every `*.lock` file directly inside `dir`.
///
/// Files that cannot be inspected are skipped.
pub fn list_locks(dir: &Path, codec: StateCodec) -> Result<Vec<LockInfo>> {
    let mut locks = Vec::new();

    if !dir.exists() {
        return Ok(locks);
    }

    let entries = fs::read_dir(dir).map_err(|e| {
        CacheLockError::io(format!("failed to read directory '{}'", dir.display()), e)
    })?;

    for entry in entries {
        let entry = entry
            .map_err(|e| CacheLockError::io("failed to read directory entry", e))?;
        let path = entry.path();

        if path.extension().and_then(|e| e.to_str()) != Some("lock") {
            continue;
        }

        match inspect_lock_file(&path, codec) {
            Ok(info) => locks.push(info),
            Err(e) => debug!("skipping {}: {}", path.display(), e),
        }
    }

    locks.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(locks)
}

fn canonicalize(target: &Path) -> PathBuf {
    fs::canonicalize(target).unwrap_or_else(|_| target.to_path_buf())
}

/// Fresh lock id from the first 64 bits of a v4 uuid.
fn new_lock_id() -> i64 {
    uuid::Uuid::new_v4().as_u64_pair().0 as i64
}
