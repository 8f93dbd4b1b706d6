//! Access to a single lock file.
//!
//! `LockFileAccess` owns one read/write handle to the lock file and combines
//! the protocol codecs with region locking:
//!
//! - the **state region** (`[0, state size)`) records whether the protected
//!   cache was left clean, and by which owner
//! - the **information region** (`[state size, 2052)`) records who holds the
//!   lock right now and what they are doing
//!
//! The two regions never overlap, so a blocked process can lock the
//! information region and read owner diagnostics while the state region stays
//! held elsewhere.
//!
//! # Durability
//!
//! Writes go straight to the file descriptor. State writes are additionally
//! synced so a crash after `mark_dirty` can never resurrect a clean state.
//!
//! # Concurrency
//!
//! Nothing here is synchronized between threads of one process. Threads that
//! share a lock must share one `LockFileAccess` and serialize their calls.


use crate::error::{CacheLockError, Result};
use crate::protocol::{
    DecodeError, INFORMATION_REGION_END, LockState, OwnerId, OwnerInfo, STATE_REGION_POS, StateCodec,
    decode_owner, encode_owner,
};
use crate::region::{self, RegionLock};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Handle to a lock file, opened read/write.
#[derive(Debug)]
pub struct LockFileAccess {
    file: Arc<File>,
    path: PathBuf,
    display_name: String,
    codec: StateCodec,
}

impl LockFileAccess {
    /// Open `path` for reading and writing, creating it if absent.
    ///
    /// The file is never truncated here: an existing state survives.
    pub fn open(path: impl Into<PathBuf>, display_name: impl Into<String>, codec: StateCodec) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                CacheLockError::io(format!("failed to open lock file '{}'", path.display()), e)
            })?;

        Ok(Self {
            file: Arc::new(file),
            path,
            display_name: display_name.into(),
            codec,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn codec(&self) -> StateCodec {
        self.codec
    }

    /// Offset at which the information region starts.
    pub fn info_region_pos(&self) -> u64 {
        STATE_REGION_POS + self.codec.size()
    }

    /// Current length of the lock file.
    pub fn len(&self) -> Result<u64> {
        self.file
            .metadata()
            .map(|m| m.len())
            .map_err(|e| self.io_error("failed to stat", e))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    // =========================================================================
    // State region
    // =========================================================================

    /// Make sure the state region holds a record, and return the current state.
    ///
    /// A file shorter than the state region (new, or truncated) is initialized
    /// as dirty: a cache is never trusted before its first clean release.
    pub fn ensure_state_initialized(&self) -> Result<LockState> {
        if self.len()? < self.codec.size() {
            debug!(
                "initializing state region of {} ({})",
                self.path.display(),
                self.codec
            );
            let state = self.codec.initial_state();
            self.write_state(&state)?;
            return Ok(state);
        }
        self.read_state()
    }

    /// Decode the state region.
    ///
    /// An empty file, or a record cut short after a matching version byte,
    /// reads as the initial (dirty) state. A record stamped with another
    /// protocol version is fatal, however short.
    pub fn read_state(&self) -> Result<LockState> {
        let bytes = self.read_range(STATE_REGION_POS, Some(self.codec.size()), "read state region")?;

        match self.codec.decode(&bytes) {
            Ok(state) => Ok(state),
            Err(DecodeError::Truncated) => Ok(self.codec.initial_state()),
            Err(e) => {
                let err = CacheLockError::decode(&self.path, &self.display_name, e);
                warn!("{}", err);
                Err(err)
            }
        }
    }

    /// Record that the cache content can no longer be trusted.
    ///
    /// Called by the exclusive holder before mutating the cache.
    pub fn mark_dirty(&self) -> Result<LockState> {
        let state = LockState::dirty();
        self.write_state(&state)?;
        Ok(state)
    }

    /// Record that `owner` left the cache in a valid state.
    ///
    /// Called by the exclusive holder after its mutations completed.
    pub fn mark_clean(&self, owner: OwnerId) -> Result<LockState> {
        let state = LockState::clean(owner);
        self.write_state(&state)?;
        Ok(state)
    }

    fn write_state(&self, state: &LockState) -> Result<()> {
        let bytes = self.codec.encode(state);
        let mut file = &*self.file;
        file.seek(SeekFrom::Start(STATE_REGION_POS))
            .and_then(|_| file.write_all(&bytes))
            .and_then(|_| file.flush())
            .and_then(|_| file.sync_data())
            .map_err(|e| self.io_error("failed to write state region of", e))
    }

    // =========================================================================
    // Information region
    // =========================================================================

    /// Decode the owner record, or `None` if none was ever written.
    pub fn read_owner_info(&self) -> Result<Option<OwnerInfo>> {
        let pos = self.info_region_pos();
        if self.len()? <= pos {
            return Ok(None);
        }

        let bytes = self.read_range(pos, None, "read information region")?;
        decode_owner(&bytes)
            .map(Some)
            .map_err(|e| CacheLockError::decode(&self.path, &self.display_name, e))
    }

    /// Replace the owner record.
    ///
    /// The file is cut back to the start of the information region and the new
    /// record appended, so no earlier record survives. The state region must
    /// already be initialized.
    pub fn write_owner_info(&self, port: i32, lock_id: i64, pid: &str, operation: &str) -> Result<()> {
        let pos = self.info_region_pos();
        if self.len()? < pos {
            return Err(self.io_error(
                "cannot write owner info before initializing the state region of",
                io::Error::new(io::ErrorKind::InvalidInput, "state region missing"),
            ));
        }

        let bytes = encode_owner(&OwnerInfo::new(port, lock_id, pid, operation));
        let mut file = &*self.file;
        file.set_len(pos)
            .and_then(|_| file.seek(SeekFrom::Start(pos)))
            .and_then(|_| file.write_all(&bytes))
            .and_then(|_| file.set_len(pos + bytes.len() as u64))
            .and_then(|_| file.flush())
            .map_err(|e| self.io_error("failed to write owner info to", e))
    }

    /// Drop the owner record, leaving only the state region.
    pub fn clear_owner_info(&self) -> Result<()> {
        let pos = self.info_region_pos();
        if self.len()? <= pos {
            return Ok(());
        }
        self.file
            .set_len(pos)
            .map_err(|e| self.io_error("failed to clear owner info of", e))
    }

    // =========================================================================
    // Region locks
    // =========================================================================

    /// Try to lock the state region. `Ok(None)` means it is held elsewhere.
    pub fn try_lock_state_region(&self, shared: bool) -> Result<Option<RegionLock>> {
        region::try_lock(&self.file, STATE_REGION_POS, self.codec.size(), shared)
            .map_err(|e| self.io_error("failed to lock state region of", e))
    }

    /// Whether another handle holds the state region, in either mode.
    ///
    /// Only queries the lock table; never takes the region.
    pub fn is_state_region_locked(&self) -> Result<bool> {
        region::is_locked(&self.file, STATE_REGION_POS, self.codec.size())
            .map_err(|e| self.io_error("failed to query state region lock of", e))
    }

    /// Try to lock the information region. `Ok(None)` means it is held elsewhere.
    pub fn try_lock_owner_region(&self, shared: bool) -> Result<Option<RegionLock>> {
        let pos = self.info_region_pos();
        region::try_lock(&self.file, pos, INFORMATION_REGION_END - pos, shared)
            .map_err(|e| self.io_error("failed to lock information region of", e))
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Read from `pos` up to `limit` bytes, or to end of file.
    fn read_range(&self, pos: u64, limit: Option<u64>, what: &str) -> Result<Vec<u8>> {
        let mut file = &*self.file;
        let mut bytes = Vec::new();
        file.seek(SeekFrom::Start(pos))
            .and_then(|_| match limit {
                Some(limit) => file.take(limit).read_to_end(&mut bytes),
                None => file.read_to_end(&mut bytes),
            })
            .map_err(|e| self.io_error(&format!("failed to {} of", what), e))?;
        Ok(bytes)
    }

    fn io_error(&self, context: &str, source: io::Error) -> CacheLockError {
        CacheLockError::io(format!("{} lock file '{}'", context, self.path.display()), source)
    }
}
