//! Advisory byte-range locks on an open lock file.
//!
//! `try_lock` never blocks: `Ok(None)` means the range is currently held in a
//! conflicting mode by another handle. Retrying is the caller's job.
//!
//! # Platform Behavior
//!
//! - **Linux**: open file description locks (`F_OFD_SETLK`). Locks belong to the
//!   open handle, so two handles in one process contend exactly like two
//!   processes, and closing one handle never drops another handle's locks.
//! - **Other Unix**: POSIX record locks (`F_SETLK`). These are process-scoped:
//!   handles inside one process do not exclude each other.
//! - **Elsewhere**: unsupported.

use std::fs::File;
use std::io;
use std::sync::Arc;
use tracing::{trace, warn};

/// A held lock on `[start, start + len)` of a lock file.
///
/// Released by [`RegionLock::release`] or on drop. Keeps the file handle open
/// while held.
#[derive(Debug)]
pub struct RegionLock {
    file: Arc<File>,
    start: u64,
    len: u64,
    shared: bool,
    released: bool,
}

impl RegionLock {
    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_shared(&self) -> bool {
        self.shared
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Release the lock. Calling this again is a no-op.
    pub fn release(&mut self) -> io::Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        trace!(start = self.start, len = self.len, "releasing region lock");
        sys::unlock(&self.file, self.start, self.len)
    }
}

impl Drop for RegionLock {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(
                start = self.start,
                len = self.len,
                "failed to release region lock: {}",
                e
            );
        }
    }
}

/// Try to lock `[start, start + len)` of `file` without blocking.
///
/// `len` must be non-zero: a zero length would lock to end of file and beyond.
pub fn try_lock(file: &Arc<File>, start: u64, len: u64, shared: bool) -> io::Result<Option<RegionLock>> {
    if len == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "cannot lock an empty region",
        ));
    }

    if !sys::try_lock(file, start, len, shared)? {
        trace!(start, len, shared, "region is held elsewhere");
        return Ok(None);
    }

    Ok(Some(RegionLock {
        file: Arc::clone(file),
        start,
        len,
        shared,
        released: false,
    }))
}

/// Whether another handle holds any lock overlapping `[start, start + len)`.
///
/// Queries the lock table without taking the range, so it never makes a
/// concurrent `try_lock` fail.
pub fn is_locked(file: &Arc<File>, start: u64, len: u64) -> io::Result<bool> {
    if len == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "cannot query an empty region",
        ));
    }
    sys::is_locked(file, start, len)
}

#[cfg(unix)]
mod sys {
    use std::fs::File;
    use std::io;
    use std::os::unix::io::AsRawFd;

    #[cfg(target_os = "linux")]
    const SET_LOCK: libc::c_int = libc::F_OFD_SETLK;
    #[cfg(not(target_os = "linux"))]
    const SET_LOCK: libc::c_int = libc::F_SETLK;

    #[cfg(target_os = "linux")]
    const GET_LOCK: libc::c_int = libc::F_OFD_GETLK;
    #[cfg(not(target_os = "linux"))]
    const GET_LOCK: libc::c_int = libc::F_GETLK;

    /// Returns `Ok(false)` when a conflicting lock is held elsewhere.
    pub(super) fn try_lock(file: &File, start: u64, len: u64, shared: bool) -> io::Result<bool> {
        let kind = if shared { libc::F_RDLCK } else { libc::F_WRLCK };
        match set_lock(file, kind as libc::c_short, start, len) {
            Ok(()) => Ok(true),
            Err(e) if is_contended(&e) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub(super) fn unlock(file: &File, start: u64, len: u64) -> io::Result<()> {
        set_lock(file, libc::F_UNLCK as libc::c_short, start, len)
    }

    /// Asks for the first lock that would block a write lock on the range.
    pub(super) fn is_locked(file: &File, start: u64, len: u64) -> io::Result<bool> {
        let mut request = request(libc::F_WRLCK as libc::c_short, start, len)?;

        // SAFETY: the descriptor stays open for the duration of the call because
        // `file` is borrowed, and the kernel only writes into `request`.
        let rc = unsafe {
            libc::fcntl(
                file.as_raw_fd(),
                GET_LOCK,
                &mut request as *mut libc::flock,
            )
        };
        if rc == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(request.l_type != libc::F_UNLCK as libc::c_short)
    }

    fn set_lock(file: &File, kind: libc::c_short, start: u64, len: u64) -> io::Result<()> {
        let request = request(kind, start, len)?;

        // SAFETY: the descriptor stays open for the duration of the call because
        // `file` is borrowed, and `request` outlives it.
        let rc = unsafe {
            libc::fcntl(
                file.as_raw_fd(),
                SET_LOCK,
                &request as *const libc::flock,
            )
        };
        if rc == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn request(kind: libc::c_short, start: u64, len: u64) -> io::Result<libc::flock> {
        let start = libc::off_t::try_from(start)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "region start out of range"))?;
        let len = libc::off_t::try_from(len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "region length out of range"))?;

        // SAFETY: `flock` is plain old data; all-zero is valid and leaves `l_pid`
        // at 0 as OFD locks require.
        let mut request: libc::flock = unsafe { std::mem::zeroed() };
        request.l_type = kind;
        request.l_whence = libc::SEEK_SET as libc::c_short;
        request.l_start = start;
        request.l_len = len;
        Ok(request)
    }

    fn is_contended(err: &io::Error) -> bool {
        matches!(err.raw_os_error(), Some(code) if code == libc::EAGAIN || code == libc::EACCES)
    }
}

#[cfg(not(unix))]
mod sys {
    use std::fs::File;
    use std::io;

    pub(super) fn try_lock(_file: &File, _start: u64, _len: u64, _shared: bool) -> io::Result<bool> {
        Err(unsupported())
    }

    pub(super) fn unlock(_file: &File, _start: u64, _len: u64) -> io::Result<()> {
        Err(unsupported())
    }

    pub(super) fn is_locked(_file: &File, _start: u64, _len: u64) -> io::Result<bool> {
        Err(unsupported())
    }

    fn unsupported() -> io::Error {
        io::Error::new(
            io::ErrorKind::Unsupported,
            "byte-range locking is only implemented for Unix platforms",
        )
    }
}
