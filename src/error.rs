//! Error types for cachelock.
//!
//! Uses thiserror for derive macros. Lock contention is not an error: the
//! `try_lock_*` operations report it as `Ok(None)`. Everything here is either
//! fatal for the protected cache or an I/O failure propagated unchanged.

use crate::exit_codes;
use crate::protocol::DecodeError;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for cachelock operations.
#[derive(Error, Debug)]
pub enum CacheLockError {
    /// The protocol version stamped in the lock file does not match the codec in use.
    ///
    /// Never retried. The protected cache must be treated as unusable.
    #[error(
        "Unexpected lock protocol found in lock file '{}' for {display_name}. Expected {expected}, found {found}.",
        .path.display()
    )]
    CorruptLockFile {
        path: PathBuf,
        display_name: String,
        expected: u8,
        found: u8,
    },

    /// Underlying I/O failure (disk full, permission denied, ...).
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// The state region stayed locked by another holder for the whole timeout.
    #[error("{message}")]
    LockTimeout { lock_file: PathBuf, message: String },

    /// The same target is already locked through this lock manager.
    #[error("Cannot lock {0} as it has already been locked by this process.")]
    AlreadyLockedByThisProcess(String),

    /// A write was attempted while holding only a shared lock.
    #[error("An exclusive lock is required for this operation: {0}")]
    InsufficientLockMode(String),

    /// The cache was not unlocked cleanly by its previous owner.
    #[error("The file '{}' was not unlocked cleanly", .0.display())]
    FileIntegrityViolation(PathBuf),

    /// Invalid arguments or configuration.
    #[error("{0}")]
    UserError(String),
}

impl CacheLockError {
    /// Create an I/O error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Map a protocol decode failure for the lock file at `path`.
    pub(crate) fn decode(path: &Path, display_name: &str, err: DecodeError) -> Self {
        match err {
            DecodeError::UnexpectedVersion { expected, found } => Self::CorruptLockFile {
                path: path.to_path_buf(),
                display_name: display_name.to_string(),
                expected,
                found,
            },
            DecodeError::Truncated => Self::io(
                format!("failed to decode lock file '{}'", path.display()),
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated lock record"),
            ),
        }
    }

    /// Whether the error signals that the protected cache can no longer be trusted.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            Self::CorruptLockFile { .. } | Self::FileIntegrityViolation(_)
        )
    }

    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::CorruptLockFile { .. } | Self::FileIntegrityViolation(_) => {
                exit_codes::INTEGRITY_FAILURE
            }
            Self::Io { .. } => exit_codes::IO_FAILURE,
            Self::LockTimeout { .. }
            | Self::AlreadyLockedByThisProcess(_)
            | Self::InsufficientLockMode(_) => exit_codes::LOCK_FAILURE,
            Self::UserError(_) => exit_codes::USER_ERROR,
        }
    }
}

/// Result type alias for cachelock operations.
pub type Result<T> = std::result::Result<T, CacheLockError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_lock_file_names_path_and_versions() {
        let err = CacheLockError::decode(
            Path::new("/cache/modules.lock"),
            "module cache",
            DecodeError::UnexpectedVersion {
                expected: 3,
                found: 1,
            },
        );
        let msg = err.to_string();
        assert!(msg.contains("/cache/modules.lock"));
        assert!(msg.contains("module cache"));
        assert!(msg.contains("Expected 3, found 1"));
        assert!(err.is_integrity_failure());
        assert_eq!(err.exit_code(), exit_codes::INTEGRITY_FAILURE);
    }

    #[test]
    fn truncated_record_is_an_io_error() {
        let err = CacheLockError::decode(Path::new("x.lock"), "x", DecodeError::Truncated);
        match &err {
            CacheLockError::Io { source, .. } => {
                assert_eq!(source.kind(), std::io::ErrorKind::UnexpectedEof)
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.exit_code(), exit_codes::IO_FAILURE);
    }

    #[test]
    fn lock_errors_share_an_exit_code() {
        let timeout = CacheLockError::LockTimeout {
            lock_file: PathBuf::from("a.lock"),
            message: "Timeout waiting to lock a".to_string(),
        };
        assert_eq!(timeout.exit_code(), exit_codes::LOCK_FAILURE);
        assert_eq!(timeout.to_string(), "Timeout waiting to lock a");

        let twice = CacheLockError::AlreadyLockedByThisProcess("jdk cache".to_string());
        assert_eq!(twice.exit_code(), exit_codes::LOCK_FAILURE);
        assert!(twice.to_string().contains("jdk cache"));
    }

    #[test]
    fn user_error_has_correct_exit_code() {
        let err = CacheLockError::UserError("bad config".to_string());
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
        assert!(!err.is_integrity_failure());
    }
}
