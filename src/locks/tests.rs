//! Tests for the locks subsystem.

use super::*;
use crate::config::LockConfig;
use crate::error::CacheLockError;
use crate::options::{LockMode, LockOptions};
use crate::protocol::StateCodec;
use std::fs;
use tempfile::TempDir;

fn fast_config() -> LockConfig {
    LockConfig {
        lock_timeout_ms: 200,
        info_region_timeout_ms: 50,
        backoff_initial_ms: 1,
        backoff_max_ms: 10,
        ..LockConfig::default()
    }
}

fn manager(name: &str) -> LockManager {
    LockManager::with_metadata(fast_config(), ProcessMetadata::new(name, 0))
}

/// A temporary cache directory with a `cache` subdirectory as lock target.
fn create_test_cache() -> (TempDir, std::path::PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("cache");
    fs::create_dir_all(&target).unwrap();
    let target = fs::canonicalize(target).unwrap();
    (temp_dir, target)
}

#[test]
fn test_lock_file_for_directory() {
    let (_dir, target) = create_test_cache();
    assert_eq!(lock_file_for(&target), target.join("cache.lock"));
}

#[test]
fn test_lock_file_for_file() {
    let (_dir, target) = create_test_cache();
    let file = target.join("index.bin");
    fs::write(&file, b"x").unwrap();
    assert_eq!(lock_file_for(&file), target.join("index.bin.lock"));

    // Missing targets are treated as files.
    let missing = target.join("missing");
    assert_eq!(lock_file_for(&missing), target.join("missing.lock"));
}

#[test]
fn test_process_metadata_identifier() {
    let meta = ProcessMetadata::current(0);
    let (pid, host) = meta.process_identifier.split_once('@').unwrap();
    assert_eq!(pid, std::process::id().to_string());
    assert!(!host.is_empty());
}

#[test]
fn test_format_age() {
    use chrono::Duration;
    assert_eq!(format_age(Duration::seconds(42)), "42s");
    assert_eq!(format_age(Duration::minutes(5)), "5m");
    assert_eq!(format_age(Duration::minutes(125)), "2h 5m");
    assert_eq!(format_age(Duration::hours(50)), "2d 2h");
}

#[test]
fn test_exclusive_lock_on_new_cache() {
    let (_dir, target) = create_test_cache();
    let manager = manager("1@test");

    let lock = manager
        .lock(&target, LockOptions::exclusive(), "test cache", "building")
        .unwrap();

    assert_eq!(lock.mode(), LockMode::Exclusive);
    assert!(!lock.unlocked_cleanly());
    assert!(lock.state().is_dirty());
    assert_eq!(lock.lock_file(), target.join("cache.lock"));
    assert!(lock.is_lock_file(&target.join("cache.lock")));
    assert!(lock.held_for().num_seconds() < 60);
    assert!(manager.is_locked(&target));

    // Owner info is visible to others while held.
    let info = inspect_lock_file(lock.lock_file(), StateCodec::Current).unwrap();
    let owner = info.owner.unwrap();
    assert_eq!(owner.pid, "1@test");
    assert_eq!(owner.operation, "building");
    assert_eq!(owner.lock_id, lock.lock_id());
}

#[test]
fn test_write_file_marks_clean() {
    let (_dir, target) = create_test_cache();
    let manager = manager("1@test");

    let mut lock = manager
        .lock(&target, LockOptions::exclusive(), "test cache", "building")
        .unwrap();
    let value = lock
        .write_file(|| Ok::<_, CacheLockError>(7))
        .unwrap();
    assert_eq!(value, 7);
    assert!(lock.unlocked_cleanly());
    let owner = lock.state().previous_owner().unwrap();
    lock.close().unwrap();

    let lock = manager
        .lock(&target, LockOptions::exclusive(), "test cache", "reading")
        .unwrap();
    assert!(lock.unlocked_cleanly());
    assert_eq!(lock.state().previous_owner(), Some(owner));
    assert_eq!(lock.read_file(|| "ok").unwrap(), "ok");
}

#[test]
fn test_failed_write_leaves_cache_dirty() {
    let (_dir, target) = create_test_cache();
    let manager = manager("1@test");

    let mut lock = manager
        .lock(&target, LockOptions::exclusive(), "test cache", "building")
        .unwrap();
    lock.write_file(|| Ok::<_, CacheLockError>(())).unwrap();

    let result: Result<(), CacheLockError> =
        lock.write_file(|| Err(CacheLockError::UserError("build failed".to_string())));
    assert!(matches!(result, Err(CacheLockError::UserError(_))));
    assert!(lock.state().is_dirty());
    drop(lock);

    let lock = manager
        .lock(&target, LockOptions::exclusive(), "test cache", "building")
        .unwrap();
    assert!(!lock.unlocked_cleanly());
}

#[test]
fn test_dirty_cache_rejects_read_and_update() {
    let (_dir, target) = create_test_cache();
    let manager = manager("1@test");

    let mut lock = manager
        .lock(&target, LockOptions::exclusive(), "test cache", "building")
        .unwrap();

    let err = lock.read_file(|| ()).unwrap_err();
    assert!(matches!(err, CacheLockError::FileIntegrityViolation(ref p) if *p == target));
    assert!(err.is_integrity_failure());

    let mut ran = false;
    let err = lock
        .update_file(|| {
            ran = true;
            Ok::<_, CacheLockError>(())
        })
        .unwrap_err();
    assert!(matches!(err, CacheLockError::FileIntegrityViolation(_)));
    assert!(!ran);

    // write_file does not care about the previous state.
    lock.write_file(|| Ok::<_, CacheLockError>(())).unwrap();
    lock.update_file(|| Ok::<_, CacheLockError>(())).unwrap();
    assert!(lock.unlocked_cleanly());
}

#[test]
fn test_shared_lock_cannot_write() {
    let (_dir, target) = create_test_cache();
    let manager = manager("1@test");

    let mut lock = manager
        .lock(&target, LockOptions::shared(), "test cache", "reading")
        .unwrap();
    assert_eq!(lock.mode(), LockMode::Shared);

    let err = lock
        .write_file(|| Ok::<_, CacheLockError>(()))
        .unwrap_err();
    assert!(matches!(err, CacheLockError::InsufficientLockMode(_)));
}

#[test]
fn test_shared_lock_does_not_initialize_state() {
    let (_dir, target) = create_test_cache();
    let manager = manager("1@test");

    let lock = manager
        .lock(&target, LockOptions::shared(), "test cache", "reading")
        .unwrap();
    assert!(lock.state().is_dirty());
    assert_eq!(fs::metadata(lock.lock_file()).unwrap().len(), 0);
}

#[test]
fn test_same_target_twice_is_rejected() {
    let (_dir, target) = create_test_cache();
    let manager = manager("1@test");

    let lock = manager
        .lock(&target, LockOptions::exclusive(), "test cache", "first")
        .unwrap();
    let err = manager
        .lock(&target, LockOptions::shared(), "test cache", "second")
        .unwrap_err();
    assert!(matches!(err, CacheLockError::AlreadyLockedByThisProcess(_)));
    assert!(err.to_string().contains("test cache"));

    lock.close().unwrap();
    assert!(!manager.is_locked(&target));
    manager
        .lock(&target, LockOptions::shared(), "test cache", "third")
        .unwrap();
}

#[test]
fn test_close_clears_owner_info() {
    let (_dir, target) = create_test_cache();
    let manager = manager("1@test");

    let lock = manager
        .lock(&target, LockOptions::exclusive(), "test cache", "building")
        .unwrap();
    let lock_file = lock.lock_file().to_path_buf();
    assert!(fs::metadata(&lock_file).unwrap().len() > StateCodec::Current.size());

    lock.close().unwrap();
    assert_eq!(
        fs::metadata(&lock_file).unwrap().len(),
        StateCodec::Current.size()
    );
    let info = inspect_lock_file(&lock_file, StateCodec::Current).unwrap();
    assert!(info.owner.is_none());
    assert!(!info.held);
}

#[test]
fn test_cross_version_lock_uses_legacy_state() {
    let (_dir, target) = create_test_cache();
    let manager = manager("1@test");

    let mut lock = manager
        .lock(
            &target,
            LockOptions::exclusive().use_cross_version_implementation(),
            "test cache",
            "building",
        )
        .unwrap();
    lock.write_file(|| Ok::<_, CacheLockError>(())).unwrap();
    let lock_file = lock.lock_file().to_path_buf();
    drop(lock);

    assert_eq!(fs::read(&lock_file).unwrap(), vec![1, 1]);

    // Too short for a current state record: reinitialized as dirty.
    let mut lock = manager
        .lock(&target, LockOptions::exclusive(), "test cache", "building")
        .unwrap();
    assert!(!lock.unlocked_cleanly());
    lock.write_file(|| Ok::<_, CacheLockError>(())).unwrap();
    drop(lock);

    // The legacy codec refuses the current record.
    let err = manager
        .lock(
            &target,
            LockOptions::shared().use_cross_version_implementation(),
            "test cache",
            "reading",
        )
        .unwrap_err();
    assert!(matches!(err, CacheLockError::CorruptLockFile { .. }));
    assert!(!manager.is_locked(&target));
}

#[test]
fn test_list_locks() {
    let (dir, _target) = create_test_cache();
    let manager = manager("1@test");
    let root = dir.path();

    // clean.lock: written and released cleanly
    let clean = root.join("clean");
    fs::create_dir_all(&clean).unwrap();
    let mut lock = manager
        .lock(&clean, LockOptions::exclusive(), "clean", "op")
        .unwrap();
    lock.write_file(|| Ok::<_, CacheLockError>(())).unwrap();
    drop(lock);
    fs::rename(clean.join("clean.lock"), root.join("clean.lock")).unwrap();

    // dirty.lock: freshly initialized
    fs::write(root.join("dirty.lock"), [3u8, 0, 0, 0, 0]).unwrap();
    // legacy.lock: another protocol version
    fs::write(root.join("legacy.lock"), [1u8, 1]).unwrap();
    // ignored
    fs::write(root.join("notes.txt"), b"not a lock").unwrap();

    let locks = list_locks(root, StateCodec::Current).unwrap();
    let names: Vec<&str> = locks.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["clean", "dirty", "legacy"]);

    assert!(matches!(
        locks[0].status,
        LockStatus::Clean {
            previous_owner: Some(_)
        }
    ));
    assert_eq!(locks[1].status, LockStatus::Dirty);
    assert_eq!(
        locks[2].status,
        LockStatus::Corrupt {
            expected: 3,
            found: 1
        }
    );
    assert!(locks.iter().all(|l| !l.held && l.owner.is_none()));
}

#[test]
fn test_list_locks_missing_directory() {
    let dir = TempDir::new().unwrap();
    let locks = list_locks(&dir.path().join("nope"), StateCodec::Current).unwrap();
    assert!(locks.is_empty());
}

#[test]
fn test_inspect_missing_lock_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.lock");
    let err = inspect_lock_file(&path, StateCodec::Current).unwrap_err();
    assert!(matches!(err, CacheLockError::UserError(_)));
    assert!(!path.exists());
}

#[test]
fn test_lock_info_display_and_json() {
    let (_dir, target) = create_test_cache();
    let manager = manager("1@test");
    let lock = manager
        .lock(&target, LockOptions::exclusive(), "test cache", "building")
        .unwrap();

    let info = inspect_lock_file(lock.lock_file(), StateCodec::Current).unwrap();
    let text = info.to_string();
    assert!(text.starts_with("cache: dirty"));
    assert!(text.contains("pid: 1@test"));
    assert!(text.contains("operation: building"));

    let json: serde_json::Value = serde_json::to_value(&info).unwrap();
    assert_eq!(json["status"]["status"], "dirty");
    assert_eq!(json["owner"]["operation"], "building");
}

#[cfg(target_os = "linux")]
mod contention {
    use super::*;

    #[test]
    fn test_timeout_names_owner() {
        let (_dir, target) = create_test_cache();
        let holder = manager("111@holder");
        let waiter = manager("222@waiter");

        let _lock = holder
            .lock(&target, LockOptions::exclusive(), "test cache", "compacting")
            .unwrap();

        let err = waiter
            .lock(&target, LockOptions::exclusive(), "test cache", "reading")
            .unwrap_err();
        let CacheLockError::LockTimeout { lock_file, message } = &err else {
            panic!("expected LockTimeout, got {:?}", err);
        };
        assert_eq!(*lock_file, target.join("cache.lock"));
        assert!(message.starts_with("Timeout waiting to lock test cache."));
        assert!(message.contains("Owner PID: 111@holder"));
        assert!(message.contains("Our PID: 222@waiter"));
        assert!(message.contains("Owner Operation: compacting"));
        assert!(message.contains("Our operation: reading"));
        assert!(!waiter.is_locked(&target));
    }

    #[test]
    fn test_shared_locks_coexist() {
        let (_dir, target) = create_test_cache();
        let a = manager("1@a");
        let b = manager("2@b");

        let _la = a
            .lock(&target, LockOptions::shared(), "test cache", "reading")
            .unwrap();
        let _lb = b
            .lock(&target, LockOptions::shared(), "test cache", "reading")
            .unwrap();

        let err = manager("3@c")
            .lock(&target, LockOptions::exclusive(), "test cache", "writing")
            .unwrap_err();
        assert!(matches!(err, CacheLockError::LockTimeout { .. }));
    }

    #[test]
    fn test_waiter_acquires_after_release() {
        let (_dir, target) = create_test_cache();
        let holder = manager("1@holder");
        let waiter = LockManager::with_metadata(
            LockConfig {
                lock_timeout_ms: 5_000,
                ..fast_config()
            },
            ProcessMetadata::new("2@waiter", 0),
        );

        let mut lock = holder
            .lock(&target, LockOptions::exclusive(), "test cache", "building")
            .unwrap();
        lock.write_file(|| Ok::<_, CacheLockError>(())).unwrap();
        let owner = lock.state().previous_owner();

        let release = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(100));
            lock.close().unwrap();
        });

        let lock = waiter
            .lock(&target, LockOptions::exclusive(), "test cache", "reading")
            .unwrap();
        release.join().unwrap();

        assert!(lock.unlocked_cleanly());
        assert_eq!(lock.state().previous_owner(), owner);
    }

    #[test]
    fn test_inspect_reports_held() {
        let (_dir, target) = create_test_cache();
        let manager = manager("1@test");
        let lock = manager
            .lock(&target, LockOptions::shared(), "test cache", "reading")
            .unwrap();

        let info = inspect_lock_file(lock.lock_file(), StateCodec::Current).unwrap();
        assert!(info.held);
        assert!(info.to_string().contains("HELD"));
    }

    #[test]
    fn test_inspect_leaves_lock_available() {
        let (_dir, target) = create_test_cache();
        let reader = manager("1@test");
        let lock = reader
            .lock(&target, LockOptions::shared(), "test cache", "reading")
            .unwrap();
        let lock_file = lock.lock_file().to_path_buf();

        assert!(inspect_lock_file(&lock_file, StateCodec::Current).unwrap().held);
        let other = manager("2@test")
            .lock(&target, LockOptions::shared(), "test cache", "reading")
            .unwrap();
        assert!(inspect_lock_file(&lock_file, StateCodec::Current).unwrap().held);

        drop(lock);
        drop(other);
        assert!(!inspect_lock_file(&lock_file, StateCodec::Current).unwrap().held);
    }
}
