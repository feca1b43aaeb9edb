//! Scenario 6 (spec.md §8): lock contention, reason updates, and
//! cross-manager mutual exclusion.

use aleutian_core::error::LockError;
use aleutian_core::FileLockManager;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn same_manager_reacquire_updates_reason_without_failing() {
    let dir = TempDir::new().unwrap();
    let manager = FileLockManager::new(dir.path().join("locks"), Duration::from_secs(300)).unwrap();
    let target = dir.path().join("f.txt");

    manager.acquire(&target, "edit").unwrap();
    manager.acquire(&target, "edit2").unwrap();
    assert!(manager.is_locked(&target));
}

#[test]
fn different_manager_sees_file_locked_with_holder_pid_and_reason() {
    let dir = TempDir::new().unwrap();
    let p1 = FileLockManager::new(dir.path().join("locks"), Duration::from_secs(300)).unwrap();
    let p2 = FileLockManager::new(dir.path().join("locks"), Duration::from_secs(300)).unwrap();
    let target = dir.path().join("f.txt");

    p1.acquire(&target, "edit").unwrap();
    let err = p2.acquire(&target, "edit2").unwrap_err();

    match err {
        LockError::FileLocked { holder_pid, reason, .. } => {
            assert_eq!(holder_pid, std::process::id());
            assert_eq!(reason, "edit");
        }
        other => panic!("expected FileLocked, got {other:?}"),
    }
}

#[test]
fn release_then_reacquire_by_another_manager_succeeds() {
    let dir = TempDir::new().unwrap();
    let p1 = FileLockManager::new(dir.path().join("locks"), Duration::from_secs(300)).unwrap();
    let p2 = FileLockManager::new(dir.path().join("locks"), Duration::from_secs(300)).unwrap();
    let target = dir.path().join("f.txt");

    p1.acquire(&target, "edit").unwrap();
    p1.release(&target).unwrap();
    p2.acquire(&target, "edit2").unwrap();
    assert!(p2.is_locked(&target));
}
