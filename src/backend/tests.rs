//! Tests for the lock backends.
//!
//! One conformance suite captures the factory contract and runs against
//! every backend; backend-specific tests cover what the contract leaves to
//! the implementation (filename sanitization, expiry stealing, operator
//! clearing).

use std::time::{Duration, Instant};

use serial_test::serial;
use tempfile::TempDir;

use super::db::DbLockFactory;
use super::file::{self, FileLockFactory};
use super::memory::MemoryLockFactory;
use crate::factory::LockFactory;

const ZERO: Duration = Duration::ZERO;
const TWO_SECS: Duration = Duration::from_secs(2);

/// Exercise the full factory contract against one backend.
///
/// `make` builds a factory for a given lock type, with all factories
/// sharing the same backing store.
fn run_factory_suite(make: &dyn Fn(&str) -> Box<dyn LockFactory>) {
    // Identical keys in different lock types never collide.
    let assign_factory = make("mod_assign");
    let task_factory = make("tool_task");

    let mut assign_lock = assign_factory
        .get_lock("abc", ZERO)
        .unwrap()
        .expect("get a lock 'abc' from type 'mod_assign'");
    let mut task_lock = task_factory
        .get_lock("abc", ZERO)
        .unwrap()
        .expect("get a lock 'abc' from type 'tool_task'");

    assert!(assign_lock.release());
    assert!(task_lock.release());

    let factory = make("default");
    if !factory.is_available() {
        return;
    }

    let mut lock1 = factory
        .get_lock("abc", TWO_SECS)
        .unwrap()
        .expect("get a lock");

    if factory.supports_timeout() {
        if factory.supports_recursion() {
            let mut lock2 = factory
                .get_lock("abc", TWO_SECS)
                .unwrap()
                .expect("get a stacked lock");
            assert!(lock2.release(), "release a stacked lock");

            // A further stacked lock is gained almost instantly.
            let started = Instant::now();
            let mut lock3 = factory.get_lock("abc", ZERO).unwrap().unwrap();
            assert!(
                started.elapsed() < Duration::from_millis(500),
                "stacked lock should be gained almost instantly"
            );
            assert!(lock3.release());
        } else {
            // A contended acquire blocks for the timeout, then fails.
            let started = Instant::now();
            let lock2 = factory.get_lock("abc", TWO_SECS).unwrap();
            let waited = started.elapsed();
            assert!(lock2.is_none(), "cannot get a lock on a held key");
            assert!(
                waited >= Duration::from_millis(1900),
                "timed-out acquire should actually have waited, waited {:?}",
                waited
            );
            assert!(
                waited < Duration::from_millis(2500),
                "acquire should time out within timeout + slack, waited {:?}",
                waited
            );

            // Zero timeout is a single non-blocking attempt.
            let started = Instant::now();
            let lock2 = factory.get_lock("abc", ZERO).unwrap();
            assert!(lock2.is_none());
            assert!(
                started.elapsed() < Duration::from_millis(500),
                "zero-timeout acquire should fail almost instantly"
            );
        }
    }

    // Release, reacquire, and double-release.
    assert!(lock1.release(), "release a lock");
    let mut lock3 = factory
        .get_lock("abc", TWO_SECS)
        .unwrap()
        .expect("get a lock again");
    assert!(lock3.release(), "release a lock again");
    assert!(!lock3.release(), "release a lock that is not held");

    if !factory.supports_auto_release() {
        // A lock with an expiry lease can be claimed by someone else after
        // the lease passes, even though it was never released.
        let mut lock4 = factory
            .get_lock_with_expiry("abc", TWO_SECS, TWO_SECS)
            .unwrap()
            .expect("get a lock with an expiry lease");
        std::thread::sleep(Duration::from_secs(3));

        let mut lock5 = factory
            .get_lock_with_expiry("abc", TWO_SECS, TWO_SECS)
            .unwrap()
            .expect("get another lock after the lease passed");
        assert!(lock5.release(), "release the stealing lock");
        assert!(lock4.release(), "release the expired handle");
    }
}

#[test]
fn memory_backend_conformance() {
    run_factory_suite(&|lock_type| {
        // Prefix keeps this suite's registry entries away from other tests.
        Box::new(MemoryLockFactory::new(&format!("conf_mem_{}", lock_type)))
    });
}

#[cfg(unix)]
#[test]
#[serial]
fn file_backend_conformance() {
    let root = TempDir::new().unwrap();
    let root_path = root.path().to_path_buf();
    run_factory_suite(&move |lock_type| {
        Box::new(FileLockFactory::new(&root_path, lock_type).unwrap())
    });
}

#[test]
#[serial]
fn db_backend_conformance() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("locks.db");
    run_factory_suite(&move |lock_type| Box::new(DbLockFactory::open(&db_path, lock_type).unwrap()));
}

// ============================================================================
// File backend specifics
// ============================================================================

#[cfg(unix)]
#[test]
fn file_lock_released_on_drop() {
    let root = TempDir::new().unwrap();
    let factory = FileLockFactory::new(root.path(), "drop_test").unwrap();

    let lock = factory.get_lock("abc", ZERO).unwrap().unwrap();
    drop(lock);

    let mut again = factory
        .get_lock("abc", ZERO)
        .unwrap()
        .expect("lock should be free after the handle was dropped");
    assert!(again.release());
}

#[cfg(unix)]
#[test]
fn file_contention_across_factories() {
    let root = TempDir::new().unwrap();
    let one = FileLockFactory::new(root.path(), "contention").unwrap();
    let two = FileLockFactory::new(root.path(), "contention").unwrap();

    let mut held = one.get_lock("abc", ZERO).unwrap().unwrap();
    assert!(two.get_lock("abc", ZERO).unwrap().is_none());

    assert!(held.release());
    let mut taken = two.get_lock("abc", ZERO).unwrap().unwrap();
    assert!(taken.release());
}

#[cfg(unix)]
#[test]
fn file_lock_files_persist_after_release() {
    let root = TempDir::new().unwrap();
    let factory = FileLockFactory::new(root.path(), "persist").unwrap();

    let mut lock = factory.get_lock("abc", ZERO).unwrap().unwrap();
    let path = factory.dir().join("abc.lock");
    assert!(path.exists());
    assert!(std::fs::metadata(&path).unwrap().len() > 0, "metadata written while held");

    assert!(lock.release());
    assert!(path.exists(), "lock files are never deleted");
    assert_eq!(
        std::fs::metadata(&path).unwrap().len(),
        0,
        "metadata truncated on release"
    );
}

#[cfg(unix)]
#[test]
fn file_factory_unavailable_without_usable_dir() {
    let root = TempDir::new().unwrap();
    // A plain file where the lock root should be makes the directory
    // uncreatable for any caller, privileged or not.
    let blocker = root.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let factory = FileLockFactory::new(&blocker, "blocked").unwrap();
    assert!(!factory.is_available());
    assert!(matches!(
        factory.get_lock("abc", ZERO),
        Err(crate::error::LockError::Unavailable(_))
    ));
}

#[test]
fn safe_filename_passes_plain_keys_through() {
    assert_eq!(file::safe_filename("cron"), "cron");
    assert_eq!(file::safe_filename("send_notifications-2.hourly"), "send_notifications-2.hourly");
}

#[test]
fn safe_filename_escapes_unsafe_characters() {
    let escaped = file::safe_filename("course/42:backup");
    assert!(!escaped.contains('/'));
    assert!(!escaped.contains(':'));
    // Distinct keys must never collide after sanitization.
    assert_ne!(file::safe_filename("a/b"), file::safe_filename("a%2fb"));
}

#[test]
fn safe_filename_truncates_long_keys_with_hash() {
    let long_a = "k".repeat(400);
    let long_b = format!("{}x", "k".repeat(399));

    let name_a = file::safe_filename(&long_a);
    let name_b = file::safe_filename(&long_b);
    assert!(name_a.len() <= 120);
    assert_ne!(name_a, name_b, "truncated names keep a distinguishing hash");
}

#[cfg(unix)]
#[test]
fn list_held_reports_held_locks_only() {
    let root = TempDir::new().unwrap();
    let factory = FileLockFactory::new(root.path(), "listing").unwrap();

    let mut held = factory.get_lock("visible", ZERO).unwrap().unwrap();
    let mut released = factory.get_lock("gone", ZERO).unwrap().unwrap();
    assert!(released.release());

    let listed = file::list_held(root.path(), 120).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].lock_type, "listing");
    assert_eq!(listed[0].metadata.resource, "visible");
    assert!(!listed[0].is_stale);

    assert!(held.release());
    assert!(file::list_held(root.path(), 120).unwrap().is_empty());
}

#[cfg(unix)]
#[test]
fn force_clear_removes_orphaned_metadata() {
    let root = TempDir::new().unwrap();
    let factory = FileLockFactory::new(root.path(), "clearing").unwrap();

    // Simulate a holder that died without truncating its metadata by
    // writing the file directly, with no flock held.
    let meta = super::LockMetadata::new("orphan");
    let path = factory.dir().join("orphan.lock");
    std::fs::write(&path, meta.to_json().unwrap()).unwrap();

    let cleared = file::force_clear(root.path(), "clearing", "orphan").unwrap();
    assert_eq!(cleared.resource, "orphan");
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);

    // Clearing again finds nothing held.
    assert!(matches!(
        file::force_clear(root.path(), "clearing", "orphan"),
        Err(crate::error::LockError::NotHeld(_))
    ));
}

// ============================================================================
// Db backend specifics
// ============================================================================

#[test]
fn db_contention_across_factories() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("locks.db");
    let one = DbLockFactory::open(&db_path, "contention").unwrap();
    let two = DbLockFactory::open(&db_path, "contention").unwrap();

    let mut held = one.get_lock("abc", ZERO).unwrap().unwrap();
    assert!(two.get_lock("abc", ZERO).unwrap().is_none());

    assert!(held.release());
    let mut taken = two.get_lock("abc", ZERO).unwrap().unwrap();
    assert!(taken.release());
}

#[test]
fn db_lock_without_expiry_is_not_stealable() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("locks.db");
    let factory = DbLockFactory::open(&db_path, "no_lease").unwrap();

    let mut held = factory.get_lock("abc", ZERO).unwrap().unwrap();
    std::thread::sleep(Duration::from_millis(200));
    // No lease was set, so the row can never be stolen.
    assert!(factory.get_lock("abc", ZERO).unwrap().is_none());
    assert!(held.release());
}

#[test]
fn db_release_is_lost_to_a_lawful_steal() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("locks.db");
    let factory = DbLockFactory::open(&db_path, "steal").unwrap();

    let mut expired = factory
        .get_lock_with_expiry("abc", ZERO, Duration::from_secs(1))
        .unwrap()
        .unwrap();
    std::thread::sleep(Duration::from_secs(2));

    let mut thief = factory
        .get_lock_with_expiry("abc", ZERO, Duration::from_secs(30))
        .unwrap()
        .expect("expired lease should be stealable");

    // The expired handle's release must not evict the thief's row.
    assert!(expired.release());
    assert!(factory.get_lock("abc", ZERO).unwrap().is_none(), "thief still holds the lock");
    assert!(thief.release());
}

#[test]
fn db_force_clear_evicts_any_owner() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("locks.db");
    let factory = DbLockFactory::open(&db_path, "evict").unwrap();

    let lock = factory.get_lock("abc", ZERO).unwrap().unwrap();
    // Leak the handle so the row stays behind like a dead holder's would.
    std::mem::forget(lock);

    let owner = super::db::force_clear(&db_path, "evict", "abc").unwrap();
    assert!(!owner.is_empty());

    let mut freed = factory.get_lock("abc", ZERO).unwrap().unwrap();
    assert!(freed.release());

    assert!(matches!(
        super::db::force_clear(&db_path, "evict", "abc"),
        Err(crate::error::LockError::NotHeld(_))
    ));
}

#[test]
fn db_factory_reports_available() {
    let dir = TempDir::new().unwrap();
    let factory = DbLockFactory::open(&dir.path().join("locks.db"), "avail").unwrap();
    assert!(factory.is_available());
    assert!(factory.supports_timeout());
    assert!(!factory.supports_recursion());
    assert!(!factory.supports_auto_release());
}
