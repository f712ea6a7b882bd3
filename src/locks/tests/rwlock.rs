use crate::error::LockfileError;
use crate::locks::{AcquireOptions, Job, LockFileState, LockStatus, LockType, RwLockfile};
use crate::test_support::{DEAD_PID, FakeLiveness, base_in, fast_config};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tempfile::TempDir;

use LockType::{Read, Write};

fn rw(dir: &TempDir) -> RwLockfile {
    RwLockfile::builder(base_in(dir, "a"))
        .config(fast_config())
        .liveness(FakeLiveness::with_dead(&[DEAD_PID]))
        .build()
}

fn opts() -> AcquireOptions {
    AcquireOptions::new()
}

fn dead_job(uuid: &str) -> Job {
    let mut job = Job::new(uuid, Some("crashed"));
    job.pid = DEAD_PID;
    job
}

fn inject(lock: &RwLockfile, edit: impl FnOnce(&mut LockFileState)) {
    let mut state = lock.state_sync().unwrap();
    edit(&mut state);
    crate::fs::write_json_sync(lock.path(), &state).unwrap();
}

#[test]
fn test_paths_do_not_collide() {
    let dir = TempDir::new().unwrap();
    let a = rw(&dir);

    assert_eq!(a.path(), base_in(&dir, "a.lock"));
    assert_eq!(a.internal().path(), base_in(&dir, "a.lock.lock"));
}

#[tokio::test]
async fn test_can_get_a_write_lock() {
    let dir = TempDir::new().unwrap();
    let a = rw(&dir);

    a.add(Write, opts().reason("deploy")).await.unwrap();
    let state = a.state().await.unwrap();
    let writer = state.writer.unwrap();
    assert_eq!(writer.uuid, a.uuid());
    assert_eq!(writer.reason.as_deref(), Some("deploy"));
    assert!(!a.internal().path().exists());
}

#[test]
fn test_can_get_a_write_lock_sync() {
    let dir = TempDir::new().unwrap();
    let a = rw(&dir);

    a.add_sync(Write, opts()).unwrap();
    assert_eq!(a.count().write, 1);
}

#[tokio::test]
async fn test_can_get_multiple_read_locks() {
    let dir = TempDir::new().unwrap();
    let a = rw(&dir);
    let b = rw(&dir);

    a.add(Read, opts()).await.unwrap();
    b.add(Read, opts()).await.unwrap();
    assert_eq!(a.state().await.unwrap().readers.len(), 2);
}

#[test]
fn test_can_get_multiple_read_locks_sync() {
    let dir = TempDir::new().unwrap();
    let a = rw(&dir);
    let b = rw(&dir);

    a.add_sync(Read, opts()).unwrap();
    b.add_sync(Read, opts()).unwrap();
    assert_eq!(a.state_sync().unwrap().readers.len(), 2);
}

#[tokio::test]
async fn test_many_concurrent_readers() {
    let dir = TempDir::new().unwrap();
    let readers: Vec<RwLockfile> = (0..5).map(|_| rw(&dir)).collect();

    let results = futures::future::join_all(readers.iter().map(|r| {
        r.add(Read, opts().timeout(Duration::from_secs(5)))
    }))
    .await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(readers[0].state().await.unwrap().readers.len(), 5);
}

#[tokio::test]
async fn test_if_locked_on_add() {
    let dir = TempDir::new().unwrap();
    let a = rw(&dir);
    let b = rw(&dir);
    a.add(Write, opts()).await.unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let result = b
        .add(
            Write,
            opts().if_locked(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_if_locked_on_builder() {
    let dir = TempDir::new().unwrap();
    let a = rw(&dir);
    a.add(Write, opts().reason("first")).await.unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let b = RwLockfile::builder(base_in(&dir, "a"))
        .config(fast_config())
        .if_locked(move |reason| {
            assert_eq!(reason, Some("first"));
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build();

    assert!(b.add(Write, opts()).await.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cannot_get_a_write_lock_when_reader_lock() {
    let dir = TempDir::new().unwrap();
    let a = rw(&dir);
    let b = rw(&dir);

    a.remove(Read).await.unwrap();
    a.remove_sync(Read).unwrap();
    a.add(Read, opts()).await.unwrap();
    a.add(Read, opts()).await.unwrap();
    a.add_sync(Read, opts()).unwrap();
    a.remove(Read).await.unwrap();
    a.remove_sync(Read).unwrap();
    assert_eq!(a.count().read, 1);

    let err = b.add(Write, opts()).await.unwrap_err();
    assert!(err.to_string().starts_with("read lock exists"), "{}", err);

    b.add(Read, opts().reason("mylock")).await.unwrap();
    a.remove(Read).await.unwrap();
    a.add(Read, opts()).await.unwrap();
    let err = a.add(Write, opts()).await.unwrap_err();
    assert!(
        err.to_string().starts_with("read lock exists: mylock"),
        "{}",
        err
    );
}

#[test]
fn test_cannot_get_a_write_lock_when_reader_lock_sync() {
    let dir = TempDir::new().unwrap();
    let a = rw(&dir);
    let b = rw(&dir);

    a.add_sync(Read, opts()).unwrap();
    let err = b.add_sync(Write, opts()).unwrap_err();
    assert!(err.to_string().starts_with("read lock exists:"), "{}", err);

    b.add_sync(Read, opts()).unwrap();
    a.remove_sync(Read).unwrap();
    assert!(b.add_sync(Write, opts()).is_ok());
}

#[tokio::test]
async fn test_cannot_get_a_read_lock_when_writer() {
    let dir = TempDir::new().unwrap();
    let a = rw(&dir);
    let b = rw(&dir);
    a.add(Write, opts().reason("migrating")).await.unwrap();

    let err = b.add(Read, opts()).await.unwrap_err();
    assert_eq!(err.to_string(), "write lock exists: migrating");

    let err = b.add(Write, opts()).await.unwrap_err();
    assert!(matches!(
        err,
        LockfileError::LockExists {
            kind: LockType::Write,
            ..
        }
    ));
}

#[tokio::test]
async fn test_writer_can_also_read() {
    let dir = TempDir::new().unwrap();
    let a = rw(&dir);

    a.add(Write, opts()).await.unwrap();
    a.add(Read, opts()).await.unwrap();
    assert_eq!(a.count().total(), 2);
    a.unlock().await.unwrap();
    assert!(a.state().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reader_promotes_to_writer() {
    let dir = TempDir::new().unwrap();
    let a = rw(&dir);

    a.add(Read, opts()).await.unwrap();
    a.add(Write, opts()).await.unwrap();
    assert_eq!(a.check(Write).await.unwrap(), LockStatus::Open);
}

#[tokio::test]
async fn test_dead_reader_is_pruned_but_live_reader_blocks() {
    let dir = TempDir::new().unwrap();
    let a = rw(&dir);
    let b = rw(&dir);

    a.add(Read, opts()).await.unwrap();
    inject(&a, |state| state.readers.push(dead_job("ghost")));

    let err = b
        .add(Write, opts().timeout(Duration::from_millis(200)))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("read lock exists"), "{}", err);
    let readers = a.state().await.unwrap().readers;
    assert_eq!(readers.len(), 1);
    assert_eq!(readers[0].uuid, a.uuid());
}

#[tokio::test]
async fn test_dead_writer_is_pruned() {
    let dir = TempDir::new().unwrap();
    let a = rw(&dir);
    inject(&a, |state| state.writer = Some(dead_job("ghost")));

    a.add(Write, opts()).await.unwrap();
    assert_eq!(a.state().await.unwrap().writer.unwrap().uuid, a.uuid());
}

#[test]
fn test_dead_entries_are_pruned_sync() {
    let dir = TempDir::new().unwrap();
    let a = rw(&dir);
    inject(&a, |state| {
        state.writer = Some(dead_job("w"));
        state.readers.push(dead_job("r"));
    });

    assert_eq!(a.check_sync(Write).unwrap(), LockStatus::Open);
    assert!(a.state_sync().unwrap().is_empty());
}

#[tokio::test]
async fn test_entries_from_other_hosts_are_kept() {
    let dir = TempDir::new().unwrap();
    let a = rw(&dir);
    if crate::locks::local_hostname().is_none() {
        return;
    }
    let mut foreign = dead_job("elsewhere");
    foreign.hostname = Some("another-host.invalid".to_string());
    inject(&a, |state| state.readers.push(foreign));

    match a.check(Write).await.unwrap() {
        LockStatus::ReadLock { jobs } => assert_eq!(jobs[0].uuid, "elsewhere"),
        other => panic!("expected read lock, got {:?}", other),
    }
}

#[tokio::test]
async fn test_check_reports_blocking_jobs() {
    let dir = TempDir::new().unwrap();
    let a = rw(&dir);
    let b = rw(&dir);

    assert!(b.check(Write).await.unwrap().is_open());
    a.add(Read, opts().reason("scan")).await.unwrap();

    assert!(b.check(Read).await.unwrap().is_open());
    match b.check(Write).await.unwrap() {
        LockStatus::ReadLock { jobs } => {
            assert_eq!(jobs.len(), 1);
            assert_eq!(jobs[0].reason.as_deref(), Some("scan"));
        }
        other => panic!("expected read lock, got {:?}", other),
    }
    assert_eq!(b.check_sync(Write).unwrap().as_str(), "read_lock");
}

#[tokio::test]
async fn test_remove_all_clears_the_entry() {
    let dir = TempDir::new().unwrap();
    let a = rw(&dir);
    let b = rw(&dir);

    a.add(Write, opts()).await.unwrap();
    a.add(Write, opts()).await.unwrap();
    a.remove_all(Write).await.unwrap();

    assert_eq!(a.count().write, 0);
    b.add(Write, opts()).await.unwrap();
}

#[tokio::test]
async fn test_release_leaves_other_entries() {
    let dir = TempDir::new().unwrap();
    let a = rw(&dir);
    let b = rw(&dir);

    a.add(Read, opts()).await.unwrap();
    b.add(Read, opts()).await.unwrap();
    a.remove(Read).await.unwrap();

    let readers = a.state().await.unwrap().readers;
    assert_eq!(readers.len(), 1);
    assert_eq!(readers[0].uuid, b.uuid());
}

#[tokio::test]
async fn test_concurrent_read_and_write_on_one_object() {
    let dir = TempDir::new().unwrap();
    let a = rw(&dir);

    let (read, write) = tokio::join!(a.add(Read, opts()), a.add(Write, opts()));
    read.unwrap();
    write.unwrap();

    let state = a.state().await.unwrap();
    assert_eq!(state.readers.len(), 1);
    assert!(state.writer.is_some());
}

#[tokio::test]
async fn test_dropping_the_holder_removes_its_entries() {
    let dir = TempDir::new().unwrap();
    let a = rw(&dir);
    let b = rw(&dir);

    a.add(Write, opts()).await.unwrap();
    drop(a);

    assert!(b.state().await.unwrap().is_empty());
    b.add(Write, opts()).await.unwrap();
}

#[tokio::test]
async fn test_corrupt_state_is_not_repaired() {
    let dir = TempDir::new().unwrap();
    let a = rw(&dir);
    std::fs::create_dir_all(a.path().parent().unwrap()).unwrap();
    std::fs::write(a.path(), "{ this is not json").unwrap();

    let err = a.add(Read, opts()).await.unwrap_err();
    assert!(matches!(err, LockfileError::CorruptState { .. }));
    assert_eq!(
        std::fs::read_to_string(a.path()).unwrap(),
        "{ this is not json"
    );
    assert!(!a.internal().path().exists());
}

#[tokio::test]
async fn test_add_during_release_registers_again() {
    let dir = TempDir::new().unwrap();
    let a = rw(&dir);
    a.add(Read, opts()).await.unwrap();

    let (removed, added) = tokio::join!(a.remove(Read), a.add(Read, opts()));
    removed.unwrap();
    added.unwrap();

    assert_eq!(a.count().read, 1);
    let readers = a.state().await.unwrap().readers;
    assert_eq!(readers.len(), 1);
    assert_eq!(readers[0].uuid, a.uuid());

    a.remove(Read).await.unwrap();
    assert!(a.state().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_add_during_remove_all_registers_again() {
    let dir = TempDir::new().unwrap();
    let a = rw(&dir);
    let b = rw(&dir);
    a.add(Write, opts()).await.unwrap();
    a.add(Write, opts()).await.unwrap();

    let (removed, added) = tokio::join!(a.remove_all(Write), a.add(Write, opts()));
    removed.unwrap();
    added.unwrap();

    assert_eq!(a.count().write, 1);
    let writer = a.state().await.unwrap().writer.unwrap();
    assert_eq!(writer.uuid, a.uuid());
    assert_eq!(b.check(Write).await.unwrap().as_str(), "write_lock");
}

#[tokio::test]
async fn test_timeout_covers_a_held_state_guard() {
    let dir = TempDir::new().unwrap();
    let a = RwLockfile::new(base_in(&dir, "a"));
    std::fs::create_dir_all(a.internal().path()).unwrap();

    let started = Instant::now();
    let err = a
        .add(Write, opts().timeout(Duration::from_millis(200)))
        .await
        .unwrap_err();
    let waited = started.elapsed();

    assert!(err.is_timeout(), "{}", err);
    assert!(waited >= Duration::from_millis(150), "{:?}", waited);
    assert!(waited < Duration::from_secs(2), "{:?}", waited);
    assert_eq!(a.count().write, 0);
    assert!(a.internal().path().is_dir());
}

#[tokio::test]
async fn test_remove_detached_updates_state_in_background() {
    let dir = TempDir::new().unwrap();
    let a = rw(&dir);
    a.add(Read, opts()).await.unwrap();
    a.add(Read, opts()).await.unwrap();

    a.remove_detached(Read).unwrap();
    assert_eq!(a.count().read, 1);
    a.remove_detached(Read).unwrap();
    assert_eq!(a.count().read, 0);

    // Waits for the spawned removal before registering again.
    a.add(Read, opts()).await.unwrap();
    let readers = a.state().await.unwrap().readers;
    assert_eq!(readers.len(), 1);
    a.remove(Read).await.unwrap();
    assert!(a.state().await.unwrap().is_empty());
}
