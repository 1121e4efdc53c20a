//! Tests for record expiry and the storage supervisor
//!
//! These tests verify:
//! - TTL records disappear after their lifetime
//! - Stale timers never touch a re-inserted record
//! - Persisted deadlines outlive a restart
//! - Supervisor autoclean, error reports and shutdown

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use storer::protocol::Command;
use storer::{Config, ErrorKind, Store, StoreError, Supervisor};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_store() -> (TempDir, Store) {
    let temp_dir = TempDir::new().unwrap();
    let store = Store::open_named(temp_dir.path(), "app").unwrap();
    (temp_dir, store)
}

fn autoclean_config(temp_dir: &TempDir) -> Config {
    Config::builder()
        .data_dir(temp_dir.path())
        .name("app")
        .autoclean(true)
        .scan_interval(Duration::from_millis(50))
        .build()
}

/// Poll until `done` holds or `limit` elapses
fn wait_for(limit: Duration, mut done: impl FnMut() -> bool) -> bool {
    let step = Duration::from_millis(20);
    let mut waited = Duration::ZERO;
    while waited < limit {
        if done() {
            return true;
        }
        thread::sleep(step);
        waited += step;
    }
    done()
}

// =============================================================================
// Timer Tests
// =============================================================================

#[test]
fn test_ttl_record_expires() {
    let (_temp, store) = setup_temp_store();
    let sessions = store.collection("sessions");

    sessions
        .put(b"token", b"abc", Some(Duration::from_secs(1)))
        .unwrap();
    assert_eq!(sessions.get(b"token").unwrap(), b"abc");

    thread::sleep(Duration::from_millis(1200));

    let err = sessions.get(b"token").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::KeyNotFound);

    // The collection itself stays
    assert!(sessions.exists().unwrap());
    assert!(wait_for(Duration::from_secs(2), || store.armed_expiries() == 0));
}

#[test]
fn test_timer_removes_record_physically() {
    let (_temp, store) = setup_temp_store();
    let sessions = store.collection("sessions");

    sessions
        .put(b"token", b"abc", Some(Duration::from_millis(100)))
        .unwrap();
    assert_eq!(store.armed_expiries(), 1);

    assert!(wait_for(Duration::from_secs(2), || store.armed_expiries() == 0));

    // The timer already deleted it, so the sweep finds nothing
    assert_eq!(store.purge_expired().unwrap(), 0);
    assert!(sessions.is_empty().unwrap());
}

#[test]
fn test_no_timer_without_ttl() {
    let (_temp, store) = setup_temp_store();
    let coll = store.collection("plain");

    coll.put(b"a", b"1", None).unwrap();
    coll.put(b"b", b"2", Some(Duration::ZERO)).unwrap();

    assert_eq!(store.armed_expiries(), 0);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(coll.get(b"b").unwrap(), b"2");
}

#[test]
fn test_stale_timer_spares_reinserted_key() {
    let (_temp, store) = setup_temp_store();
    let coll = store.collection("cache");

    coll.put(b"key", b"old", Some(Duration::from_millis(200))).unwrap();
    coll.delete(b"key").unwrap();
    coll.put(b"key", b"new", None).unwrap();

    assert!(wait_for(Duration::from_secs(2), || store.armed_expiries() == 0));

    assert_eq!(coll.get(b"key").unwrap(), b"new");
}

#[test]
fn test_stale_timer_spares_longer_ttl() {
    let (_temp, store) = setup_temp_store();
    let coll = store.collection("cache");

    coll.put(b"key", b"short", Some(Duration::from_millis(100))).unwrap();
    coll.delete(b"key").unwrap();
    coll.put(b"key", b"long", Some(Duration::from_secs(60))).unwrap();

    thread::sleep(Duration::from_millis(300));

    assert_eq!(coll.get(b"key").unwrap(), b"long");
    assert_eq!(store.armed_expiries(), 1);
}

#[test]
fn test_delete_before_expiry() {
    let (_temp, store) = setup_temp_store();
    let coll = store.collection("cache");

    coll.put(b"key", b"v", Some(Duration::from_millis(100))).unwrap();
    coll.delete(b"key").unwrap();

    // The timer fires against a missing record and does nothing
    assert!(wait_for(Duration::from_secs(2), || store.armed_expiries() == 0));
    assert_eq!(coll.delete(b"key").unwrap_err().kind(), ErrorKind::KeyNotFound);
}

#[test]
fn test_update_keeps_deadline() {
    let (_temp, store) = setup_temp_store();
    let coll = store.collection("cache");

    coll.put(b"key", b"v1", Some(Duration::from_millis(300))).unwrap();
    coll.update(b"key", b"v2").unwrap();
    assert_eq!(coll.get(b"key").unwrap(), b"v2");

    thread::sleep(Duration::from_millis(500));

    assert!(coll.get(b"key").is_err());
}

#[test]
fn test_expired_key_can_be_put_again() {
    let (_temp, store) = setup_temp_store();
    let coll = store.collection("cache");

    coll.put(b"key", b"v1", Some(Duration::from_millis(100))).unwrap();
    thread::sleep(Duration::from_millis(200));

    let id = coll.put(b"key", b"v2", None).unwrap();

    assert_eq!(id, 2);
    assert_eq!(coll.get(b"key").unwrap(), b"v2");
}

#[test]
fn test_drop_collection_with_pending_timers() {
    let (_temp, store) = setup_temp_store();
    let coll = store.collection("cache");

    coll.put(b"key", b"v", Some(Duration::from_millis(100))).unwrap();
    store.drop_collection("cache").unwrap();

    // Timer fires into a missing collection and is absorbed
    assert!(wait_for(Duration::from_secs(2), || store.armed_expiries() == 0));
    assert!(!coll.exists().unwrap());
}

// =============================================================================
// TTL Range Tests
// =============================================================================

fn put_command(key: &[u8], ttl_secs: u64) -> Command {
    Command::Put {
        collection: "cache".to_string(),
        key: key.to_vec(),
        value: b"v".to_vec(),
        ttl_secs,
    }
}

#[test]
fn test_put_huge_ttl_does_not_panic() {
    let (_temp, store) = setup_temp_store();

    let payload = store.execute(put_command(b"max", u64::MAX)).unwrap();
    assert_eq!(payload, Some(1u64.to_be_bytes().to_vec()));

    let id = store
        .collection("cache")
        .put(b"duration_max", b"v", Some(Duration::MAX))
        .unwrap();
    assert_eq!(id, 2);

    // Neither lifetime fits the monotonic clock, so no timer is armed
    assert_eq!(store.armed_expiries(), 0);
    assert_eq!(store.collection("cache").get(b"max").unwrap(), b"v");
}

#[test]
fn test_put_huge_ttl_never_expires_early() {
    let (_temp, store) = setup_temp_store();
    let coll = store.collection("cache");

    // Just past the u64 millisecond range
    store
        .execute(put_command(b"wide", u64::MAX / 1000 + 1))
        .unwrap();
    coll.put(b"max", b"v", Some(Duration::MAX)).unwrap();

    thread::sleep(Duration::from_millis(600));

    assert_eq!(coll.get(b"wide").unwrap(), b"v");
    assert_eq!(coll.get(b"max").unwrap(), b"v");
    assert_eq!(store.purge_expired().unwrap(), 0);
    assert_eq!(coll.len().unwrap(), 2);
}

#[test]
fn test_sub_millisecond_ttl() {
    let (_temp, store) = setup_temp_store();
    let coll = store.collection("cache");

    coll.put(b"blink", b"v", Some(Duration::from_micros(500))).unwrap();

    assert!(wait_for(Duration::from_secs(2), || store.armed_expiries() == 0));
    assert_eq!(coll.get(b"blink").unwrap_err().kind(), ErrorKind::KeyNotFound);
}

// =============================================================================
// Restart Tests
// =============================================================================

#[test]
fn test_deadline_survives_restart() {
    let temp_dir = TempDir::new().unwrap();

    {
        let store = Store::open_named(temp_dir.path(), "app").unwrap();
        let coll = store.collection("sessions");
        coll.put(b"short", b"v", Some(Duration::from_millis(100))).unwrap();
        coll.put(b"forever", b"v", None).unwrap();
        // Dropped before the timer fires; the timer is lost
    }

    thread::sleep(Duration::from_millis(200));

    let store = Store::open_named(temp_dir.path(), "app").unwrap();
    let coll = store.collection("sessions");

    assert_eq!(store.armed_expiries(), 0);
    assert_eq!(coll.get(b"short").unwrap_err().kind(), ErrorKind::KeyNotFound);
    assert_eq!(coll.len().unwrap(), 1);

    assert_eq!(store.purge_expired().unwrap(), 1);
    assert_eq!(store.purge_expired().unwrap(), 0);
    assert_eq!(coll.get(b"forever").unwrap(), b"v");
}

// =============================================================================
// Supervisor Tests
// =============================================================================

#[test]
fn test_supervisor_autoclean_sweeps() {
    let temp_dir = TempDir::new().unwrap();

    {
        let store = Store::open_named(temp_dir.path(), "app").unwrap();
        store
            .collection("sessions")
            .put(b"short", b"v", Some(Duration::from_millis(50)))
            .unwrap();
    }
    thread::sleep(Duration::from_millis(100));

    let store = Arc::new(Store::open(autoclean_config(&temp_dir)).unwrap());
    let supervisor = Supervisor::new(Arc::clone(&store));
    let handle = supervisor.handle();
    let worker = thread::spawn(move || supervisor.run());

    thread::sleep(Duration::from_millis(300));
    handle.shutdown();
    worker.join().unwrap();

    // Already swept by the supervisor
    assert_eq!(store.purge_expired().unwrap(), 0);
}

#[test]
fn test_supervisor_without_autoclean_leaves_records() {
    let temp_dir = TempDir::new().unwrap();

    {
        let store = Store::open_named(temp_dir.path(), "app").unwrap();
        store
            .collection("sessions")
            .put(b"short", b"v", Some(Duration::from_millis(50)))
            .unwrap();
    }
    thread::sleep(Duration::from_millis(100));

    let config = Config::builder()
        .data_dir(temp_dir.path())
        .name("app")
        .scan_interval(Duration::from_millis(50))
        .build();
    let store = Arc::new(Store::open(config).unwrap());
    let supervisor = Supervisor::new(Arc::clone(&store));
    let handle = supervisor.handle();
    let worker = thread::spawn(move || supervisor.run());

    thread::sleep(Duration::from_millis(200));
    handle.shutdown();
    worker.join().unwrap();

    assert_eq!(store.purge_expired().unwrap(), 1);
}

#[test]
fn test_supervisor_survives_error_reports() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(Store::open(autoclean_config(&temp_dir)).unwrap());

    let supervisor = Supervisor::new(Arc::clone(&store));
    let handle = supervisor.handle();
    let worker = thread::spawn(move || supervisor.run());

    handle.report(StoreError::EngineUnavailable("disk on fire".to_string()));
    handle.report(StoreError::Protocol("bad frame".to_string()));
    thread::sleep(Duration::from_millis(100));

    assert!(!worker.is_finished());

    handle.shutdown();
    worker.join().unwrap();
}

#[test]
fn test_supervisor_stops_when_handles_dropped() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(Store::open(autoclean_config(&temp_dir)).unwrap());

    let supervisor = Supervisor::new(Arc::clone(&store));
    let handle = supervisor.handle();
    let worker = thread::spawn(move || supervisor.run());

    drop(handle);

    assert!(wait_for(Duration::from_secs(2), || worker.is_finished()));
    worker.join().unwrap();
}

#[test]
fn test_report_after_stop_is_harmless() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(Store::open(autoclean_config(&temp_dir)).unwrap());

    let supervisor = Supervisor::new(Arc::clone(&store));
    let handle = supervisor.handle();
    let worker = thread::spawn(move || supervisor.run());

    handle.shutdown();
    worker.join().unwrap();

    handle.report(StoreError::Protocol("late".to_string()));
    handle.shutdown();
}
